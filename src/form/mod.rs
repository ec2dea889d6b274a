//! DOM-independent form state: named controls with values, validators and
//! interaction flags, plus change notification for the projections that
//! mirror them into the document.

mod builder;
pub mod validators;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

pub use builder::{BuildOutcome, FormModelBuilder, ParentModel};
pub use validators::{CompileError, ValidationError, Validator};

use validators::run_validators;

/// Snapshot of one control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub name: String,
    pub value: JsonValue,
    pub errors: Vec<ValidationError>,
    pub dirty: bool,
    pub touched: bool,
    pub disabled: bool,
}

impl ControlState {
    /// Disabled controls are neither valid nor invalid.
    pub fn valid(&self) -> bool {
        !self.disabled && self.errors.is_empty()
    }

    pub fn invalid(&self) -> bool {
        !self.disabled && !self.errors.is_empty()
    }

    /// The user has typed into or left the control.
    pub fn interacted(&self) -> bool {
        self.dirty || self.touched
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    Valid,
    Invalid,
    Pending,
    Disabled,
}

/// Which changes a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
    Form,
    Control(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChange {
    Value { control: String },
    Status { control: String },
}

impl ModelChange {
    pub fn control(&self) -> &str {
        match self {
            Self::Value { control } | Self::Status { control } => control,
        }
    }
}

type ChangeCallback = Rc<dyn Fn(&ModelChange)>;

struct Control {
    state: ControlState,
    validators: Vec<Validator>,
}

impl Control {
    /// Returns whether the error list changed.
    fn revalidate(&mut self) -> bool {
        let errors = if self.state.disabled {
            Vec::new()
        } else {
            run_validators(&self.validators, &self.state.value)
        };
        if errors == self.state.errors {
            return false;
        }
        self.state.errors = errors;
        true
    }
}

struct Subscriber {
    id: u64,
    scope: ChangeScope,
    callback: ChangeCallback,
}

#[derive(Default)]
struct ModelState {
    controls: Vec<Control>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl ModelState {
    fn control_mut(&mut self, name: &str) -> Option<&mut Control> {
        self.controls.iter_mut().find(|control| control.state.name == name)
    }

    fn control(&self, name: &str) -> Option<&Control> {
        self.controls.iter().find(|control| control.state.name == name)
    }
}

/// Shared handle to a form model; clones observe the same controls.
#[derive(Clone, Default)]
pub struct FormModel {
    state: Rc<RefCell<ModelState>>,
}

impl std::fmt::Debug for FormModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormModel")
            .field("controls", &self.control_names())
            .field("status", &self.status())
            .finish()
    }
}

impl PartialEq for FormModel {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl FormModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a control and validates its seed value. Returns `false` (and
    /// changes nothing) when `name` already exists.
    pub fn add_control(&self, name: &str, value: JsonValue, validators: Vec<Validator>) -> bool {
        let mut state = self.state.borrow_mut();
        if state.control(name).is_some() {
            return false;
        }
        let mut control = Control {
            state: ControlState {
                name: name.to_string(),
                value,
                errors: Vec::new(),
                dirty: false,
                touched: false,
                disabled: false,
            },
            validators,
        };
        control.revalidate();
        state.controls.push(control);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.borrow().control(name).is_some()
    }

    pub fn control_names(&self) -> Vec<String> {
        self.state
            .borrow()
            .controls
            .iter()
            .map(|control| control.state.name.clone())
            .collect()
    }

    pub fn control(&self, name: &str) -> Option<ControlState> {
        self.state.borrow().control(name).map(|control| control.state.clone())
    }

    pub fn value_of(&self, name: &str) -> Option<JsonValue> {
        self.state
            .borrow()
            .control(name)
            .map(|control| control.state.value.clone())
    }

    // ---- writes -------------------------------------------------------------

    /// Programmatic write: revalidates and notifies, leaves interaction flags
    /// alone. Returns whether the value changed.
    pub fn set_value(&self, name: &str, value: JsonValue) -> bool {
        self.write(name, value, false, true)
    }

    /// Write originating from the user. Marks the control dirty and touched;
    /// validity is recomputed before anyone is notified.
    pub fn write_from_view(&self, name: &str, value: JsonValue) -> bool {
        self.write(name, value, true, true)
    }

    /// Silent write used to seed initial data: no flags, no notification.
    pub fn patch(&self, name: &str, value: JsonValue) -> bool {
        self.write(name, value, false, false)
    }

    fn write(&self, name: &str, value: JsonValue, from_view: bool, emit: bool) -> bool {
        let status_changed = {
            let mut state = self.state.borrow_mut();
            let Some(control) = state.control_mut(name) else {
                debug!(target = "form", control = name, "write to unknown control ignored");
                return false;
            };
            if control.state.value == value {
                return false;
            }
            control.state.value = value;
            let mut flags_changed = false;
            if from_view {
                flags_changed = !control.state.dirty || !control.state.touched;
                control.state.dirty = true;
                control.state.touched = true;
            }
            control.revalidate() || flags_changed
        };
        if emit {
            self.emit(&ModelChange::Value {
                control: name.to_string(),
            });
            if status_changed {
                self.emit(&ModelChange::Status {
                    control: name.to_string(),
                });
            }
        }
        true
    }

    // ---- status -------------------------------------------------------------

    /// Focus left the control.
    pub fn mark_touched(&self, name: &str) {
        let changed = {
            let mut state = self.state.borrow_mut();
            match state.control_mut(name) {
                Some(control) if !control.state.touched => {
                    control.state.touched = true;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(&ModelChange::Status {
                control: name.to_string(),
            });
        }
    }

    pub fn mark_all_touched(&self) {
        let changed: Vec<String> = {
            let mut state = self.state.borrow_mut();
            state
                .controls
                .iter_mut()
                .filter(|control| !control.state.touched)
                .map(|control| {
                    control.state.touched = true;
                    control.state.name.clone()
                })
                .collect()
        };
        for control in changed {
            self.emit(&ModelChange::Status { control });
        }
    }

    /// Reruns a control's validators and always notifies status subscribers.
    pub fn update_validity(&self, name: &str) {
        let known = {
            let mut state = self.state.borrow_mut();
            match state.control_mut(name) {
                Some(control) => {
                    control.revalidate();
                    true
                }
                None => false,
            }
        };
        if known {
            self.emit(&ModelChange::Status {
                control: name.to_string(),
            });
        }
    }

    pub fn update_all_validity(&self) {
        for name in self.control_names() {
            self.update_validity(&name);
        }
    }

    pub fn set_disabled(&self, name: &str, disabled: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            match state.control_mut(name) {
                Some(control) if control.state.disabled != disabled => {
                    control.state.disabled = disabled;
                    control.revalidate();
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(&ModelChange::Status {
                control: name.to_string(),
            });
        }
    }

    pub fn status(&self) -> FormStatus {
        if self.disabled() {
            FormStatus::Disabled
        } else if self.invalid() {
            FormStatus::Invalid
        } else {
            FormStatus::Valid
        }
    }

    pub fn valid(&self) -> bool {
        self.status() == FormStatus::Valid
    }

    pub fn invalid(&self) -> bool {
        self.any(|control| control.invalid())
    }

    /// Validators are synchronous, so a model is never pending.
    pub fn pending(&self) -> bool {
        self.status() == FormStatus::Pending
    }

    pub fn pristine(&self) -> bool {
        !self.dirty()
    }

    pub fn dirty(&self) -> bool {
        self.any(|control| control.dirty)
    }

    pub fn touched(&self) -> bool {
        self.any(|control| control.touched)
    }

    pub fn untouched(&self) -> bool {
        !self.touched()
    }

    /// A model is disabled when it has controls and all of them are.
    pub fn disabled(&self) -> bool {
        let state = self.state.borrow();
        !state.controls.is_empty() && state.controls.iter().all(|control| control.state.disabled)
    }

    pub fn enabled(&self) -> bool {
        !self.disabled()
    }

    /// Every control value is null or the empty string.
    pub fn is_empty(&self) -> bool {
        !self.any(|control| !(control.value.is_null() || control.value == ""))
    }

    fn any(&self, predicate: impl Fn(&ControlState) -> bool) -> bool {
        self.state
            .borrow()
            .controls
            .iter()
            .any(|control| predicate(&control.state))
    }

    // ---- data ---------------------------------------------------------------

    /// Values of the enabled controls.
    pub fn value(&self) -> JsonMap<String, JsonValue> {
        self.collect(false)
    }

    /// Values of every control, disabled ones included.
    pub fn raw_value(&self) -> JsonMap<String, JsonValue> {
        self.collect(true)
    }

    fn collect(&self, include_disabled: bool) -> JsonMap<String, JsonValue> {
        self.state
            .borrow()
            .controls
            .iter()
            .filter(|control| include_disabled || !control.state.disabled)
            .map(|control| (control.state.name.clone(), control.state.value.clone()))
            .collect()
    }

    // ---- subscriptions ------------------------------------------------------

    pub fn subscribe(
        &self,
        scope: ChangeScope,
        callback: impl Fn(&ModelChange) + 'static,
    ) -> ModelSubscription {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.push(Subscriber {
            id,
            scope,
            callback: Rc::new(callback),
        });
        ModelSubscription {
            state: Rc::downgrade(&self.state),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    fn emit(&self, change: &ModelChange) {
        let callbacks: Vec<(u64, ChangeCallback)> = self
            .state
            .borrow()
            .subscribers
            .iter()
            .filter(|subscriber| match &subscriber.scope {
                ChangeScope::Form => true,
                ChangeScope::Control(name) => name == change.control(),
            })
            .map(|subscriber| (subscriber.id, Rc::clone(&subscriber.callback)))
            .collect();
        for (id, callback) in callbacks {
            let live = self
                .state
                .borrow()
                .subscribers
                .iter()
                .any(|subscriber| subscriber.id == id);
            if live {
                callback(change);
            }
        }
    }
}

/// Live model subscription; unsubscribes on drop.
#[must_use = "dropping the subscription unsubscribes it"]
pub struct ModelSubscription {
    state: Weak<RefCell<ModelState>>,
    id: u64,
}

impl ModelSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for ModelSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let removed = {
                let mut state = state.borrow_mut();
                let index = state.subscribers.iter().position(|entry| entry.id == self.id);
                index.map(|index| state.subscribers.remove(index))
            };
            drop(removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn required() -> Vec<Validator> {
        vec![Validator::Required]
    }

    #[test]
    fn seeds_are_validated_but_pristine() {
        let model = FormModel::new();
        assert!(model.add_control("name", json!(""), required()));
        assert!(!model.add_control("name", json!("x"), Vec::new()));

        let control = model.control("name").unwrap();
        assert!(control.invalid());
        assert!(!control.interacted());
        assert!(model.invalid());
        assert!(model.pristine());
        assert!(model.untouched());
        assert_eq!(model.status(), FormStatus::Invalid);
    }

    #[test]
    fn view_writes_mark_dirty_and_notify_after_validation() {
        let model = FormModel::new();
        model.add_control("name", json!(""), required());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observed = {
            let model = model.clone();
            let seen = Rc::clone(&seen);
            model.clone().subscribe(ChangeScope::Control("name".into()), move |change| {
                seen.borrow_mut().push((change.clone(), model.valid()));
            })
        };

        assert!(model.write_from_view("name", json!("Ana")));
        assert!(!model.write_from_view("name", json!("Ana")));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (ModelChange::Value { control: "name".into() }, true));
        assert!(matches!(seen[1].0, ModelChange::Status { .. }));
        assert!(model.dirty());
        assert!(model.touched());
        drop(observed);
    }

    #[test]
    fn patch_is_silent() {
        let model = FormModel::new();
        model.add_control("city", json!(""), Vec::new());
        let calls = Rc::new(RefCell::new(0));
        let _sub = {
            let calls = Rc::clone(&calls);
            model.subscribe(ChangeScope::Form, move |_| *calls.borrow_mut() += 1)
        };
        assert!(model.patch("city", json!("Quito")));
        assert_eq!(*calls.borrow(), 0);
        assert!(model.pristine());
        assert_eq!(model.value_of("city"), Some(json!("Quito")));
    }

    #[test]
    fn disabled_controls_drop_out_of_value_and_validity() {
        let model = FormModel::new();
        model.add_control("a", json!(""), required());
        model.add_control("b", json!("kept"), Vec::new());
        model.set_disabled("a", true);

        assert!(model.valid());
        assert!(!model.disabled());
        assert_eq!(model.value(), json!({ "b": "kept" }).as_object().cloned().unwrap());
        assert_eq!(model.raw_value().len(), 2);

        model.set_disabled("b", true);
        assert_eq!(model.status(), FormStatus::Disabled);
        assert!(!model.valid());
        assert!(!model.invalid());
    }

    #[test]
    fn emptiness_tracks_every_control() {
        let model = FormModel::new();
        model.add_control("a", json!(""), Vec::new());
        model.add_control("b", JsonValue::Null, Vec::new());
        assert!(model.is_empty());
        model.set_value("b", json!("x"));
        assert!(!model.is_empty());
        model.set_value("b", json!(""));
        assert!(model.is_empty());
        model.set_value("a", json!(false));
        assert!(!model.is_empty());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let model = FormModel::new();
        model.add_control("a", json!(""), Vec::new());
        let sub = model.subscribe(ChangeScope::Form, |_| {});
        assert_eq!(model.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(model.subscriber_count(), 0);
    }

    #[test]
    fn mark_all_touched_notifies_once_per_control() {
        let model = FormModel::new();
        model.add_control("a", json!(""), Vec::new());
        model.add_control("b", json!(""), Vec::new());
        let count = Rc::new(RefCell::new(0));
        let _sub = {
            let count = Rc::clone(&count);
            model.subscribe(ChangeScope::Form, move |_| *count.borrow_mut() += 1)
        };
        model.mark_all_touched();
        model.mark_all_touched();
        assert_eq!(*count.borrow(), 2);
        assert!(model.touched());
        assert!(model.pristine());
    }
}
