//! Two-way binding between a [`FormModel`] and elements of rendered markup.
//!
//! Every write in either direction is compared against what is already
//! there, so a model change projected onto an element never comes back as a
//! view change and vice versa.

mod control_kind;
mod projection;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

pub use control_kind::{truthy, value_text, ControlKind};
pub use projection::BoundControl;

use crate::config::ClassNames;
use crate::content::FieldMapping;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dom::{Document, DomEvent, ElementRef, EventData, ListenerHandle};
use crate::form::{ChangeScope, FormModel, ModelSubscription};
use crate::keys::{InputMask, KeyFilter};
use projection::project;

struct SyncBinding {
    model: FormModel,
    container: ElementRef,
    controls: Vec<Rc<BoundControl>>,
    listeners: Vec<ListenerHandle>,
    subscriptions: Vec<ModelSubscription>,
    writes: Rc<Cell<usize>>,
}

/// Keeps any number of models bound to their containers, keyed by binding id.
/// Clones share the same bindings.
#[derive(Clone)]
pub struct FormDomSynchronizer {
    document: Document,
    classes: ClassNames,
    diagnostics: Diagnostics,
    bindings: Rc<RefCell<HashMap<String, SyncBinding>>>,
}

impl FormDomSynchronizer {
    pub fn new(document: Document, classes: ClassNames, diagnostics: Diagnostics) -> Self {
        Self {
            document,
            classes,
            diagnostics,
            bindings: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Binds `model` to the elements `mappings` select inside `container`,
    /// replacing any binding already registered under `id`. Returns how many
    /// mappings found their elements.
    pub fn connect(
        &self,
        id: &str,
        model: &FormModel,
        container: &ElementRef,
        mappings: &[FieldMapping],
    ) -> usize {
        self.disconnect(id);

        let writes = Rc::new(Cell::new(0));
        let mut binding = SyncBinding {
            model: model.clone(),
            container: container.clone(),
            controls: Vec::new(),
            listeners: Vec::new(),
            subscriptions: Vec::new(),
            writes: Rc::clone(&writes),
        };

        for mapping in mappings {
            let Some(control) = self.resolve(id, model, container, mapping) else {
                continue;
            };
            let control = Rc::new(control);
            self.listen(&mut binding, &control, mapping);

            let subscription = {
                let control = Rc::clone(&control);
                let model_ref = model.clone();
                let classes = self.classes.clone();
                let writes = Rc::clone(&writes);
                model.subscribe(ChangeScope::Control(control.name.clone()), move |_| {
                    project(&control, &model_ref, &classes, &writes);
                })
            };
            binding.subscriptions.push(subscription);
            binding.controls.push(control);
        }

        let bound = binding.controls.len();
        let controls = binding.controls.clone();
        self.bindings.borrow_mut().insert(id.to_string(), binding);

        for control in &controls {
            project(control, model, &self.classes, &writes);
        }
        model.update_all_validity();

        debug!(target = "sync", binding = id, controls = bound, "connected");
        bound
    }

    fn resolve(
        &self,
        id: &str,
        model: &FormModel,
        container: &ElementRef,
        mapping: &FieldMapping,
    ) -> Option<BoundControl> {
        let name = &mapping.control_name;
        if !model.contains(name) {
            self.report(id, DiagnosticKind::Binding, format!("control '{name}' is not part of the model"));
            return None;
        }
        let elements = match container.query_selector_all(&mapping.dom_selector) {
            Ok(elements) if !elements.is_empty() => elements,
            Ok(_) => {
                self.report(
                    id,
                    DiagnosticKind::Binding,
                    format!("control '{name}': selector '{}' matched nothing", mapping.dom_selector),
                );
                return None;
            }
            Err(err) => {
                self.report(id, DiagnosticKind::Binding, format!("control '{name}': {err}"));
                return None;
            }
        };

        let kind = ControlKind::detect(&elements[0]);
        let mut control = BoundControl::new(mapping, kind, elements);

        if let Some(selector) = &mapping.error_display_selector {
            match container.query_selector(selector) {
                Ok(Some(display)) => control.error_display = Some(display),
                Ok(None) => self.report(
                    id,
                    DiagnosticKind::Binding,
                    format!("control '{name}': error display '{selector}' matched nothing"),
                ),
                Err(err) => self.report(id, DiagnosticKind::Binding, format!("control '{name}': {err}")),
            }
        }

        let single_text = control.elements.len() == 1 && control.elements[0].is_text_capable();
        if let Some(filter) = &mapping.key_filter {
            if !single_text {
                debug!(target = "sync", control = %name, "key filter needs exactly one text control");
            } else {
                match KeyFilter::parse(filter) {
                    Ok(filter) => control.key_filter = Some(filter),
                    Err(err) => self.report(
                        id,
                        DiagnosticKind::Configuration,
                        format!("control '{name}': malformed key filter '{filter}': {err}"),
                    ),
                }
            }
        }
        if let Some(mask) = &mapping.input_mask {
            if single_text {
                control.mask = Some(InputMask::new(mask));
            } else {
                debug!(target = "sync", control = %name, "input mask needs exactly one text control");
            }
        }
        Some(control)
    }

    fn listen(&self, binding: &mut SyncBinding, control: &Rc<BoundControl>, mapping: &FieldMapping) {
        let event = mapping
            .event_type
            .clone()
            .unwrap_or_else(|| control.kind.default_event().to_string());

        for element in &control.elements {
            let handle = {
                let document = self.document.clone();
                let model = binding.model.clone();
                let control = Rc::clone(control);
                let target = element.clone();
                self.document.add_event_listener(element, &event, move |_| {
                    view_to_model(&document, &model, &control, &target);
                })
            };
            binding.listeners.push(handle);

            let blur = {
                let model = binding.model.clone();
                let name = control.name.clone();
                self.document
                    .add_event_listener(element, "blur", move |_| model.mark_touched(&name))
            };
            binding.listeners.push(blur);

            if control.key_filter.is_some() {
                let control = Rc::clone(control);
                let target = element.clone();
                let handle = self.document.add_event_listener(element, "keydown", move |event| {
                    filter_key(&control, &target, event);
                });
                binding.listeners.push(handle);
            }
        }
    }

    /// Idempotent; returns whether a binding was removed.
    pub fn disconnect(&self, id: &str) -> bool {
        let removed = self.bindings.borrow_mut().remove(id);
        match removed {
            Some(binding) => {
                debug!(
                    target = "sync",
                    binding = id,
                    listeners = binding.listeners.len(),
                    "disconnected"
                );
                drop(binding);
                true
            }
            None => false,
        }
    }

    pub fn disconnect_all(&self) {
        let removed: Vec<SyncBinding> = self.bindings.borrow_mut().drain().map(|(_, b)| b).collect();
        drop(removed);
    }

    /// Re-projects every control of a binding.
    pub fn force_dom_update(&self, id: &str) -> bool {
        let Some((model, controls, writes)) = self.binding_parts(id) else {
            return false;
        };
        for control in &controls {
            project(control, &model, &self.classes, &writes);
        }
        true
    }

    /// Marks every control touched and revalidates. Returns the model's
    /// value when it is valid afterwards.
    pub fn submit(&self, id: &str) -> Option<JsonMap<String, JsonValue>> {
        let model = self.model(id)?;
        model.mark_all_touched();
        model.update_all_validity();
        if model.valid() {
            Some(model.value())
        } else {
            None
        }
    }

    pub fn model(&self, id: &str) -> Option<FormModel> {
        self.bindings.borrow().get(id).map(|binding| binding.model.clone())
    }

    pub fn container(&self, id: &str) -> Option<ElementRef> {
        self.bindings
            .borrow()
            .get(id)
            .map(|binding| binding.container.clone())
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.bindings.borrow().contains_key(id)
    }

    pub fn connected_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Element value writes performed by projections of this binding.
    pub fn value_writes(&self, id: &str) -> Option<usize> {
        self.bindings.borrow().get(id).map(|binding| binding.writes.get())
    }

    fn binding_parts(&self, id: &str) -> Option<(FormModel, Vec<Rc<BoundControl>>, Rc<Cell<usize>>)> {
        self.bindings.borrow().get(id).map(|binding| {
            (
                binding.model.clone(),
                binding.controls.clone(),
                Rc::clone(&binding.writes),
            )
        })
    }

    fn report(&self, id: &str, kind: DiagnosticKind, message: String) {
        self.diagnostics.emit(id, kind, message);
    }
}

/// DOM → model. Masked controls are reformatted first; the model only ever
/// sees the accepted data characters.
fn view_to_model(document: &Document, model: &FormModel, control: &BoundControl, element: &ElementRef) {
    let value = match (&control.mask, control.kind) {
        (Some(mask), ControlKind::Text) => {
            let raw = element.value();
            let masked = mask.apply(&raw, document.caret(element));
            if raw != masked.display {
                element.set_value(&masked.display);
            }
            document.set_caret(element, masked.caret);
            JsonValue::String(masked.value)
        }
        _ => match control.kind.read(element) {
            Some(value) => value,
            None => return,
        },
    };
    if model.value_of(&control.name).as_ref() != Some(&value) {
        model.write_from_view(&control.name, value);
    }
}

fn filter_key(control: &BoundControl, element: &ElementRef, event: &DomEvent) {
    let (Some(filter), EventData::Key { key, modifiers }) = (&control.key_filter, event.data()) else {
        return;
    };
    if !filter.allows(key, *modifiers, &element.value()) {
        debug!(target = "sync", control = %control.name, ?key, "keystroke filtered");
        event.prevent_default();
    }
}
