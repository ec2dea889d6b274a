//! Delegated click and submit handling for bound containers, and the hub
//! the resulting interactions are published on.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dom::{Document, DomEvent, ElementRef, ListenerHandle};
use crate::sync::FormDomSynchronizer;

/// Action reported for an element whose action attribute is empty.
pub const UNKNOWN_CLICK_ACTION: &str = "unknown_click_action";

#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub action: String,
    pub source_id: String,
    pub clicked_element: ElementRef,
    pub original_event: DomEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub form_id: String,
    pub form_name: Option<String>,
    pub source_id: String,
    pub data: JsonMap<String, JsonValue>,
}

/// Fan-out of user interactions to every subscriber. Closed receivers are
/// dropped on the next publish.
#[derive(Clone, Default)]
pub struct Interactions {
    inner: Rc<RefCell<InteractionsInner>>,
}

#[derive(Default)]
struct InteractionsInner {
    actions: Vec<UnboundedSender<ActionEvent>>,
    submissions: Vec<UnboundedSender<FormSubmission>>,
}

impl Interactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> UnboundedReceiver<ActionEvent> {
        let (tx, rx) = unbounded_channel();
        self.inner.borrow_mut().actions.push(tx);
        rx
    }

    pub fn submissions(&self) -> UnboundedReceiver<FormSubmission> {
        let (tx, rx) = unbounded_channel();
        self.inner.borrow_mut().submissions.push(tx);
        rx
    }

    pub fn publish_action(&self, event: ActionEvent) {
        info!(target = "actions", action = %event.action, source_id = %event.source_id, "click action");
        self.inner
            .borrow_mut()
            .actions
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn publish_submission(&self, submission: FormSubmission) {
        info!(target = "actions", form_id = %submission.form_id, source_id = %submission.source_id, "form submitted");
        self.inner
            .borrow_mut()
            .submissions
            .retain(|tx| tx.send(submission.clone()).is_ok());
    }
}

/// What a router needs to know about the content it serves.
#[derive(Debug, Clone)]
pub struct RouterContext {
    /// Binding whose model is submitted.
    pub binding_id: String,
    pub source_id: String,
    /// Descriptor-level form id, used when a form carries none.
    pub form_id: Option<String>,
    pub action_attribute: String,
    pub form_id_attribute: String,
    pub max_depth: usize,
    /// Submit the form's own fields instead of a model.
    pub extract_fields: bool,
}

/// One delegated click listener on the container and one submit listener per
/// form present when it was attached.
pub struct ActionRouter {
    listeners: Vec<ListenerHandle>,
}

impl ActionRouter {
    pub fn attach(
        document: &Document,
        container: &ElementRef,
        context: RouterContext,
        synchronizer: FormDomSynchronizer,
        interactions: Interactions,
        diagnostics: Diagnostics,
    ) -> Self {
        let context = Rc::new(context);
        let mut listeners = Vec::new();

        let click = {
            let context = Rc::clone(&context);
            let boundary = container.clone();
            let interactions = interactions.clone();
            document.add_event_listener(container, "click", move |event| {
                route_click(&context, &boundary, &interactions, event);
            })
        };
        listeners.push(click);

        let forms = container.query_selector_all("form").unwrap_or_default();
        let forms = if container.tag_name() == "form" {
            std::iter::once(container.clone()).chain(forms).collect()
        } else {
            forms
        };
        for form in forms {
            let context = Rc::clone(&context);
            let synchronizer = synchronizer.clone();
            let interactions = interactions.clone();
            let diagnostics = diagnostics.clone();
            let target = form.clone();
            let handle = document.add_event_listener(&form, "submit", move |event| {
                event.prevent_default();
                submit_form(&context, &target, &synchronizer, &interactions, &diagnostics);
            });
            listeners.push(handle);
        }

        debug!(
            target = "actions",
            binding = %context.binding_id,
            listeners = listeners.len(),
            "router attached"
        );
        Self { listeners }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn detach(self) {}
}

fn route_click(context: &RouterContext, container: &ElementRef, interactions: &Interactions, event: &DomEvent) {
    let mut path = event.target().inclusive_ancestors();
    for _ in 0..context.max_depth {
        let Some(element) = path.next() else {
            return;
        };
        if let Some(action) = element.attr(&context.action_attribute) {
            let action = match action.trim() {
                "" => UNKNOWN_CLICK_ACTION.to_string(),
                named => named.to_string(),
            };
            interactions.publish_action(ActionEvent {
                action,
                source_id: context.source_id.clone(),
                clicked_element: element,
                original_event: event.clone(),
            });
            return;
        }
        if &element == container {
            return;
        }
    }
    debug!(target = "actions", depth = context.max_depth, "action walk exhausted");
}

fn submit_form(
    context: &RouterContext,
    form: &ElementRef,
    synchronizer: &FormDomSynchronizer,
    interactions: &Interactions,
    diagnostics: &Diagnostics,
) {
    let form_id = form
        .attr(&context.form_id_attribute)
        .filter(|id| !id.is_empty())
        .or_else(|| context.form_id.clone())
        .unwrap_or_else(|| context.binding_id.clone());

    let data = if context.extract_fields {
        Some(extract_form_data(form))
    } else {
        synchronizer.submit(&context.binding_id)
    };
    match data {
        Some(data) => interactions.publish_submission(FormSubmission {
            form_id,
            form_name: form.attr("name"),
            source_id: context.source_id.clone(),
            data,
        }),
        None => diagnostics.emit(
            &context.binding_id,
            DiagnosticKind::Submission,
            format!("form '{form_id}' is invalid; submission suppressed"),
        ),
    }
}

/// The form's successful controls by `name`. Repeated names collect into an
/// array; disabled controls, unchecked checkboxes and radios, and buttons are
/// left out.
pub fn extract_form_data(form: &ElementRef) -> JsonMap<String, JsonValue> {
    let mut data = JsonMap::new();
    for field in form
        .query_selector_all("input, select, textarea")
        .unwrap_or_default()
    {
        let Some(name) = field.attr("name").filter(|name| !name.is_empty()) else {
            continue;
        };
        if field.disabled() {
            continue;
        }
        let value = match field.input_type().as_str() {
            "submit" | "button" | "reset" | "image" | "file" => continue,
            "checkbox" | "radio" if !field.checked() => continue,
            "checkbox" | "radio" => field.attr("value").unwrap_or_else(|| "on".to_string()),
            _ => field.value(),
        };
        let value = JsonValue::String(value);
        match data.get_mut(&name) {
            Some(JsonValue::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = JsonValue::Array(vec![first, value]);
            }
            None => {
                data.insert(name, value);
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_successful_controls() {
        let document = Document::from_html(
            r#"<form id="f">
                <input name="name" value="Ana">
                <input name="tags" type="checkbox" value="a" checked>
                <input name="tags" type="checkbox" value="b" checked>
                <input name="tags" type="checkbox" value="c">
                <input name="plan" type="radio" value="basic">
                <input name="plan" type="radio" value="pro" checked>
                <input name="secret" value="x" disabled>
                <input type="submit" name="go" value="Send">
                <textarea name="notes">hola</textarea>
                <select name="country"><option value="ec">EC</option><option value="pe" selected>PE</option></select>
            </form>"#,
        );
        let form = document.get_element_by_id("f").unwrap();
        let data = extract_form_data(&form);
        assert_eq!(
            JsonValue::Object(data),
            json!({
                "name": "Ana",
                "tags": ["a", "b"],
                "plan": "pro",
                "notes": "hola",
                "country": "pe"
            })
        );
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let interactions = Interactions::new();
        let mut open = interactions.submissions();
        drop(interactions.submissions());
        interactions.publish_submission(FormSubmission {
            form_id: "f".into(),
            form_name: None,
            source_id: "s".into(),
            data: JsonMap::new(),
        });
        assert_eq!(open.try_recv().unwrap().form_id, "f");
        assert_eq!(interactions.inner.borrow().submissions.len(), 1);
    }
}
