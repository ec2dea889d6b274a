//! Drives the disabled state of arbitrary elements from aggregate model
//! state.

use std::rc::Rc;

use tracing::debug;

use crate::content::{ButtonRule, DisableWhen, NamedCondition};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dom::ElementRef;
use crate::form::{ChangeScope, FormModel, ModelSubscription};

/// Whether `condition` asks for the element to be disabled.
pub fn evaluate(condition: NamedCondition, model: &FormModel) -> bool {
    match condition {
        NamedCondition::FormIsInvalid => model.invalid(),
        NamedCondition::FormIsValid => model.valid(),
        NamedCondition::FormIsPristine => model.pristine(),
        NamedCondition::FormIsDirty => model.dirty(),
        NamedCondition::FormIsTouched => model.touched(),
        NamedCondition::FormIsUntouched => model.untouched(),
        NamedCondition::FormIsPending => model.pending(),
        NamedCondition::FormItselfIsDisabled => model.disabled(),
        NamedCondition::FormItselfIsEnabled => model.enabled(),
        NamedCondition::AlwaysDisable => true,
        NamedCondition::NeverDisable => false,
        NamedCondition::FormIsInvalidOrPristine => model.invalid() || model.pristine(),
        NamedCondition::FormIsEmpty => model.is_empty(),
        NamedCondition::FormIsNotEmpty => !model.is_empty(),
    }
}

/// `None` leaves the element as it is.
fn decide(rule: &ButtonRule, model: &FormModel) -> Option<bool> {
    match &rule.disable_when {
        DisableWhen::Named(condition) => Some(evaluate(*condition, model)),
        DisableWhen::Custom(predicate) => Some(predicate(model)),
        DisableWhen::Unrecognized(_) => None,
    }
}

/// Rules attached to one container; re-evaluated on every model change until
/// dropped.
pub struct ButtonRuleEngine {
    _subscription: ModelSubscription,
    rules: Rc<Vec<ButtonRule>>,
}

impl ButtonRuleEngine {
    /// Reports unknown conditions and selectors that match nothing, then
    /// performs the first projection.
    pub fn attach(
        content_id: &str,
        container: &ElementRef,
        rules: Vec<ButtonRule>,
        model: &FormModel,
        diagnostics: &Diagnostics,
    ) -> Self {
        for rule in &rules {
            if let DisableWhen::Unrecognized(name) = &rule.disable_when {
                diagnostics.emit(
                    content_id,
                    DiagnosticKind::Configuration,
                    format!("button rule '{}': unknown condition '{name}'", rule.selector),
                );
            }
            match container.query_selector_all(&rule.selector) {
                Ok(elements) if elements.is_empty() => diagnostics.emit(
                    content_id,
                    DiagnosticKind::Binding,
                    format!("button rule selector '{}' matched nothing", rule.selector),
                ),
                Ok(_) => {}
                Err(err) => diagnostics.emit(content_id, DiagnosticKind::Binding, format!("button rule: {err}")),
            }
        }

        let rules = Rc::new(rules);
        apply(container, &rules, model);

        let subscription = {
            let rules = Rc::clone(&rules);
            let container = container.clone();
            let model_ref = model.clone();
            model.subscribe(ChangeScope::Form, move |_| apply(&container, &rules, &model_ref))
        };
        debug!(target = "rules", content_id, rules = rules.len(), "button rules attached");
        Self {
            _subscription: subscription,
            rules,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

fn apply(container: &ElementRef, rules: &[ButtonRule], model: &FormModel) {
    for rule in rules {
        let Some(disabled) = decide(rule, model) else {
            continue;
        };
        for element in container.query_selector_all(&rule.selector).unwrap_or_default() {
            if element.disabled() != disabled {
                element.set_disabled(disabled);
            }
            element.set_attr("aria-disabled", if disabled { "true" } else { "false" });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::form::Validator;
    use serde_json::json;

    fn setup() -> (Document, ElementRef, FormModel, Diagnostics) {
        let document = Document::from_html(
            r#"<div id="host"><button id="send">Send</button><button id="reset" disabled>Reset</button></div>"#,
        );
        let host = document.get_element_by_id("host").unwrap();
        let model = FormModel::new();
        model.add_control("name", json!(""), vec![Validator::Required]);
        (document, host, model, Diagnostics::new())
    }

    #[test]
    fn invalid_form_disables_then_enables() {
        let (document, host, model, diagnostics) = setup();
        let _engine = ButtonRuleEngine::attach(
            "c",
            &host,
            vec![ButtonRule::named("#send", NamedCondition::FormIsInvalid)],
            &model,
            &diagnostics,
        );
        let send = document.get_element_by_id("send").unwrap();
        assert!(send.disabled());
        assert_eq!(send.attr("aria-disabled").as_deref(), Some("true"));

        model.set_value("name", json!("Ana"));
        assert!(!send.disabled());
    }

    #[test]
    fn custom_predicates_and_empty_form() {
        let (document, host, model, diagnostics) = setup();
        let _engine = ButtonRuleEngine::attach(
            "c",
            &host,
            vec![
                ButtonRule::named("#send", NamedCondition::FormIsEmpty),
                ButtonRule::custom("#reset", |model| model.value_of("name") != Some(json!("x"))),
            ],
            &model,
            &diagnostics,
        );
        let send = document.get_element_by_id("send").unwrap();
        let reset = document.get_element_by_id("reset").unwrap();
        assert!(send.disabled());
        assert!(reset.disabled());

        model.set_value("name", json!("x"));
        assert!(!send.disabled());
        assert!(!reset.disabled());
    }

    #[test]
    fn unknown_conditions_leave_elements_alone() {
        let (document, host, model, diagnostics) = setup();
        let _engine = ButtonRuleEngine::attach(
            "c",
            &host,
            vec![
                ButtonRule {
                    selector: "#reset".into(),
                    disable_when: DisableWhen::Unrecognized("whenever".into()),
                },
                ButtonRule::named("#missing", NamedCondition::AlwaysDisable),
            ],
            &model,
            &diagnostics,
        );
        assert!(document.get_element_by_id("reset").unwrap().disabled());
        let kinds: Vec<DiagnosticKind> = diagnostics.history().into_iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Configuration, DiagnosticKind::Binding]);
    }

    #[test]
    fn detaching_stops_evaluation() {
        let (document, host, model, diagnostics) = setup();
        let engine = ButtonRuleEngine::attach(
            "c",
            &host,
            vec![ButtonRule::named("#send", NamedCondition::FormIsPristine)],
            &model,
            &diagnostics,
        );
        drop(engine);
        model.write_from_view("name", json!("typed"));
        assert!(document.get_element_by_id("send").unwrap().disabled());
        assert_eq!(model.subscriber_count(), 0);
    }
}
