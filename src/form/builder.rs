use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use super::validators::compile_validators;
use super::FormModel;
use crate::content::FieldMapping;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Builds one [`FormModel`] from a descriptor's field mappings.
pub struct FormModelBuilder<'a> {
    content_id: &'a str,
    diagnostics: &'a Diagnostics,
}

/// The model and the mappings that produced a control. Mappings skipped as
/// duplicates are left out so the synchronizer never binds them.
pub struct BuildOutcome {
    pub model: FormModel,
    pub mappings: Vec<FieldMapping>,
}

impl<'a> FormModelBuilder<'a> {
    pub fn new(content_id: &'a str, diagnostics: &'a Diagnostics) -> Self {
        Self {
            content_id,
            diagnostics,
        }
    }

    pub fn build(
        &self,
        mappings: &[FieldMapping],
        initial_data: Option<&JsonMap<String, JsonValue>>,
    ) -> BuildOutcome {
        let model = FormModel::new();
        let mut accepted = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            let compiled = compile_validators(&mapping.validators);
            for problem in &compiled.problems {
                self.diagnostics.emit(
                    self.content_id,
                    DiagnosticKind::Configuration,
                    format!("control '{}': {problem}", mapping.control_name),
                );
            }
            let seed = mapping.default_value.clone().unwrap_or_else(|| JsonValue::from(""));
            if !model.add_control(&mapping.control_name, seed, compiled.validators) {
                self.diagnostics.emit(
                    self.content_id,
                    DiagnosticKind::Configuration,
                    format!(
                        "duplicate control '{}' ignored (selector '{}')",
                        mapping.control_name, mapping.dom_selector
                    ),
                );
                continue;
            }
            accepted.push(mapping.clone());
        }

        if let Some(data) = initial_data {
            for (name, value) in data {
                if !model.contains(name) {
                    debug!(target = "form", content_id = self.content_id, control = %name, "initial data without a control");
                    continue;
                }
                model.patch(name, value.clone());
            }
        }

        debug!(
            target = "form",
            content_id = self.content_id,
            controls = accepted.len(),
            "form model built"
        );
        BuildOutcome {
            model,
            mappings: accepted,
        }
    }
}

/// Host-side aggregate holding references to the models of bound content,
/// keyed by form id.
#[derive(Clone, Default)]
pub struct ParentModel {
    children: Rc<RefCell<BTreeMap<String, FormModel>>>,
}

impl ParentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `model` under `key`, returning the model it replaced.
    pub fn register(&self, key: &str, model: FormModel) -> Option<FormModel> {
        let replaced = self.children.borrow_mut().insert(key.to_string(), model);
        if replaced.is_some() {
            debug!(target = "form", key, "replaced registered form model");
        }
        replaced
    }

    /// Removes the registration under `key` if it still points at `model`.
    pub fn unregister(&self, key: &str, model: &FormModel) -> bool {
        let mut children = self.children.borrow_mut();
        if children.get(key) == Some(model) {
            children.remove(key);
            return true;
        }
        false
    }

    pub fn get(&self, key: &str) -> Option<FormModel> {
        self.children.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.children.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Valid when no registered child is invalid.
    pub fn valid(&self) -> bool {
        self.children.borrow().values().all(|model| !model.invalid())
    }

    /// Values of every child, nested under its key.
    pub fn value(&self) -> JsonMap<String, JsonValue> {
        self.children
            .borrow()
            .iter()
            .map(|(key, model)| (key.clone(), JsonValue::Object(model.value())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ValidatorConfig;
    use serde_json::json;

    #[test]
    fn seeds_defaults_and_applies_initial_data() {
        let diagnostics = Diagnostics::new();
        let mappings = vec![
            FieldMapping::new("name", "#name").validator(ValidatorConfig::new("required", "needed")),
            FieldMapping::new("agree", "#agree").default_value(json!(false)),
            FieldMapping::new("name", "#other-name"),
            FieldMapping::new("code", "#code").validator(ValidatorConfig::new("luhn", "")),
        ];
        let initial = json!({ "name": "Ana", "ghost": 1 }).as_object().cloned().unwrap();

        let outcome = FormModelBuilder::new("signup", &diagnostics).build(&mappings, Some(&initial));

        assert_eq!(outcome.mappings.len(), 3);
        assert_eq!(outcome.model.value_of("name"), Some(json!("Ana")));
        assert_eq!(outcome.model.value_of("agree"), Some(json!(false)));
        assert_eq!(outcome.model.value_of("code"), Some(json!("")));
        assert!(outcome.model.valid());
        assert!(outcome.model.pristine());

        let history = diagnostics.history_for("signup");
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|d| d.kind == DiagnosticKind::Configuration));
        assert!(history[0].message.contains("duplicate control 'name'"));
    }

    #[test]
    fn parent_replaces_and_only_unregisters_current_model() {
        let parent = ParentModel::new();
        let first = FormModel::new();
        let second = FormModel::new();
        second.add_control("x", json!(""), vec![crate::form::Validator::Required]);

        assert!(parent.register("form", first.clone()).is_none());
        assert_eq!(parent.register("form", second.clone()), Some(first.clone()));
        assert!(!parent.valid());
        assert!(!parent.unregister("form", &first));
        assert!(parent.unregister("form", &second));
        assert!(parent.is_empty());
        assert!(parent.valid());
    }
}
