//! Content descriptors and where they come from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::ContentError;
use crate::form::FormModel;

/// One externally-sourced renderable unit: markup, stylesheet and the form
/// semantics that go with it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
    #[serde(alias = "id_DocumentHTMLCSS")]
    pub id: String,
    #[serde(alias = "plantillaHTML", alias = "htmlComponent", default)]
    pub markup: String,
    #[serde(alias = "css", alias = "cssComponent", default)]
    pub stylesheet: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub initial_data: Option<JsonMap<String, JsonValue>>,
    #[serde(default)]
    pub button_rules: Vec<ButtonRule>,
    /// Free-form tag of the producing backend configuration.
    #[serde(alias = "configuracion", default)]
    pub source: Option<String>,
    #[serde(alias = "otros", default)]
    pub extra: Option<JsonMap<String, JsonValue>>,
}

impl ContentDescriptor {
    pub fn new(id: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            markup: markup.into(),
            ..Self::default()
        }
    }

    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = Some(css.into());
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    pub fn with_rule(mut self, rule: ButtonRule) -> Self {
        self.button_rules.push(rule);
        self
    }

    pub fn with_initial_data(mut self, data: JsonMap<String, JsonValue>) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Key under which the model is registered in a parent model.
    pub fn model_key(&self) -> &str {
        self.form_id.as_deref().unwrap_or(&self.id)
    }

    /// Id reported as the origin of clicks and submissions.
    pub fn source_id(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.id)
    }
}

/// Declares how one model control relates to the elements matched by
/// `dom_selector` inside the bound container.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub control_name: String,
    pub dom_selector: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub error_display_selector: Option<String>,
    #[serde(default)]
    pub default_value: Option<JsonValue>,
    #[serde(alias = "validatorConfig", default)]
    pub validators: Vec<ValidatorConfig>,
    #[serde(default)]
    pub key_filter: Option<String>,
    #[serde(default)]
    pub input_mask: Option<String>,
}

impl FieldMapping {
    pub fn new(control_name: impl Into<String>, dom_selector: impl Into<String>) -> Self {
        Self {
            control_name: control_name.into(),
            dom_selector: dom_selector.into(),
            ..Self::default()
        }
    }

    pub fn event(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn errors_in(mut self, selector: impl Into<String>) -> Self {
        self.error_display_selector = Some(selector.into());
        self
    }

    pub fn default_value(mut self, value: JsonValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn validator(mut self, config: ValidatorConfig) -> Self {
        self.validators.push(config);
        self
    }

    pub fn key_filter(mut self, filter: impl Into<String>) -> Self {
        self.key_filter = Some(filter.into());
        self
    }

    pub fn mask(mut self, mask: impl Into<String>) -> Self {
        self.input_mask = Some(mask.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidatorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub message: String,
}

impl ValidatorConfig {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
            message: message.into(),
        }
    }

    pub fn with_value(mut self, value: JsonValue) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonRule {
    pub selector: String,
    pub disable_when: DisableWhen,
}

impl ButtonRule {
    pub fn named(selector: impl Into<String>, condition: NamedCondition) -> Self {
        Self {
            selector: selector.into(),
            disable_when: DisableWhen::Named(condition),
        }
    }

    pub fn custom(selector: impl Into<String>, predicate: impl Fn(&FormModel) -> bool + 'static) -> Self {
        Self {
            selector: selector.into(),
            disable_when: DisableWhen::Custom(Rc::new(predicate)),
        }
    }
}

/// When a rule's element should be disabled.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub enum DisableWhen {
    Named(NamedCondition),
    /// A name outside the known vocabulary; reported when evaluated.
    Unrecognized(String),
    Custom(Rc<dyn Fn(&FormModel) -> bool>),
}

impl fmt::Debug for DisableWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(condition) => f.debug_tuple("Named").field(condition).finish(),
            Self::Unrecognized(name) => f.debug_tuple("Unrecognized").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<String> for DisableWhen {
    fn from(name: String) -> Self {
        match NamedCondition::parse(&name) {
            Some(condition) => Self::Named(condition),
            None => Self::Unrecognized(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCondition {
    FormIsInvalid,
    FormIsValid,
    FormIsPristine,
    FormIsDirty,
    FormIsTouched,
    FormIsUntouched,
    FormIsPending,
    FormItselfIsDisabled,
    FormItselfIsEnabled,
    AlwaysDisable,
    NeverDisable,
    FormIsInvalidOrPristine,
    FormIsEmpty,
    FormIsNotEmpty,
}

impl NamedCondition {
    pub const ALL: [NamedCondition; 14] = [
        Self::FormIsInvalid,
        Self::FormIsValid,
        Self::FormIsPristine,
        Self::FormIsDirty,
        Self::FormIsTouched,
        Self::FormIsUntouched,
        Self::FormIsPending,
        Self::FormItselfIsDisabled,
        Self::FormItselfIsEnabled,
        Self::AlwaysDisable,
        Self::NeverDisable,
        Self::FormIsInvalidOrPristine,
        Self::FormIsEmpty,
        Self::FormIsNotEmpty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FormIsInvalid => "formIsInvalid",
            Self::FormIsValid => "formIsValid",
            Self::FormIsPristine => "formIsPristine",
            Self::FormIsDirty => "formIsDirty",
            Self::FormIsTouched => "formIsTouched",
            Self::FormIsUntouched => "formIsUntouched",
            Self::FormIsPending => "formIsPending",
            Self::FormItselfIsDisabled => "formItselfIsDisabled",
            Self::FormItselfIsEnabled => "formItselfIsEnabled",
            Self::AlwaysDisable => "alwaysDisable",
            Self::NeverDisable => "neverDisable",
            Self::FormIsInvalidOrPristine => "formIsInvalidOrPristine",
            Self::FormIsEmpty => "formIsEmpty",
            Self::FormIsNotEmpty => "formIsNotEmpty",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|condition| condition.name() == name.trim())
    }
}

// ---- sources ----------------------------------------------------------------

/// Where descriptors come from (an API, a file, a fixture).
#[async_trait(?Send)]
pub trait ContentSource {
    async fn fetch(&self) -> Result<Vec<ContentDescriptor>, ContentError>;
}

/// Serves a fixed list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticContentSource {
    descriptors: Vec<ContentDescriptor>,
}

impl StaticContentSource {
    pub fn new(descriptors: Vec<ContentDescriptor>) -> Self {
        Self { descriptors }
    }
}

#[async_trait(?Send)]
impl ContentSource for StaticContentSource {
    async fn fetch(&self) -> Result<Vec<ContentDescriptor>, ContentError> {
        Ok(self.descriptors.clone())
    }
}

/// Reads descriptors from a `.json`, `.yaml` or `.yml` file.
#[derive(Debug, Clone)]
pub struct FileContentSource {
    path: PathBuf,
}

impl FileContentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait(?Send)]
impl ContentSource for FileContentSource {
    async fn fetch(&self) -> Result<Vec<ContentDescriptor>, ContentError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ContentError::Io {
                path: self.path.clone(),
                source,
            })?;
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let document: ContentDocument = match extension.as_str() {
            "json" => serde_json::from_str(&contents)?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            other => return Err(ContentError::UnsupportedFormat(other.to_string())),
        };
        document.into_descriptors()
    }
}

/// Accepted top-level shapes of a content payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentDocument {
    Envelope { ok: bool, doc: Vec<ContentDescriptor> },
    List(Vec<ContentDescriptor>),
    Single(Box<ContentDescriptor>),
}

impl ContentDocument {
    pub fn into_descriptors(self) -> Result<Vec<ContentDescriptor>, ContentError> {
        match self {
            Self::Envelope { ok: false, .. } => Err(ContentError::Rejected),
            Self::Envelope { doc, .. } => Ok(doc),
            Self::List(descriptors) => Ok(descriptors),
            Self::Single(descriptor) => Ok(vec![*descriptor]),
        }
    }
}
