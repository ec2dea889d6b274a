//! Compiles declarative [`ValidatorConfig`]s into executable rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::content::ValidatorConfig;

// Angular's email rule without its length look-aheads (checked separately).
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_EMAIL_LOCAL_PART_LENGTH: usize = 64;

/// Named failure of one validator, with data describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub token: &'static str,
    pub data: JsonValue,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown validator type '{0}'")]
    UnknownType(String),
    #[error("validator '{0}' requires a value")]
    MissingValue(&'static str),
    #[error("validator '{kind}' has an invalid value {value}")]
    InvalidValue { kind: &'static str, value: JsonValue },
    #[error("validator 'pattern' has a malformed pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub enum Validator {
    Required,
    RequiredTrue,
    Email,
    MinLength(usize),
    MaxLength(usize),
    Pattern { source: String, regex: Regex },
    Min(f64),
    Max(f64),
    MatchValue(JsonValue),
}

impl Validator {
    pub fn compile(config: &ValidatorConfig) -> Result<Self, CompileError> {
        let kind = config.kind.trim().to_ascii_lowercase();
        match kind.as_str() {
            "required" => Ok(Self::Required),
            "requiredtrue" => Ok(Self::RequiredTrue),
            "email" => Ok(Self::Email),
            "minlength" => Ok(Self::MinLength(length_param("minLength", config)?)),
            "maxlength" => Ok(Self::MaxLength(length_param("maxLength", config)?)),
            "pattern" => {
                let value = config.value.as_ref().ok_or(CompileError::MissingValue("pattern"))?;
                let source = value
                    .as_str()
                    .ok_or_else(|| CompileError::InvalidValue {
                        kind: "pattern",
                        value: value.clone(),
                    })?
                    .to_string();
                let regex = Regex::new(&anchor(&source)).map_err(|err| CompileError::InvalidPattern {
                    pattern: source.clone(),
                    source: err,
                })?;
                Ok(Self::Pattern { source, regex })
            }
            "min" => Ok(Self::Min(number_param("min", config)?)),
            "max" => Ok(Self::Max(number_param("max", config)?)),
            "matchvalue" => Ok(Self::MatchValue(
                config
                    .value
                    .clone()
                    .ok_or(CompileError::MissingValue("matchValue"))?,
            )),
            _ => Err(CompileError::UnknownType(config.kind.clone())),
        }
    }

    /// Error token this validator reports; also the key its configured
    /// message is looked up by.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::RequiredTrue => "requiredTrue",
            Self::Email => "email",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Pattern { .. } => "pattern",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::MatchValue(_) => "matchValue",
        }
    }

    pub fn validate(&self, value: &JsonValue) -> Option<ValidationError> {
        let failed = |data: JsonValue| {
            Some(ValidationError {
                token: self.token(),
                data,
            })
        };

        match self {
            Self::Required => is_empty(value).then(|| json!(true)).and_then(failed),
            Self::RequiredTrue => (value != &JsonValue::Bool(true)).then(|| json!(true)).and_then(failed),
            Self::Email => {
                if is_empty(value) {
                    return None;
                }
                let text = as_text(value);
                (!is_email(&text)).then(|| json!(true)).and_then(failed)
            }
            Self::MinLength(required) => {
                if is_empty(value) {
                    return None;
                }
                let actual = length_of(value)?;
                (actual < *required)
                    .then(|| json!({ "requiredLength": required, "actualLength": actual }))
                    .and_then(failed)
            }
            Self::MaxLength(required) => {
                let actual = length_of(value)?;
                (actual > *required)
                    .then(|| json!({ "requiredLength": required, "actualLength": actual }))
                    .and_then(failed)
            }
            Self::Pattern { source, regex } => {
                if is_empty(value) {
                    return None;
                }
                let text = as_text(value);
                (!regex.is_match(&text))
                    .then(|| json!({ "requiredPattern": anchor(source), "actualValue": text }))
                    .and_then(failed)
            }
            Self::Min(min) => {
                let actual = as_number(value)?;
                (actual < *min)
                    .then(|| json!({ "min": min, "actual": actual }))
                    .and_then(failed)
            }
            Self::Max(max) => {
                let actual = as_number(value)?;
                (actual > *max)
                    .then(|| json!({ "max": max, "actual": actual }))
                    .and_then(failed)
            }
            Self::MatchValue(expected) => (!values_match(expected, value))
                .then(|| json!({ "expected": expected, "actual": value }))
                .and_then(failed),
        }
    }
}

/// Compiled validators plus whatever could not be compiled. Problems never
/// invalidate the control; the offending rule is simply absent.
#[derive(Debug, Default)]
pub struct CompiledValidators {
    pub validators: Vec<Validator>,
    pub problems: Vec<CompileError>,
}

pub fn compile_validators(configs: &[ValidatorConfig]) -> CompiledValidators {
    let mut compiled = CompiledValidators::default();
    for config in configs {
        match Validator::compile(config) {
            Ok(validator) => compiled.validators.push(validator),
            Err(problem) => compiled.problems.push(problem),
        }
    }
    compiled
}

/// Runs every validator, keeping failures in declaration order.
pub fn run_validators(validators: &[Validator], value: &JsonValue) -> Vec<ValidationError> {
    validators
        .iter()
        .filter_map(|validator| validator.validate(value))
        .collect()
}

/// Builtin text for a failure whose validator was configured without a
/// message.
pub fn default_message(error: &ValidationError) -> String {
    let length = || error.data["requiredLength"].as_u64().unwrap_or_default();
    match error.token {
        "required" => "This field is required.".to_string(),
        "requiredTrue" => "You must select this option.".to_string(),
        "email" => "Invalid email format.".to_string(),
        "minLength" => format!("Minimum {} characters.", length()),
        "maxLength" => format!("Maximum {} characters.", length()),
        "pattern" => "The format is not valid.".to_string(),
        "min" => format!("Must be at least {}.", error.data["min"]),
        "max" => format!("Must be at most {}.", error.data["max"]),
        token => format!("Error: {token}"),
    }
}

/// Null, empty string and empty array count as "no value".
pub fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(text) => text.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn length_of(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::String(text) => Some(text.chars().count()),
        JsonValue::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn values_match(expected: &JsonValue, actual: &JsonValue) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (JsonValue::Number(_), _) => as_number(expected) == as_number(actual) && as_number(actual).is_some(),
        (JsonValue::String(text), other) | (other, JsonValue::String(text)) => {
            !other.is_null() && *text == as_text(other)
        }
        _ => false,
    }
}

fn is_email(text: &str) -> bool {
    let Some(at) = text.find('@') else {
        return false;
    };
    text.len() <= MAX_EMAIL_LENGTH && at <= MAX_EMAIL_LOCAL_PART_LENGTH && EMAIL_RE.is_match(text)
}

fn anchor(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(pattern);
    if !pattern.ends_with('$') {
        anchored.push('$');
    }
    anchored
}

fn length_param(kind: &'static str, config: &ValidatorConfig) -> Result<usize, CompileError> {
    let value = config.value.as_ref().ok_or(CompileError::MissingValue(kind))?;
    let parsed = match value {
        JsonValue::Number(number) => number.as_u64(),
        JsonValue::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|length| usize::try_from(length).ok())
        .ok_or_else(|| CompileError::InvalidValue {
            kind,
            value: value.clone(),
        })
}

fn number_param(kind: &'static str, config: &ValidatorConfig) -> Result<f64, CompileError> {
    let value = config.value.as_ref().ok_or(CompileError::MissingValue(kind))?;
    as_number(value).ok_or_else(|| CompileError::InvalidValue {
        kind,
        value: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(kind: &str, value: Option<JsonValue>) -> Validator {
        let mut config = ValidatorConfig::new(kind, "");
        config.value = value;
        Validator::compile(&config).unwrap()
    }

    #[test]
    fn required_rejects_null_and_empty_only() {
        let required = compile("required", None);
        assert!(required.validate(&JsonValue::Null).is_some());
        assert!(required.validate(&json!("")).is_some());
        assert!(required.validate(&json!("x")).is_none());
        assert!(required.validate(&json!(false)).is_none());
    }

    #[test]
    fn required_true_needs_boolean_true() {
        let rule = compile("requiredTrue", None);
        assert_eq!(rule.validate(&json!(false)).unwrap().token, "requiredTrue");
        assert!(rule.validate(&json!("true")).is_some());
        assert!(rule.validate(&json!(true)).is_none());
    }

    #[test]
    fn min_length_reports_lengths() {
        let rule = compile("minLength", Some(json!(3)));
        let error = rule.validate(&json!("ab")).unwrap();
        assert_eq!(error.token, "minLength");
        assert_eq!(error.data, json!({ "requiredLength": 3, "actualLength": 2 }));
        assert!(rule.validate(&json!("")).is_none());
        assert!(rule.validate(&json!("abc")).is_none());
    }

    #[test]
    fn max_length_accepts_string_parameter() {
        let rule = compile("maxlength", Some(json!("2")));
        assert!(rule.validate(&json!("abc")).is_some());
        assert!(rule.validate(&json!("ab")).is_none());
    }

    #[test]
    fn pattern_is_anchored() {
        let rule = compile("pattern", Some(json!("[0-9]{3}")));
        assert!(rule.validate(&json!("123")).is_none());
        let error = rule.validate(&json!("1234")).unwrap();
        assert_eq!(error.data["requiredPattern"], json!("^[0-9]{3}$"));
        assert!(rule.validate(&json!("")).is_none());
    }

    #[test]
    fn email_shape() {
        let rule = compile("email", None);
        assert!(rule.validate(&json!("ana.paredes@ejemplo.com")).is_none());
        assert!(rule.validate(&json!("not-an-email")).is_some());
        assert!(rule.validate(&json!("a@b")).is_none());
        assert!(rule.validate(&json!("")).is_none());
    }

    #[test]
    fn min_and_max_skip_non_numeric_input() {
        let min = compile("min", Some(json!(18)));
        let max = compile("max", Some(json!("99.5")));
        assert!(min.validate(&json!("17")).is_some());
        assert!(min.validate(&json!(18)).is_none());
        assert!(min.validate(&json!("abc")).is_none());
        assert!(max.validate(&json!(100)).is_some());
        assert!(max.validate(&json!("")).is_none());
    }

    #[test]
    fn match_value_compares_against_literal() {
        let rule = compile("matchValue", Some(json!("ACEPTO")));
        assert!(rule.validate(&json!("ACEPTO")).is_none());
        let error = rule.validate(&json!("acepto")).unwrap();
        assert_eq!(error.data, json!({ "expected": "ACEPTO", "actual": "acepto" }));

        let numeric = compile("matchValue", Some(json!(42)));
        assert!(numeric.validate(&json!("42")).is_none());
        assert!(numeric.validate(&json!("41")).is_some());
    }

    #[test]
    fn default_messages_use_error_data() {
        let rule = compile("minLength", Some(json!(5)));
        let error = rule.validate(&json!("abc")).unwrap();
        assert_eq!(default_message(&error), "Minimum 5 characters.");
        let mismatch = compile("matchValue", Some(json!("x"))).validate(&json!("y")).unwrap();
        assert_eq!(default_message(&mismatch), "Error: matchValue");
    }

    #[test]
    fn problems_are_collected_not_fatal() {
        let compiled = compile_validators(&[
            ValidatorConfig::new("required", "req"),
            ValidatorConfig::new("creditCard", "cc"),
            ValidatorConfig::new("minLength", "short"),
            ValidatorConfig::new("pattern", "bad").with_value(json!("(unclosed")),
        ]);
        assert_eq!(compiled.validators.len(), 1);
        assert_eq!(compiled.problems.len(), 3);
        assert!(matches!(compiled.problems[0], CompileError::UnknownType(ref kind) if kind == "creditCard"));
        assert!(matches!(compiled.problems[1], CompileError::MissingValue("minLength")));
        assert!(matches!(compiled.problems[2], CompileError::InvalidPattern { .. }));
    }
}
