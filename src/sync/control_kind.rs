use serde_json::Value as JsonValue;

use crate::dom::ElementRef;

/// How values move between a control and its elements. Decided once per
/// mapping from the first matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Text inputs, textareas and selects: the `value` property.
    Text,
    /// The `checked` flag as a boolean.
    Checkbox,
    /// A set of radio options; the model holds the checked option's value.
    RadioGroup,
}

impl ControlKind {
    pub fn detect(first: &ElementRef) -> Self {
        if first.tag_name() != "input" {
            return Self::Text;
        }
        match first.input_type().as_str() {
            "checkbox" => Self::Checkbox,
            "radio" => Self::RadioGroup,
            _ => Self::Text,
        }
    }

    pub fn default_event(self) -> &'static str {
        match self {
            Self::Checkbox | Self::RadioGroup => "change",
            Self::Text => "input",
        }
    }

    /// Value carried by an event fired at `element`. A radio option that is
    /// not checked carries nothing.
    pub fn read(self, element: &ElementRef) -> Option<JsonValue> {
        match self {
            Self::Text => Some(JsonValue::String(element.value())),
            Self::Checkbox => Some(JsonValue::Bool(element.checked())),
            Self::RadioGroup => element
                .checked()
                .then(|| JsonValue::String(element.value())),
        }
    }

    /// Writes `value` onto `element` unless it already shows it. Returns
    /// whether the element was touched. `display` overrides the text form of
    /// `value` (masked controls).
    pub fn write(self, element: &ElementRef, value: &JsonValue, display: Option<&str>) -> bool {
        match self {
            Self::Text => {
                let text = display.map(str::to_string).unwrap_or_else(|| value_text(value));
                if element.value() == text {
                    return false;
                }
                element.set_value(&text);
                true
            }
            Self::Checkbox => write_checked(element, truthy(value)),
            Self::RadioGroup => {
                let selected = !value.is_null() && element.value() == value_text(value);
                write_checked(element, selected)
            }
        }
    }
}

fn write_checked(element: &ElementRef, checked: bool) -> bool {
    if element.checked() == checked {
        return false;
    }
    element.set_checked(checked);
    true
}

/// Text form of a model value; null shows as empty.
pub fn value_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        JsonValue::String(text) => !text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use serde_json::json;

    fn form() -> Document {
        Document::from_html(
            r#"<form>
                <input id="name">
                <input id="agree" type="checkbox">
                <input id="r1" type="radio" name="plan" value="basic">
                <input id="r2" type="radio" name="plan" value="pro">
                <select id="country"><option value="ec">EC</option><option value="pe">PE</option></select>
            </form>"#,
        )
    }

    #[test]
    fn detects_kind_from_first_element() {
        let document = form();
        let kind = |id: &str| ControlKind::detect(&document.get_element_by_id(id).unwrap());
        assert_eq!(kind("name"), ControlKind::Text);
        assert_eq!(kind("agree"), ControlKind::Checkbox);
        assert_eq!(kind("r1"), ControlKind::RadioGroup);
        assert_eq!(kind("country"), ControlKind::Text);
        assert_eq!(ControlKind::RadioGroup.default_event(), "change");
    }

    #[test]
    fn writes_only_when_different() {
        let document = form();
        let name = document.get_element_by_id("name").unwrap();
        assert!(ControlKind::Text.write(&name, &json!("Ana"), None));
        assert!(!ControlKind::Text.write(&name, &json!("Ana"), None));
        assert!(ControlKind::Text.write(&name, &json!("Ana"), Some("ANA")));

        let agree = document.get_element_by_id("agree").unwrap();
        assert!(ControlKind::Checkbox.write(&agree, &json!(true), None));
        assert!(!ControlKind::Checkbox.write(&agree, &json!("yes"), None));
        assert_eq!(ControlKind::Checkbox.read(&agree), Some(json!(true)));
    }

    #[test]
    fn radio_reads_only_checked_options() {
        let document = form();
        let basic = document.get_element_by_id("r1").unwrap();
        let pro = document.get_element_by_id("r2").unwrap();
        ControlKind::RadioGroup.write(&basic, &json!("pro"), None);
        ControlKind::RadioGroup.write(&pro, &json!("pro"), None);
        assert_eq!(ControlKind::RadioGroup.read(&basic), None);
        assert_eq!(ControlKind::RadioGroup.read(&pro), Some(json!("pro")));
    }
}
