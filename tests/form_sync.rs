use formbridge::content::{ButtonRule, FieldMapping, NamedCondition, ValidatorConfig};
use formbridge::{ContentDescriptor, Document, ElementRef, Engine, EngineConfig};
use keyboard_types::{Key, Modifiers};
use serde_json::json;

const SIGNUP: &str = r#"
    <form id="signup">
        <input id="name" name="name">
        <small id="name-error"></small>
        <input id="phone" name="phone">
        <input id="age" name="age">
        <input id="agree" type="checkbox" name="agree">
        <label><input type="radio" name="plan" value="basic"> Basic</label>
        <label><input type="radio" name="plan" value="pro"> Pro</label>
        <button id="send" type="submit">Send</button>
        <button id="clear" type="button">Clear</button>
    </form>"#;

fn bound(descriptor: &ContentDescriptor) -> (Document, Engine) {
    let document = Document::new();
    let body = document.body().unwrap();
    document.set_inner_html(&body, r#"<div id="host"></div>"#);
    let host = document.get_element_by_id("host").unwrap();
    document.set_inner_html(&host, &descriptor.markup);
    let engine = Engine::new(document.clone(), EngineConfig::default());
    engine.connect(descriptor, &host).unwrap();
    (document, engine)
}

fn element(document: &Document, id: &str) -> ElementRef {
    document.get_element_by_id(id).unwrap()
}

#[test]
fn required_field_disables_send_until_filled() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(
            FieldMapping::new("name", "#name")
                .errors_in("#name-error")
                .validator(ValidatorConfig::new("required", "")),
        )
        .with_rule(ButtonRule::named("#send", NamedCondition::FormIsInvalid));
    let (document, engine) = bound(&descriptor);
    let send = element(&document, "send");
    let name = element(&document, "name");
    let error = element(&document, "name-error");

    assert!(engine.model("signup").unwrap().invalid());
    assert!(send.disabled());
    // No feedback before the user interacts.
    assert_eq!(error.text_content(), "");
    assert!(!name.has_class("is-invalid"));

    document.type_text(&name, "A");
    assert!(!send.disabled());
    assert!(name.has_class("is-valid"));

    document.press_key(&name, Key::Backspace, Modifiers::empty());
    assert!(send.disabled());
    assert!(name.has_class("is-invalid"));
    assert_eq!(error.text_content(), "This field is required.");
}

#[test]
fn identical_dom_writes_cause_no_projection_write() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("name", "#name"))
        .with_mapping(FieldMapping::new("plan", "input[name=plan]"));
    let (document, engine) = bound(&descriptor);
    let name = element(&document, "name");
    let baseline = engine.value_writes("signup").unwrap();

    document.fill(&name, "Zoe");
    document.fill(&name, "Zoe");
    let radios = document.query_selector_all("input[name=plan]").unwrap();
    document.click(&radios[1]);
    document.click(&radios[1]);
    assert_eq!(engine.value_writes("signup"), Some(baseline));

    let model = engine.model("signup").unwrap();
    assert_eq!(model.value_of("plan"), Some(json!("pro")));
    model.set_value("plan", json!("basic"));
    assert!(radios[0].checked());
    assert!(!radios[1].checked());
    assert!(engine.value_writes("signup").unwrap() > baseline);
}

#[test]
fn mask_shows_formatted_text_and_stores_digits() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("phone", "#phone").mask("999-999"));
    let (document, engine) = bound(&descriptor);
    let phone = element(&document, "phone");

    document.type_text(&phone, "1234567");
    assert_eq!(phone.value(), "123-456");
    assert_eq!(document.caret(&phone), 7);
    assert_eq!(
        engine.model("signup").unwrap().value_of("phone"),
        Some(json!("123456"))
    );
}

#[test]
fn int_filter_suppresses_letters() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("age", "#age").key_filter("int"));
    let (document, engine) = bound(&descriptor);
    let age = element(&document, "age");

    assert!(document.key_down(&age, Key::Character("a".into()), Modifiers::empty()).default_prevented);
    assert!(!document.key_down(&age, Key::Character("5".into()), Modifiers::empty()).default_prevented);
    assert_eq!(document.type_text(&age, "4a2"), 2);
    assert_eq!(age.value(), "42");
    assert_eq!(engine.model("signup").unwrap().value_of("age"), Some(json!("42")));
}

#[test]
fn malformed_key_filter_is_reported_and_keys_pass() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("age", "#age").key_filter("[0-9"));
    let (document, engine) = bound(&descriptor);
    let age = element(&document, "age");

    assert_eq!(document.type_text(&age, "x1"), 2);
    let history = engine.diagnostics().history_for("signup");
    assert_eq!(history.len(), 1);
    assert!(history[0].message.contains("malformed key filter"));
}

#[test]
fn form_is_empty_flips_on_first_character() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("name", "#name"))
        .with_mapping(FieldMapping::new("phone", "#phone"))
        .with_rule(ButtonRule::named("#clear", NamedCondition::FormIsEmpty));
    let (document, _engine) = bound(&descriptor);
    let clear = element(&document, "clear");
    let phone = element(&document, "phone");

    assert!(clear.disabled());
    document.type_text(&phone, "9");
    assert!(!clear.disabled());
    document.press_key(&phone, Key::Backspace, Modifiers::empty());
    assert!(clear.disabled());
}

#[test]
fn checkbox_and_required_true() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(
            FieldMapping::new("agree", "#agree")
                .default_value(json!(false))
                .validator(ValidatorConfig::new("requiredTrue", "Please accept")),
        )
        .with_rule(ButtonRule::custom("#send", |model| {
            model.value_of("agree") != Some(json!(true))
        }));
    let (document, engine) = bound(&descriptor);
    let agree = element(&document, "agree");
    let send = element(&document, "send");
    assert!(send.disabled());

    document.click(&agree);
    let model = engine.model("signup").unwrap();
    assert_eq!(model.value_of("agree"), Some(json!(true)));
    assert!(model.valid());
    assert!(!send.disabled());
    assert_eq!(agree.attr("aria-invalid").as_deref(), Some("false"));
}

#[test]
fn force_dom_update_repairs_tampered_elements() {
    let descriptor = ContentDescriptor::new("signup", SIGNUP)
        .with_mapping(FieldMapping::new("name", "#name").default_value(json!("Ana")));
    let (document, engine) = bound(&descriptor);
    let name = element(&document, "name");
    assert_eq!(name.value(), "Ana");

    name.set_value("tampered");
    assert!(engine.force_dom_update("signup"));
    assert_eq!(name.value(), "Ana");
    assert!(!engine.force_dom_update("unknown"));
}
