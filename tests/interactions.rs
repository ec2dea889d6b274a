use formbridge::actions::UNKNOWN_CLICK_ACTION;
use formbridge::content::{FieldMapping, ValidatorConfig};
use formbridge::{ContentDescriptor, DiagnosticKind, Document, ElementRef, Engine, EngineConfig};
use serde_json::json;

const MARKUP: &str = r#"
    <div class="card" data-dynamic-action="">
        <form name="contact" data-dynamic-form-id="contactForm">
            <input id="email" name="email">
            <input id="topic" name="topic" value="sales">
            <button id="send" type="submit" data-dynamic-action="sendContact"><span id="label">Send</span></button>
        </form>
        <a id="help" data-dynamic-action="  showHelp "><b id="help-icon">?</b></a>
        <p id="plain">text</p>
    </div>"#;

fn bound(descriptor: &ContentDescriptor, config: EngineConfig) -> (Document, Engine, ElementRef) {
    let document = Document::new();
    let body = document.body().unwrap();
    document.set_inner_html(&body, r#"<div id="host"></div>"#);
    let host = document.get_element_by_id("host").unwrap();
    document.set_inner_html(&host, &descriptor.markup);
    let engine = Engine::new(document.clone(), config);
    engine.connect(descriptor, &host).unwrap();
    (document, engine, host)
}

fn contact() -> ContentDescriptor {
    ContentDescriptor::new("contact", MARKUP).with_mapping(
        FieldMapping::new("email", "#email")
            .validator(ValidatorConfig::new("required", ""))
            .validator(ValidatorConfig::new("email", "")),
    )
}

#[test]
fn clicks_resolve_to_nearest_action() {
    let (document, engine, _host) = bound(&contact(), EngineConfig::default());
    let mut actions = engine.interactions().actions();

    document.click(&document.get_element_by_id("help-icon").unwrap());
    let event = actions.try_recv().unwrap();
    assert_eq!(event.action, "showHelp");
    assert_eq!(event.source_id, "contact");
    assert_eq!(event.clicked_element.id().as_deref(), Some("help"));
    assert_eq!(event.original_event.name(), "click");

    document.click(&document.get_element_by_id("plain").unwrap());
    assert_eq!(actions.try_recv().unwrap().action, UNKNOWN_CLICK_ACTION);
    assert!(actions.try_recv().is_err());
}

#[test]
fn walk_depth_is_bounded() {
    let config = EngineConfig {
        max_action_depth: 1,
        ..EngineConfig::default()
    };
    let (document, engine, _host) = bound(&contact(), config);
    let mut actions = engine.interactions().actions();

    document.click(&document.get_element_by_id("help-icon").unwrap());
    assert!(actions.try_recv().is_err());
    document.click(&document.get_element_by_id("help").unwrap());
    assert_eq!(actions.try_recv().unwrap().action, "showHelp");
}

#[test]
fn invalid_submit_is_suppressed_and_reported() {
    let (document, engine, _host) = bound(&contact(), EngineConfig::default());
    let mut submissions = engine.interactions().submissions();
    let mut actions = engine.interactions().actions();
    let email = document.get_element_by_id("email").unwrap();

    let outcome = document.click(&document.get_element_by_id("label").unwrap());
    assert!(!outcome.default_prevented);
    assert_eq!(actions.try_recv().unwrap().action, "sendContact");
    assert!(submissions.try_recv().is_err());
    assert!(email.has_class("is-invalid"));

    let diagnostics = engine.diagnostics().history_for("contact");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Submission);
}

#[test]
fn valid_submit_publishes_model_data() {
    let (document, engine, _host) = bound(&contact(), EngineConfig::default());
    let mut submissions = engine.interactions().submissions();
    let email = document.get_element_by_id("email").unwrap();
    document.fill(&email, "ana@example.com");

    let form = document.query_selector("form").unwrap().unwrap();
    assert!(document.submit(&form).default_prevented);

    let submission = submissions.try_recv().unwrap();
    assert_eq!(submission.form_id, "contactForm");
    assert_eq!(submission.form_name.as_deref(), Some("contact"));
    assert_eq!(submission.source_id, "contact");
    assert_eq!(serde_json::Value::Object(submission.data), json!({ "email": "ana@example.com" }));
}

#[test]
fn forms_without_mappings_submit_their_fields() {
    let descriptor = ContentDescriptor::new("plain", MARKUP);
    let (document, engine, _host) = bound(&descriptor, EngineConfig::default());
    let mut submissions = engine.interactions().submissions();
    let email = document.get_element_by_id("email").unwrap();
    document.fill(&email, "x");

    document.submit(&document.query_selector("form").unwrap().unwrap());
    let submission = submissions.try_recv().unwrap();
    assert_eq!(
        serde_json::Value::Object(submission.data),
        json!({ "email": "x", "topic": "sales" })
    );
}

#[test]
fn disconnected_content_stops_publishing() {
    let (document, engine, _host) = bound(&contact(), EngineConfig::default());
    let mut actions = engine.interactions().actions();
    engine.disconnect("contact");

    document.click(&document.get_element_by_id("help").unwrap());
    assert!(actions.try_recv().is_err());
}
