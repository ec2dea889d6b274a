//! Model → DOM: value, disabled state, validity classes and error text.

use std::cell::Cell;
use std::collections::HashMap;

use super::control_kind::{value_text, ControlKind};
use crate::config::ClassNames;
use crate::content::FieldMapping;
use crate::dom::ElementRef;
use crate::form::validators::default_message;
use crate::form::{ControlState, FormModel};
use crate::keys::{InputMask, KeyFilter};

/// One mapping resolved against the rendered markup.
pub struct BoundControl {
    pub name: String,
    pub kind: ControlKind,
    pub elements: Vec<ElementRef>,
    pub error_display: Option<ElementRef>,
    pub key_filter: Option<KeyFilter>,
    pub mask: Option<InputMask>,
    /// Configured message per error token.
    messages: HashMap<String, String>,
}

impl BoundControl {
    pub fn new(mapping: &FieldMapping, kind: ControlKind, elements: Vec<ElementRef>) -> Self {
        let messages = mapping
            .validators
            .iter()
            .filter(|config| !config.message.is_empty())
            .map(|config| (config.kind.trim().to_ascii_lowercase(), config.message.clone()))
            .collect();
        Self {
            name: mapping.control_name.clone(),
            kind,
            elements,
            error_display: None,
            key_filter: None,
            mask: None,
            messages,
        }
    }

    /// Message shown for the control's first error.
    pub fn error_message(&self, control: &ControlState) -> Option<String> {
        let error = control.first_error()?;
        let configured = self.messages.get(&error.token.to_ascii_lowercase()).cloned();
        Some(configured.unwrap_or_else(|| default_message(error)))
    }
}

/// Pushes the control's current state onto its elements. Every value write
/// that actually changes an element bumps `writes`.
pub fn project(control: &BoundControl, model: &FormModel, classes: &ClassNames, writes: &Cell<usize>) {
    let Some(state) = model.control(&control.name) else {
        return;
    };

    project_value(control, &state, writes);

    let interacted = state.interacted();
    let show_invalid = state.invalid() && interacted;
    let show_valid = state.valid() && interacted;
    for element in &control.elements {
        if element.disabled() != state.disabled {
            element.set_disabled(state.disabled);
        }
        element.set_attr("aria-disabled", bool_text(state.disabled));
        element.set_attr("aria-invalid", bool_text(show_invalid));

        if state.disabled {
            element.add_class(&classes.disabled);
            element.remove_class(&classes.invalid);
            element.remove_class(&classes.valid);
            continue;
        }
        element.remove_class(&classes.disabled);
        toggle_class(element, &classes.invalid, show_invalid);
        toggle_class(element, &classes.valid, show_valid);
    }

    if let Some(display) = &control.error_display {
        let text = if show_invalid {
            control.error_message(&state).unwrap_or_default()
        } else {
            String::new()
        };
        display.set_text_content(&text);
    }
}

fn project_value(control: &BoundControl, state: &ControlState, writes: &Cell<usize>) {
    let masked = control
        .mask
        .as_ref()
        .map(|mask| {
            let text = value_text(&state.value);
            mask.apply(&text, text.chars().count()).display
        });
    for element in &control.elements {
        if control.kind.write(element, &state.value, masked.as_deref()) {
            writes.set(writes.get() + 1);
        }
    }
}

fn toggle_class(element: &ElementRef, class: &str, on: bool) {
    if on {
        element.add_class(class);
    } else {
        element.remove_class(class);
    }
}

fn bool_text(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}
