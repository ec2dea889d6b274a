//! User-agent behaviour: what a browser does around the events it fires.
//! Tests and the demo binary drive bound content through these helpers.

use keyboard_types::{Key, Modifiers};

use super::{DispatchOutcome, Document, DomEvent, ElementRef};

impl Document {
    /// Fires `keydown`; returns the outcome so callers can tell whether the
    /// keystroke was suppressed.
    pub fn key_down(&self, element: &ElementRef, key: Key, modifiers: Modifiers) -> DispatchOutcome {
        self.dispatch(&DomEvent::key(element.clone(), key, modifiers))
    }

    /// A full keystroke: `keydown`, then (unless prevented) the default edit at
    /// the caret followed by `input`.
    pub fn press_key(&self, element: &ElementRef, key: Key, modifiers: Modifiers) -> bool {
        let outcome = self.key_down(element, key.clone(), modifiers);
        if outcome.default_prevented || element.disabled() {
            return false;
        }

        let mut chars: Vec<char> = element.value().chars().collect();
        let caret = self.caret(element);
        match key {
            Key::Character(text) if !modifiers.intersects(Modifiers::CONTROL | Modifiers::META) => {
                let mut count = 0;
                for ch in text.chars() {
                    chars.insert(caret + count, ch);
                    count += 1;
                }
                element.set_value(&chars.iter().collect::<String>());
                self.set_caret(element, caret + count);
            }
            Key::Backspace if caret > 0 => {
                chars.remove(caret - 1);
                element.set_value(&chars.iter().collect::<String>());
                self.set_caret(element, caret - 1);
            }
            Key::Delete if caret < chars.len() => {
                chars.remove(caret);
                element.set_value(&chars.iter().collect::<String>());
                self.set_caret(element, caret);
            }
            _ => return true,
        }
        self.dispatch(&DomEvent::new("input", element.clone()));
        true
    }

    /// Types `text` one character at a time; returns how many characters got
    /// through the `keydown` listeners.
    pub fn type_text(&self, element: &ElementRef, text: &str) -> usize {
        text.chars()
            .filter(|ch| self.press_key(element, Key::Character(ch.to_string()), Modifiers::empty()))
            .count()
    }

    /// Replaces the whole value at once (paste, autofill) and fires `input`.
    pub fn fill(&self, element: &ElementRef, value: &str) {
        element.set_value(value);
        self.set_caret(element, value.chars().count());
        self.dispatch(&DomEvent::new("input", element.clone()));
    }

    /// Picks a `<select>` option and fires `input` then `change`.
    pub fn select_option(&self, element: &ElementRef, value: &str) {
        element.set_value(value);
        self.dispatch(&DomEvent::new("input", element.clone()));
        self.dispatch(&DomEvent::new("change", element.clone()));
    }

    /// Clicks an element with the browser's activation behaviour: checkboxes
    /// toggle, radios select within their group, submit buttons submit their
    /// form.
    pub fn click(&self, element: &ElementRef) -> DispatchOutcome {
        if element.disabled() {
            return DispatchOutcome::default();
        }

        let kind = element.input_type();
        let is_toggle = element.tag_name() == "input" && (kind == "checkbox" || kind == "radio");
        let previous = self.activate(element, &kind, is_toggle);

        let outcome = self.dispatch(&DomEvent::new("click", element.clone()));
        if outcome.default_prevented {
            if let Some(previous) = previous {
                previous.restore();
            }
            return outcome;
        }

        if is_toggle && previous.map(|p| p.changed()).unwrap_or(false) {
            self.dispatch(&DomEvent::new("input", element.clone()));
            self.dispatch(&DomEvent::new("change", element.clone()));
        } else if let Some(submitter) = element.inclusive_ancestors().find(is_submitter) {
            if submitter.disabled() {
                return outcome;
            }
            if let Some(form) = submitter
                .inclusive_ancestors()
                .find(|ancestor| ancestor.tag_name() == "form")
            {
                self.submit(&form);
            }
        }
        outcome
    }

    /// Fires `submit` at a form (as the submit button or Enter would).
    pub fn submit(&self, form: &ElementRef) -> DispatchOutcome {
        self.dispatch(&DomEvent::new("submit", form.clone()))
    }

    fn activate(&self, element: &ElementRef, kind: &str, is_toggle: bool) -> Option<Activation> {
        if !is_toggle {
            return None;
        }
        if kind == "checkbox" {
            let was = element.checked();
            element.set_checked(!was);
            return Some(Activation {
                element: element.clone(),
                was_checked: was,
                group: Vec::new(),
            });
        }

        let was = element.checked();
        let group: Vec<(ElementRef, bool)> = self
            .radio_group(element)
            .into_iter()
            .filter(|radio| radio != element)
            .map(|radio| {
                let checked = radio.checked();
                radio.set_checked(false);
                (radio, checked)
            })
            .collect();
        element.set_checked(true);
        Some(Activation {
            element: element.clone(),
            was_checked: was,
            group,
        })
    }

    fn radio_group(&self, radio: &ElementRef) -> Vec<ElementRef> {
        let Some(name) = radio.attr("name") else {
            return vec![radio.clone()];
        };
        let scope = radio
            .inclusive_ancestors()
            .find(|ancestor| ancestor.tag_name() == "form")
            .or_else(|| self.body().ok());
        let Some(scope) = scope else {
            return vec![radio.clone()];
        };
        scope
            .query_selector_all("input")
            .unwrap_or_default()
            .into_iter()
            .filter(|input| input.input_type() == "radio" && input.attr("name").as_deref() == Some(&name))
            .collect()
    }
}

struct Activation {
    element: ElementRef,
    was_checked: bool,
    group: Vec<(ElementRef, bool)>,
}

impl Activation {
    fn changed(&self) -> bool {
        self.element.checked() != self.was_checked
    }

    fn restore(self) {
        self.element.set_checked(self.was_checked);
        for (radio, checked) in self.group {
            radio.set_checked(checked);
        }
    }
}

fn is_submitter(element: &ElementRef) -> bool {
    match element.tag_name().as_str() {
        "button" => element.input_type() == "submit",
        "input" => element.input_type() == "submit",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn typing_inserts_at_caret_and_fires_input() {
        let document = Document::from_html(r#"<body><input id="i" value="ac"></body>"#);
        let input = document.get_element_by_id("i").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let observed = input.clone();
        let _listener = document.add_event_listener(&input, "input", move |_| {
            log.borrow_mut().push(observed.value())
        });

        document.set_caret(&input, 1);
        assert_eq!(document.type_text(&input, "b"), 1);
        assert_eq!(input.value(), "abc");
        assert_eq!(document.caret(&input), 2);
        assert!(document.press_key(&input, Key::Backspace, Modifiers::empty()));
        assert_eq!(input.value(), "ac");
        assert_eq!(*seen.borrow(), vec!["abc", "ac"]);
    }

    #[test]
    fn prevented_keydown_leaves_value_untouched() {
        let document = Document::from_html(r#"<body><input id="i"></body>"#);
        let input = document.get_element_by_id("i").unwrap();
        let _listener = document.add_event_listener(&input, "keydown", |event| event.prevent_default());
        assert_eq!(document.type_text(&input, "xyz"), 0);
        assert_eq!(input.value(), "");
    }

    #[test]
    fn clicking_a_radio_unchecks_its_siblings() {
        let document = Document::from_html(
            r#"<body><form>
                <input type="radio" name="level" value="a" id="a" checked>
                <input type="radio" name="level" value="b" id="b">
            </form></body>"#,
        );
        let a = document.get_element_by_id("a").unwrap();
        let b = document.get_element_by_id("b").unwrap();
        document.click(&b);
        assert!(b.checked());
        assert!(!a.checked());
    }

    #[test]
    fn prevented_checkbox_click_is_reverted() {
        let document = Document::from_html(r#"<body><input type="checkbox" id="c"></body>"#);
        let checkbox = document.get_element_by_id("c").unwrap();
        let _listener = document.add_event_listener(&checkbox, "click", |event| event.prevent_default());
        document.click(&checkbox);
        assert!(!checkbox.checked());
    }

    #[test]
    fn submit_button_fires_submit_on_its_form() {
        let document = Document::from_html(
            r#"<body><form id="f"><button id="go">Go</button></form></body>"#,
        );
        let form = document.get_element_by_id("f").unwrap();
        let button = document.get_element_by_id("go").unwrap();
        let submitted = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&submitted);
        let _listener = document.add_event_listener(&form, "submit", move |_| {
            *counter.borrow_mut() += 1
        });
        document.click(&button);
        assert_eq!(*submitted.borrow(), 1);
    }
}
