use std::fmt;
use std::rc::Rc;

use kuchiki::traits::*;
use kuchiki::{NodeRef, Selectors};

use crate::error::DomError;

/// Input types whose value is free text typed by the user.
const TEXT_INPUT_TYPES: &[&str] = &[
    "text", "email", "tel", "password", "search", "url", "number",
];

/// Handle to an element node of a [`super::Document`].
///
/// Cloning is cheap and two handles compare equal when they point at the same
/// node. Reads and writes here model the DOM *properties* the engine relies on
/// (`value`, `checked`, `disabled`); they never dispatch events.
#[derive(Clone, PartialEq)]
pub struct ElementRef {
    node: NodeRef,
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ElementRef");
        out.field("tag", &self.tag_name());
        if let Some(id) = self.id() {
            out.field("id", &id);
        }
        out.finish()
    }
}

impl ElementRef {
    pub(crate) fn from_node(node: NodeRef) -> Option<Self> {
        node.as_element()?;
        Some(Self { node })
    }

    pub(crate) fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Identity key, stable while the node is alive.
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.node.0) as *const () as usize
    }

    pub fn tag_name(&self) -> String {
        self.node
            .as_element()
            .map(|element| element.name.local.to_ascii_lowercase().to_string())
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<String> {
        self.attr("id")
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        let element = self.node.as_element()?;
        let attributes = element.attributes.borrow();
        attributes.get(name).map(str::to_string)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.node
            .as_element()
            .map(|element| element.attributes.borrow().contains(name))
            .unwrap_or(false)
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        if let Some(element) = self.node.as_element() {
            let mut attributes = element.attributes.borrow_mut();
            if attributes.get(name) != Some(value) {
                attributes.insert(name, value.to_string());
            }
        }
    }

    pub fn remove_attr(&self, name: &str) {
        if let Some(element) = self.node.as_element() {
            element.attributes.borrow_mut().remove(name);
        }
    }

    fn set_flag(&self, name: &str, on: bool) {
        if on {
            if !self.has_attr(name) {
                self.set_attr(name, "");
            }
        } else {
            self.remove_attr(name);
        }
    }

    /// Lower-cased `type` of a form control (`text` for untyped inputs,
    /// `select-one`/`textarea` for the other form elements).
    pub fn input_type(&self) -> String {
        match self.tag_name().as_str() {
            "input" => self
                .attr("type")
                .map(|kind| kind.trim().to_ascii_lowercase())
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| "text".to_string()),
            "select" => "select-one".to_string(),
            "textarea" => "textarea".to_string(),
            "button" => self
                .attr("type")
                .map(|kind| kind.trim().to_ascii_lowercase())
                .unwrap_or_else(|| "submit".to_string()),
            other => other.to_string(),
        }
    }

    /// True for elements that accept typed text (text-like inputs and textareas).
    pub fn is_text_capable(&self) -> bool {
        match self.tag_name().as_str() {
            "textarea" => true,
            "input" => TEXT_INPUT_TYPES.contains(&self.input_type().as_str()),
            _ => false,
        }
    }

    pub fn value(&self) -> String {
        match self.tag_name().as_str() {
            "textarea" => self.node.text_contents(),
            "select" => self.selected_option_value().unwrap_or_default(),
            _ => self.attr("value").unwrap_or_default(),
        }
    }

    pub fn set_value(&self, value: &str) {
        match self.tag_name().as_str() {
            "textarea" => self.set_text_content(value),
            "select" => {
                for option in self.options() {
                    option.set_flag("selected", option_value(&option) == value);
                }
            }
            _ => self.set_attr("value", value),
        }
    }

    fn options(&self) -> Vec<ElementRef> {
        self.query_selector_all("option").unwrap_or_default()
    }

    fn selected_option_value(&self) -> Option<String> {
        let options = self.options();
        options
            .iter()
            .find(|option| option.has_attr("selected"))
            .or_else(|| options.first())
            .map(option_value)
    }

    pub fn checked(&self) -> bool {
        self.has_attr("checked")
    }

    pub fn set_checked(&self, checked: bool) {
        self.set_flag("checked", checked);
    }

    pub fn disabled(&self) -> bool {
        self.has_attr("disabled")
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.set_flag("disabled", disabled);
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attr("class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().iter().any(|existing| existing == class)
    }

    pub fn add_class(&self, class: &str) {
        let mut classes = self.class_list();
        if classes.iter().any(|existing| existing == class) {
            return;
        }
        classes.push(class.to_string());
        self.set_attr("class", &classes.join(" "));
    }

    pub fn remove_class(&self, class: &str) {
        let classes = self.class_list();
        if !classes.iter().any(|existing| existing == class) {
            return;
        }
        let kept: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
        if kept.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &kept.join(" "));
        }
    }

    pub fn text_content(&self) -> String {
        self.node.text_contents()
    }

    /// Replaces the children with a single text node. Character data only, so
    /// mutation observers (which track element insertions) are not involved.
    pub fn set_text_content(&self, text: &str) {
        if self.node.text_contents() == text {
            return;
        }
        for child in self.node.children().collect::<Vec<_>>() {
            child.detach();
        }
        if !text.is_empty() {
            self.node.append(NodeRef::new_text(text));
        }
    }

    pub fn parent_element(&self) -> Option<ElementRef> {
        self.node.parent().and_then(ElementRef::from_node)
    }

    /// This element followed by its element ancestors, nearest first.
    pub fn inclusive_ancestors(&self) -> impl Iterator<Item = ElementRef> {
        self.node.inclusive_ancestors().filter_map(ElementRef::from_node)
    }

    pub fn contains(&self, other: &ElementRef) -> bool {
        other.inclusive_ancestors().any(|ancestor| &ancestor == self)
    }

    pub fn has_element_children(&self) -> bool {
        self.node.children().any(|child| child.as_element().is_some())
    }

    pub fn element_children(&self) -> Vec<ElementRef> {
        self.node
            .children()
            .filter_map(ElementRef::from_node)
            .collect()
    }

    /// Descendants matching `selector`, in document order. The element itself
    /// is never part of the result.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError> {
        let matches = self
            .node
            .descendants()
            .select(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))?;
        Ok(matches
            .map(|element| ElementRef {
                node: element.as_node().clone(),
            })
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn matches(&self, selector: &str) -> Result<bool, DomError> {
        let compiled = Selectors::compile(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))?;
        Ok(self
            .node
            .clone()
            .into_element_ref()
            .map(|element| compiled.matches(&element))
            .unwrap_or(false))
    }

    pub fn inner_html(&self) -> String {
        self.node
            .children()
            .map(|child| child.to_string())
            .collect::<String>()
    }

    pub fn outer_html(&self) -> String {
        self.node.to_string()
    }
}

fn option_value(option: &ElementRef) -> String {
    option
        .attr("value")
        .unwrap_or_else(|| option.text_content().trim().to_string())
}
