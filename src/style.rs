use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::config::DEFAULT_STYLE_ID_PREFIX;
use crate::dom::{Document, ElementRef};
use crate::error::DomError;

/// Owns the `<style>` blocks injected into a document's head, at most one per
/// id. One registry is shared by everything rendering into the same document.
#[derive(Clone)]
pub struct StyleRegistry {
    document: Document,
    prefix: String,
    active: Rc<RefCell<HashMap<String, ElementRef>>>,
}

impl StyleRegistry {
    pub fn new(document: Document) -> Self {
        Self::with_prefix(document, DEFAULT_STYLE_ID_PREFIX)
    }

    pub fn with_prefix(document: Document, prefix: impl Into<String>) -> Self {
        Self {
            document,
            prefix: prefix.into(),
            active: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Deterministic style id for a content instance.
    pub fn style_id_for(&self, content_id: &str) -> String {
        format!("{}{}", self.prefix, content_id)
    }

    /// Removes any block already registered under `style_id`, then appends a
    /// fresh one holding `css`.
    pub fn inject(&self, css: &str, style_id: &str) -> Result<(), DomError> {
        self.remove(style_id);

        let head = self.document.head()?;
        let style = self
            .document
            .create_element("style")
            .ok_or(DomError::MissingElement("style"))?;
        style.set_attr("id", style_id);
        style.set_text_content(css);
        self.document.append_child(&head, &style);
        self.active.borrow_mut().insert(style_id.to_string(), style);
        debug!(target = "style", %style_id, bytes = css.len(), "injected stylesheet");
        Ok(())
    }

    /// No-op when nothing is registered under `style_id`.
    pub fn remove(&self, style_id: &str) {
        let tracked = self.active.borrow_mut().remove(style_id);
        if let Some(style) = tracked {
            self.document.remove(&style);
            debug!(target = "style", %style_id, "removed stylesheet");
        }
        // Blocks with this id that were put in the head by someone else.
        if let Ok(head) = self.document.head() {
            for stray in head
                .element_children()
                .into_iter()
                .filter(|child| child.tag_name() == "style" && child.id().as_deref() == Some(style_id))
            {
                self.document.remove(&stray);
            }
        }
    }

    pub fn contains(&self, style_id: &str) -> bool {
        self.active.borrow().contains_key(style_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        for style_id in self.active_ids() {
            self.remove(&style_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_blocks(document: &Document, id: &str) -> usize {
        document
            .head()
            .unwrap()
            .element_children()
            .iter()
            .filter(|child| child.tag_name() == "style" && child.id().as_deref() == Some(id))
            .count()
    }

    #[test]
    fn reinjecting_replaces_the_block() {
        let document = Document::new();
        let registry = StyleRegistry::new(document.clone());
        let id = registry.style_id_for("card");
        assert_eq!(id, "dynamic-style-card");

        registry.inject(".a { color: red }", &id).unwrap();
        registry.inject(".a { color: blue }", &id).unwrap();

        assert_eq!(style_blocks(&document, &id), 1);
        let style = document.get_element_by_id(&id).unwrap();
        assert_eq!(style.text_content(), ".a { color: blue }");
        assert_eq!(registry.active_ids(), vec![id]);
    }

    #[test]
    fn remove_is_a_no_op_for_unknown_ids() {
        let document = Document::new();
        let registry = StyleRegistry::new(document.clone());
        registry.remove("never-injected");
        registry.inject("p {}", "x").unwrap();
        registry.remove("x");
        registry.remove("x");
        assert_eq!(style_blocks(&document, "x"), 0);
        assert!(!registry.contains("x"));
    }

    #[test]
    fn clones_share_the_active_map() {
        let document = Document::new();
        let registry = StyleRegistry::with_prefix(document.clone(), "s-");
        let other = registry.clone();
        registry.inject("p {}", "s-1").unwrap();
        other.clear();
        assert!(registry.active_ids().is_empty());
        assert_eq!(style_blocks(&document, "s-1"), 0);
    }
}
