use std::cell::{Cell, RefCell};

use keyboard_types::{Key, Modifiers};

use super::element::ElementRef;

/// Payload carried by a [`DomEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Plain,
    Key { key: Key, modifiers: Modifiers },
}

/// A DOM event travelling from its target up through the ancestor chain.
#[derive(Debug, Clone)]
pub struct DomEvent {
    name: String,
    target: ElementRef,
    data: EventData,
    current_target: RefCell<Option<ElementRef>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, target: ElementRef) -> Self {
        Self::with_data(name, target, EventData::Plain)
    }

    pub fn key(target: ElementRef, key: Key, modifiers: Modifiers) -> Self {
        Self::with_data("keydown", target, EventData::Key { key, modifiers })
    }

    pub fn with_data(name: impl Into<String>, target: ElementRef, data: EventData) -> Self {
        Self {
            name: name.into(),
            target,
            data,
            current_target: RefCell::new(None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &ElementRef {
        &self.target
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Element whose listener is currently running.
    pub fn current_target(&self) -> Option<ElementRef> {
        self.current_target.borrow().clone()
    }

    pub(crate) fn set_current_target(&self, element: Option<ElementRef>) {
        *self.current_target.borrow_mut() = element;
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn outcome(&self) -> DispatchOutcome {
        DispatchOutcome {
            default_prevented: self.default_prevented(),
            propagation_stopped: self.propagation_stopped(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}
