//! Single-threaded in-memory document the engine binds to.
//!
//! The tree itself is a `kuchiki` node graph. On top of it the document keeps
//! the pieces of a browser the synchronizer depends on: per-element event
//! listeners with bubbling dispatch, subtree mutation observers, a microtask
//! queue with timers, and caret positions for text controls.

mod element;
mod event;
mod simulate;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use kuchiki::traits::*;
use kuchiki::NodeRef;
use tracing::debug;

use crate::error::DomError;

pub use element::ElementRef;
pub use event::{DispatchOutcome, DomEvent, EventData};

pub type Listener = Rc<dyn Fn(&DomEvent)>;
type ObserverCallback = Rc<dyn Fn()>;
type Task = Box<dyn FnOnce()>;

const EMPTY_DOCUMENT: &str = "<!DOCTYPE html><html><head></head><body></body></html>";

struct ListenerEntry {
    id: u64,
    element: ElementRef,
    event: String,
    callback: Listener,
}

struct ObserverEntry {
    id: u64,
    target: ElementRef,
    callback: ObserverCallback,
    queued: bool,
}

struct TimerEntry {
    id: u64,
    due: Instant,
    task: Task,
}

#[derive(Default)]
struct DocumentState {
    next_id: u64,
    listeners: Vec<ListenerEntry>,
    observers: Vec<ObserverEntry>,
    microtasks: VecDeque<Task>,
    timers: Vec<TimerEntry>,
    carets: HashMap<usize, usize>,
}

impl DocumentState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared handle to a document; clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    root: NodeRef,
    state: Rc<RefCell<DocumentState>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::from_html(EMPTY_DOCUMENT)
    }

    pub fn from_html(html: &str) -> Self {
        Self {
            root: kuchiki::parse_html().one(html),
            state: Rc::new(RefCell::new(DocumentState::default())),
        }
    }

    pub fn head(&self) -> Result<ElementRef, DomError> {
        self.root_element("head")
    }

    pub fn body(&self) -> Result<ElementRef, DomError> {
        self.root_element("body")
    }

    fn root_element(&self, tag: &'static str) -> Result<ElementRef, DomError> {
        self.root
            .select_first(tag)
            .ok()
            .and_then(|element| ElementRef::from_node(element.as_node().clone()))
            .ok_or(DomError::MissingElement(tag))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementRef> {
        self.root
            .descendants()
            .filter_map(ElementRef::from_node)
            .find(|element| element.attr("id").as_deref() == Some(id))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef>, DomError> {
        let matches = self
            .root
            .descendants()
            .select(selector)
            .map_err(|_| DomError::InvalidSelector(selector.to_string()))?;
        Ok(matches
            .filter_map(|element| ElementRef::from_node(element.as_node().clone()))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn to_html(&self) -> String {
        self.root.to_string()
    }

    // ---- tree mutation ------------------------------------------------------

    /// Parses `tag` into a detached element.
    pub fn create_element(&self, tag: &str) -> Option<ElementRef> {
        let scratch = kuchiki::parse_html().one(format!("<{tag}></{tag}>"));
        let element = scratch.select_first(tag).ok()?;
        let node = element.as_node().clone();
        node.detach();
        ElementRef::from_node(node)
    }

    /// Replaces the children of `parent` with the parsed `markup`.
    pub fn set_inner_html(&self, parent: &ElementRef, markup: &str) {
        self.detach_children(parent);
        let parsed = kuchiki::parse_html().one(format!("<html><body>{markup}</body></html>"));
        if let Ok(body) = parsed.select_first("body") {
            for child in body.as_node().children().collect::<Vec<_>>() {
                child.detach();
                parent.node().append(child);
            }
        }
        self.notify_child_list(parent);
    }

    pub fn append_child(&self, parent: &ElementRef, child: &ElementRef) {
        child.node().detach();
        parent.node().append(child.node().clone());
        self.notify_child_list(parent);
    }

    pub fn remove(&self, element: &ElementRef) {
        let parent = element.parent_element();
        self.forget_carets(element.node());
        element.node().detach();
        if let Some(parent) = parent {
            self.notify_child_list(&parent);
        }
    }

    pub fn clear_children(&self, parent: &ElementRef) {
        if parent.node().first_child().is_none() {
            return;
        }
        self.detach_children(parent);
        self.notify_child_list(parent);
    }

    fn detach_children(&self, parent: &ElementRef) {
        for child in parent.node().children().collect::<Vec<_>>() {
            self.forget_carets(&child);
            child.detach();
        }
    }

    fn forget_carets(&self, node: &NodeRef) {
        let mut state = self.state.borrow_mut();
        if state.carets.is_empty() {
            return;
        }
        for element in node.inclusive_descendants().filter_map(ElementRef::from_node) {
            state.carets.remove(&element.key());
        }
    }

    // ---- caret --------------------------------------------------------------

    /// Caret offset (in characters) inside a text control; defaults to the end
    /// of the current value.
    pub fn caret(&self, element: &ElementRef) -> usize {
        let length = element.value().chars().count();
        self.state
            .borrow()
            .carets
            .get(&element.key())
            .copied()
            .unwrap_or(length)
            .min(length)
    }

    pub fn set_caret(&self, element: &ElementRef, position: usize) {
        self.state
            .borrow_mut()
            .carets
            .insert(element.key(), position);
    }

    // ---- events -------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        element: &ElementRef,
        event: &str,
        callback: impl Fn(&DomEvent) + 'static,
    ) -> ListenerHandle {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.listeners.push(ListenerEntry {
            id,
            element: element.clone(),
            event: event.to_string(),
            callback: Rc::new(callback),
        });
        ListenerHandle {
            state: Rc::downgrade(&self.state),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Dispatches `event` at its target, then bubbles it through the element
    /// ancestors until a listener stops propagation.
    pub fn dispatch(&self, event: &DomEvent) -> DispatchOutcome {
        let path: Vec<ElementRef> = event.target().inclusive_ancestors().collect();
        for element in path {
            if event.propagation_stopped() {
                break;
            }
            let callbacks: Vec<(u64, Listener)> = {
                let state = self.state.borrow();
                state
                    .listeners
                    .iter()
                    .filter(|entry| entry.element == element && entry.event == event.name())
                    .map(|entry| (entry.id, Rc::clone(&entry.callback)))
                    .collect()
            };
            if callbacks.is_empty() {
                continue;
            }
            event.set_current_target(Some(element));
            for (id, callback) in callbacks {
                // A previous listener may have removed this one.
                if !self.is_registered(id) {
                    continue;
                }
                callback(event);
            }
        }
        event.set_current_target(None);
        event.outcome()
    }

    fn is_registered(&self, id: u64) -> bool {
        self.state
            .borrow()
            .listeners
            .iter()
            .any(|entry| entry.id == id)
    }

    // ---- mutation observers -------------------------------------------------

    /// Watches child-list changes anywhere under `target`. Deliveries are
    /// coalesced into one microtask per observer.
    pub fn observe_mutations(
        &self,
        target: &ElementRef,
        callback: impl Fn() + 'static,
    ) -> ObserverHandle {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.observers.push(ObserverEntry {
            id,
            target: target.clone(),
            callback: Rc::new(callback),
            queued: false,
        });
        ObserverHandle {
            state: Rc::downgrade(&self.state),
            id,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    fn notify_child_list(&self, parent: &ElementRef) {
        let mut state = self.state.borrow_mut();
        let mut deliveries = Vec::new();
        for observer in state.observers.iter_mut() {
            if observer.queued || !observer.target.contains(parent) {
                continue;
            }
            observer.queued = true;
            deliveries.push(observer.id);
        }
        for id in deliveries {
            let weak = Rc::downgrade(&self.state);
            state
                .microtasks
                .push_back(Box::new(move || deliver_mutation(&weak, id)));
        }
    }

    // ---- task queue ---------------------------------------------------------

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().microtasks.push_back(Box::new(task));
    }

    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.timers.push(TimerEntry {
            id,
            due: Instant::now() + delay,
            task: Box::new(task),
        });
        TimerId(id)
    }

    pub fn clear_timeout(&self, timer: TimerId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let index = state.timers.iter().position(|entry| entry.id == timer.0);
            index.map(|index| state.timers.remove(index))
        };
        drop(removed);
    }

    pub fn has_pending_tasks(&self) -> bool {
        let state = self.state.borrow();
        !state.microtasks.is_empty() || !state.timers.is_empty()
    }

    /// Runs queued microtasks and due timers until nothing runnable is left.
    /// Returns whether any work was done.
    pub fn pump(&self) -> bool {
        let mut did_work = false;
        loop {
            let next = self.state.borrow_mut().microtasks.pop_front();
            if let Some(task) = next {
                task();
                did_work = true;
                continue;
            }

            let due = {
                let mut state = self.state.borrow_mut();
                let now = Instant::now();
                let earliest = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= now)
                    .min_by_key(|(_, entry)| entry.due)
                    .map(|(index, _)| index);
                earliest.map(|index| state.timers.remove(index))
            };
            match due {
                Some(timer) => {
                    debug!(target = "dom", timer = timer.id, "running due timer");
                    (timer.task)();
                    did_work = true;
                }
                None => break,
            }
        }
        did_work
    }
}

fn deliver_mutation(state: &Weak<RefCell<DocumentState>>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let callback = {
        let mut state = state.borrow_mut();
        let Some(observer) = state.observers.iter_mut().find(|entry| entry.id == id) else {
            // disconnected after the delivery was queued
            return;
        };
        observer.queued = false;
        Rc::clone(&observer.callback)
    };
    callback();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// Registered event listener; removed on [`ListenerHandle::remove`] or drop.
#[must_use = "dropping the handle removes the listener"]
pub struct ListenerHandle {
    state: Weak<RefCell<DocumentState>>,
    id: u64,
}

impl ListenerHandle {
    pub fn remove(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            // Drop the callback after releasing the borrow; it may own handles too.
            let removed = {
                let mut state = state.borrow_mut();
                let index = state.listeners.iter().position(|entry| entry.id == self.id);
                index.map(|index| state.listeners.remove(index))
            };
            drop(removed);
        }
    }
}

/// Registered mutation observer; disconnected on drop.
#[must_use = "dropping the handle disconnects the observer"]
pub struct ObserverHandle {
    state: Weak<RefCell<DocumentState>>,
    id: u64,
}

impl ObserverHandle {
    pub fn disconnect(self) {}
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let removed = {
                let mut state = state.borrow_mut();
                let index = state.observers.iter().position(|entry| entry.id == self.id);
                index.map(|index| state.observers.remove(index))
            };
            drop(removed);
        }
    }
}
