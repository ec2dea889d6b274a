//! Waits for rendered markup to show up inside a container before binding.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::dom::{Document, ElementRef, ObserverHandle, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Pending,
    Attached,
    TimedOut,
    TornDown,
}

type ReadyCallback = Box<dyn FnOnce(&ElementRef)>;
type TimeoutCallback = Box<dyn FnOnce()>;

struct Inner {
    state: WatchState,
    observer: Option<ObserverHandle>,
    timer: Option<TimerId>,
    on_ready: Option<ReadyCallback>,
    on_timeout: Option<TimeoutCallback>,
}

/// Runs a setup callback exactly once, as soon as its container has element
/// children.
pub struct AttachmentWatcher {
    document: Document,
    container: ElementRef,
    inner: Rc<RefCell<Inner>>,
}

impl AttachmentWatcher {
    /// Checks the container right away; if it is still empty, keeps checking
    /// on every subtree mutation until it is populated, `timeout` elapses or
    /// the watcher is cancelled.
    pub fn start(
        document: &Document,
        container: &ElementRef,
        timeout: Option<Duration>,
        on_ready: impl FnOnce(&ElementRef) + 'static,
        on_timeout: impl FnOnce() + 'static,
    ) -> Self {
        let watcher = Self {
            document: document.clone(),
            container: container.clone(),
            inner: Rc::new(RefCell::new(Inner {
                state: WatchState::Pending,
                observer: None,
                timer: None,
                on_ready: Some(Box::new(on_ready)),
                on_timeout: Some(Box::new(on_timeout)),
            })),
        };

        if try_attach(&watcher.inner, document, container) {
            return watcher;
        }

        debug!(target = "watcher", "container empty, observing mutations");
        let observer = {
            let inner = Rc::downgrade(&watcher.inner);
            let host = document.clone();
            let target = container.clone();
            document.observe_mutations(container, move || {
                if let Some(inner) = inner.upgrade() {
                    try_attach(&inner, &host, &target);
                }
            })
        };
        let timer = timeout.map(|delay| {
            let inner = Rc::downgrade(&watcher.inner);
            document.set_timeout(delay, move || {
                if let Some(inner) = inner.upgrade() {
                    time_out(&inner, delay);
                }
            })
        });

        let mut state = watcher.inner.borrow_mut();
        state.observer = Some(observer);
        state.timer = timer;
        drop(state);
        watcher
    }

    pub fn state(&self) -> WatchState {
        self.inner.borrow().state
    }

    pub fn container(&self) -> &ElementRef {
        &self.container
    }

    /// Stops waiting. Callbacks queued before this point see `TornDown` and
    /// do nothing.
    pub fn cancel(&self) {
        let (observer, timer, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == WatchState::Pending {
                inner.state = WatchState::TornDown;
            }
            (
                inner.observer.take(),
                inner.timer.take(),
                (inner.on_ready.take(), inner.on_timeout.take()),
            )
        };
        if let Some(timer) = timer {
            self.document.clear_timeout(timer);
        }
        drop(observer);
        drop(callbacks);
    }
}

impl Drop for AttachmentWatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn try_attach(inner: &Rc<RefCell<Inner>>, document: &Document, container: &ElementRef) -> bool {
    let (ready, unused, observer, timer) = {
        let mut state = inner.borrow_mut();
        if state.state != WatchState::Pending {
            return state.state == WatchState::Attached;
        }
        if !container.has_element_children() {
            return false;
        }
        state.state = WatchState::Attached;
        (
            state.on_ready.take(),
            state.on_timeout.take(),
            state.observer.take(),
            state.timer.take(),
        )
    };
    drop(unused);
    if let Some(timer) = timer {
        document.clear_timeout(timer);
    }
    drop(observer);
    debug!(target = "watcher", "container populated");
    if let Some(ready) = ready {
        ready(container);
    }
    true
}

fn time_out(inner: &Rc<RefCell<Inner>>, delay: Duration) {
    let (callback, unused, observer) = {
        let mut state = inner.borrow_mut();
        if state.state != WatchState::Pending {
            return;
        }
        state.state = WatchState::TimedOut;
        state.timer = None;
        (state.on_timeout.take(), state.on_ready.take(), state.observer.take())
    };
    drop(unused);
    drop(observer);
    debug!(target = "watcher", timeout = ?delay, "gave up waiting for content");
    if let Some(callback) = callback {
        callback();
    }
}
