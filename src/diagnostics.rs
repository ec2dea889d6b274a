//! The single channel every non-fatal problem travels through.
//!
//! Nothing inside a binding throws: a bad validator, a selector that finds no
//! element or a submit attempted on an invalid form degrades that one rule and
//! is reported here instead.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unknown validator type, unknown button condition, malformed pattern.
    Configuration,
    /// Selector matched nothing, control missing for a mapping.
    Binding,
    /// Submit attempted while the form is invalid.
    Submission,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Binding => "binding",
            Self::Submission => "submission",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub content_id: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// How many diagnostics are kept for [`Diagnostics::history`] by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Fan-out sink for [`Diagnostic`]s. Clones share subscribers and history.
/// The history keeps only the most recent entries.
#[derive(Clone)]
pub struct Diagnostics {
    inner: Rc<RefCell<DiagnosticsInner>>,
}

struct DiagnosticsInner {
    subscribers: Vec<UnboundedSender<Diagnostic>>,
    history: VecDeque<Diagnostic>,
    limit: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` entries; `0` keeps none.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DiagnosticsInner {
                subscribers: Vec::new(),
                history: VecDeque::new(),
                limit,
            })),
        }
    }

    pub fn emit(&self, content_id: &str, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            content_id: content_id.to_string(),
            kind,
            message: message.into(),
        };
        warn!(
            target = "diagnostics",
            content_id = %diagnostic.content_id,
            kind = %diagnostic.kind,
            "{}",
            diagnostic.message
        );
        let mut inner = self.inner.borrow_mut();
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(diagnostic.clone()).is_ok());
        if inner.limit == 0 {
            return;
        }
        while inner.history.len() >= inner.limit {
            inner.history.pop_front();
        }
        inner.history.push_back(diagnostic);
    }

    pub fn subscribe(&self) -> UnboundedReceiver<Diagnostic> {
        let (tx, rx) = unbounded_channel();
        self.inner.borrow_mut().subscribers.push(tx);
        rx
    }

    /// The most recent emissions, oldest first.
    pub fn history(&self) -> Vec<Diagnostic> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    pub fn history_for(&self, content_id: &str) -> Vec<Diagnostic> {
        self.inner
            .borrow()
            .history
            .iter()
            .filter(|diagnostic| diagnostic.content_id == content_id)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.inner.borrow_mut().history.clear();
    }
}
