// Library exports for the binary and integration tests

pub mod actions;
pub mod binding;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod form;
pub mod keys;
pub mod rules;
pub mod style;
pub mod sync;
pub mod viewer;
pub mod watcher;

// Re-export commonly used types
pub use actions::{ActionEvent, FormSubmission, Interactions};
pub use binding::Engine;
pub use config::EngineConfig;
pub use content::{
    ButtonRule, ContentDescriptor, ContentSource, DisableWhen, FieldMapping, FileContentSource,
    NamedCondition, StaticContentSource, ValidatorConfig,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use dom::{Document, ElementRef};
pub use form::{FormModel, ParentModel};
pub use style::StyleRegistry;
pub use viewer::DynamicViewer;
