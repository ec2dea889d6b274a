//! Host-side presenter: puts one descriptor at a time into a container.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error};

use crate::binding::Engine;
use crate::content::{ContentDescriptor, ContentSource};
use crate::dom::{Document, ElementRef};
use crate::error::ViewerError;

/// Makes externally-authored markup safe to render.
pub trait Sanitizer {
    fn sanitize(&self, raw: &str) -> String;
}

/// Passes markup through untouched, for sources that are already trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedMarkup;

impl Sanitizer for TrustedMarkup {
    fn sanitize(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Turns a markup string into live nodes under a container.
pub trait MarkupRenderer {
    fn render(&self, document: &Document, container: &ElementRef, markup: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateRenderer;

impl MarkupRenderer for ImmediateRenderer {
    fn render(&self, document: &Document, container: &ElementRef, markup: &str) {
        document.set_inner_html(container, markup);
    }
}

/// Renders on the next microtask, like a view layer that commits after the
/// current task. Only the latest request is committed.
#[derive(Debug, Clone, Default)]
pub struct DeferredRenderer {
    generation: Rc<Cell<u64>>,
}

impl MarkupRenderer for DeferredRenderer {
    fn render(&self, document: &Document, container: &ElementRef, markup: &str) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let latest = Rc::clone(&self.generation);
        let host = document.clone();
        let container = container.clone();
        let markup = markup.to_string();
        document.queue_microtask(move || {
            if latest.get() != generation {
                debug!(target = "viewer", "superseded render dropped");
                return;
            }
            host.set_inner_html(&container, &markup);
        });
    }
}

/// Shows descriptors in one container, replacing whatever was there.
pub struct DynamicViewer {
    engine: Engine,
    container: ElementRef,
    sanitizer: Box<dyn Sanitizer>,
    renderer: Box<dyn MarkupRenderer>,
    current: RefCell<Option<String>>,
}

impl DynamicViewer {
    pub fn new(engine: Engine, container: ElementRef) -> Self {
        Self::with_parts(engine, container, Box::new(TrustedMarkup), Box::new(ImmediateRenderer))
    }

    pub fn with_parts(
        engine: Engine,
        container: ElementRef,
        sanitizer: Box<dyn Sanitizer>,
        renderer: Box<dyn MarkupRenderer>,
    ) -> Self {
        Self {
            engine,
            container,
            sanitizer,
            renderer,
            current: RefCell::new(None),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn container(&self) -> &ElementRef {
        &self.container
    }

    /// Id of the descriptor on screen.
    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Tears down the previous binding, then connects and renders
    /// `descriptor`.
    pub fn present(&self, descriptor: &ContentDescriptor) -> Result<(), ViewerError> {
        self.teardown();

        self.engine.connect(descriptor, &self.container)?;
        let markup = self.sanitizer.sanitize(&descriptor.markup);
        self.renderer
            .render(self.engine.document(), &self.container, &markup);
        *self.current.borrow_mut() = Some(descriptor.id.clone());
        debug!(target = "viewer", content_id = %descriptor.id, "presented");
        Ok(())
    }

    /// Fetches descriptors and presents the first. Returns its id.
    pub async fn load(&self, source: &dyn ContentSource) -> Result<String, ViewerError> {
        let descriptors = source.fetch().await.map_err(|err| {
            error!(target = "viewer", error = %err, "failed to fetch content");
            err
        })?;
        let first = descriptors.into_iter().next().ok_or(ViewerError::NoContent)?;
        self.present(&first)?;
        Ok(first.id)
    }

    /// Disconnects the current binding and empties the container.
    pub fn teardown(&self) {
        if let Some(previous) = self.current.borrow_mut().take() {
            self.engine.disconnect(&previous);
        }
        self.engine.document().clear_children(&self.container);
    }
}

impl Drop for DynamicViewer {
    fn drop(&mut self) {
        if let Some(previous) = self.current.get_mut().take() {
            self.engine.disconnect(&previous);
        }
    }
}
