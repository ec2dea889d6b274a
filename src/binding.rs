//! Lifecycle of bound content: one [`ManagedBinding`] per descriptor id,
//! connected in a fixed order and torn down in the reverse one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::actions::{ActionRouter, Interactions, RouterContext};
use crate::config::EngineConfig;
use crate::content::ContentDescriptor;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dom::{Document, ElementRef};
use crate::error::DomError;
use crate::form::{FormModel, FormModelBuilder, ParentModel};
use crate::rules::ButtonRuleEngine;
use crate::style::StyleRegistry;
use crate::sync::FormDomSynchronizer;
use crate::watcher::{AttachmentWatcher, WatchState};

/// What exists once the rendered markup has been found.
struct Attached {
    model: FormModel,
    parent_key: Option<String>,
    router: ActionRouter,
    rules: ButtonRuleEngine,
}

/// Everything one descriptor instance holds on to while connected.
pub struct ManagedBinding {
    content_id: String,
    container: ElementRef,
    style_id: Option<String>,
    watcher: AttachmentWatcher,
    attached: Rc<RefCell<Option<Attached>>>,
}

impl ManagedBinding {
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn container(&self) -> &ElementRef {
        &self.container
    }

    pub fn style_id(&self) -> Option<&str> {
        self.style_id.as_deref()
    }

    pub fn watch_state(&self) -> WatchState {
        self.watcher.state()
    }
}

/// Shared pieces every binding of one document works with.
#[derive(Clone)]
struct Services {
    document: Document,
    config: EngineConfig,
    diagnostics: Diagnostics,
    interactions: Interactions,
    synchronizer: FormDomSynchronizer,
    parent: Option<ParentModel>,
}

/// Connects descriptors to containers of one document. Clones share state.
#[derive(Clone)]
pub struct Engine {
    services: Services,
    styles: StyleRegistry,
    bindings: Rc<RefCell<HashMap<String, ManagedBinding>>>,
}

impl Engine {
    pub fn new(document: Document, config: EngineConfig) -> Self {
        let styles = StyleRegistry::with_prefix(document.clone(), config.style_id_prefix.clone());
        Self::with_styles(document, config, styles)
    }

    /// Uses a style registry shared with other engines on the same document.
    pub fn with_styles(document: Document, config: EngineConfig, styles: StyleRegistry) -> Self {
        let diagnostics = Diagnostics::with_history_limit(config.diagnostics_history);
        let synchronizer =
            FormDomSynchronizer::new(document.clone(), config.classes.clone(), diagnostics.clone());
        Self {
            services: Services {
                document,
                config,
                diagnostics,
                interactions: Interactions::new(),
                synchronizer,
                parent: None,
            },
            styles,
            bindings: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Registers every bound model in `parent` under its form id.
    pub fn with_parent(mut self, parent: ParentModel) -> Self {
        self.services.parent = Some(parent);
        self
    }

    /// Injects the stylesheet and binds `descriptor` to `container` as soon as
    /// the container holds rendered markup. A binding already connected
    /// under the same id is torn down first.
    pub fn connect(&self, descriptor: &ContentDescriptor, container: &ElementRef) -> Result<(), DomError> {
        let content_id = descriptor.id.clone();
        self.disconnect(&content_id);

        let style_id = match descriptor.stylesheet.as_deref().filter(|css| !css.trim().is_empty()) {
            Some(css) => {
                let style_id = self.styles.style_id_for(&content_id);
                self.styles.inject(css, &style_id)?;
                Some(style_id)
            }
            None => None,
        };

        let attached = Rc::new(RefCell::new(None));
        let on_ready = {
            let services = self.services.clone();
            let descriptor = descriptor.clone();
            let slot = Rc::downgrade(&attached);
            move |container: &ElementRef| attach(&services, &descriptor, container, &slot)
        };
        let on_timeout = {
            let diagnostics = self.services.diagnostics.clone();
            let content_id = content_id.clone();
            move || {
                diagnostics.emit(
                    &content_id,
                    DiagnosticKind::Binding,
                    "container stayed empty; content was never bound",
                )
            }
        };
        let watcher = AttachmentWatcher::start(
            &self.services.document,
            container,
            self.services.config.attach_timeout(),
            on_ready,
            on_timeout,
        );

        debug!(target = "binding", %content_id, state = ?watcher.state(), "connected");
        self.bindings.borrow_mut().insert(
            content_id.clone(),
            ManagedBinding {
                content_id,
                container: container.clone(),
                style_id,
                watcher,
                attached,
            },
        );
        Ok(())
    }

    /// Releases everything held for `content_id`. Safe to call repeatedly or
    /// for ids that were never connected.
    pub fn disconnect(&self, content_id: &str) -> bool {
        let removed = self.bindings.borrow_mut().remove(content_id);
        let Some(binding) = removed else {
            return false;
        };
        self.teardown(binding);
        true
    }

    pub fn disconnect_all(&self) {
        let removed: Vec<ManagedBinding> = self
            .bindings
            .borrow_mut()
            .drain()
            .map(|(_, binding)| binding)
            .collect();
        for binding in removed {
            self.teardown(binding);
        }
    }

    fn teardown(&self, binding: ManagedBinding) {
        let ManagedBinding {
            content_id,
            style_id,
            watcher,
            attached,
            ..
        } = binding;

        let parts = attached.borrow_mut().take();
        if let Some(Attached {
            model,
            parent_key,
            router,
            rules,
        }) = parts
        {
            drop(rules);
            router.detach();
            self.services.synchronizer.disconnect(&content_id);
            if let (Some(parent), Some(key)) = (&self.services.parent, parent_key) {
                parent.unregister(&key, &model);
            }
        }
        watcher.cancel();
        drop(watcher);
        if let Some(style_id) = style_id {
            self.styles.remove(&style_id);
        }
        info!(target = "binding", %content_id, "disconnected");
    }

    pub fn is_connected(&self, content_id: &str) -> bool {
        self.bindings.borrow().contains_key(content_id)
    }

    /// Ids of every binding, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn watch_state(&self, content_id: &str) -> Option<WatchState> {
        self.bindings
            .borrow()
            .get(content_id)
            .map(ManagedBinding::watch_state)
    }

    /// The model of a binding whose markup has been found.
    pub fn model(&self, content_id: &str) -> Option<FormModel> {
        let bindings = self.bindings.borrow();
        let binding = bindings.get(content_id)?;
        let attached = binding.attached.borrow();
        attached.as_ref().map(|parts| parts.model.clone())
    }

    pub fn force_dom_update(&self, content_id: &str) -> bool {
        self.services.synchronizer.force_dom_update(content_id)
    }

    pub fn value_writes(&self, content_id: &str) -> Option<usize> {
        self.services.synchronizer.value_writes(content_id)
    }

    pub fn document(&self) -> &Document {
        &self.services.document
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.services.diagnostics
    }

    pub fn interactions(&self) -> &Interactions {
        &self.services.interactions
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn synchronizer(&self) -> &FormDomSynchronizer {
        &self.services.synchronizer
    }

    pub fn parent(&self) -> Option<&ParentModel> {
        self.services.parent.as_ref()
    }
}

/// Model, synchronizer, router and rules, in that order.
fn attach(
    services: &Services,
    descriptor: &ContentDescriptor,
    container: &ElementRef,
    slot: &Weak<RefCell<Option<Attached>>>,
) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let content_id = descriptor.id.as_str();
    let built = FormModelBuilder::new(content_id, &services.diagnostics)
        .build(&descriptor.field_mappings, descriptor.initial_data.as_ref());
    let model = built.model;

    let parent_key = services.parent.as_ref().map(|parent| {
        let key = descriptor.model_key().to_string();
        parent.register(&key, model.clone());
        key
    });

    services
        .synchronizer
        .connect(content_id, &model, container, &built.mappings);

    let router = ActionRouter::attach(
        &services.document,
        container,
        RouterContext {
            binding_id: content_id.to_string(),
            source_id: descriptor.source_id().to_string(),
            form_id: descriptor.form_id.clone(),
            action_attribute: services.config.action_attribute.clone(),
            form_id_attribute: services.config.form_id_attribute.clone(),
            max_depth: services.config.max_action_depth,
            extract_fields: descriptor.field_mappings.is_empty(),
        },
        services.synchronizer.clone(),
        services.interactions.clone(),
        services.diagnostics.clone(),
    );

    let rules = ButtonRuleEngine::attach(
        content_id,
        container,
        descriptor.button_rules.clone(),
        &model,
        &services.diagnostics,
    );

    info!(
        target = "binding",
        content_id,
        controls = model.control_names().len(),
        rules = rules.rule_count(),
        "content bound"
    );
    *slot.borrow_mut() = Some(Attached {
        model,
        parent_key,
        router,
        rules,
    });
}
