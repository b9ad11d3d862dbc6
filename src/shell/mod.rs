//! Client-side demo shell.
//!
//! Renders the app from the local document, persists every save locally and
//! mirrors it to ScratchPad when logged in, and provides the reset and
//! data-view actions of the demo menu.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scratchpad::shell::DemoShell;
//!
//! let mut shell = DemoShell::new(exchange, local, engine, template);
//! let html = shell.start().await?;
//! // on every edit:
//! shell.save(&document)?;
//! ```
//!
//! Remote saves run as spawned tasks, so the shell must be driven from
//! inside a tokio runtime.

mod hooks;
mod render;

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::exchange::{DocumentExchange, DocumentTransport, NoticeKind, Notifier};
use crate::local::LocalStore;
use crate::session::AddressBar;
use crate::store::KeyValueStore;

pub use hooks::{DemoHooks, DocumentSink, EditorHooks, UploadedFile, data_url};
pub use render::{
    DEMO_MENU_HTML, ItemRegistry, RenderFn, TemplateEngine, expand_for_loops, highlight_json,
    render_app, render_data_view,
};

/// Remote side of the shell: where the starting document comes from and
/// where saves are mirrored to.
pub trait DocumentRemote: Send + Sync + 'static {
    fn load_starting_document(&self) -> impl Future<Output = JsonValue> + Send;

    fn save_document(&self, document: &JsonValue) -> impl Future<Output = ()> + Send;

    /// Shows a user-facing notice.
    fn notify(&self, message: &str, kind: NoticeKind);

    /// Whether the whole document is logged on every save.
    fn log_data_on_save(&self) -> bool {
        false
    }
}

impl<S, A, T, N> DocumentRemote for DocumentExchange<S, A, T, N>
where
    S: KeyValueStore,
    A: AddressBar,
    T: DocumentTransport,
    N: Notifier,
{
    async fn load_starting_document(&self) -> JsonValue {
        DocumentExchange::load_starting_document(self).await
    }

    async fn save_document(&self, document: &JsonValue) {
        DocumentExchange::save_document(self, document).await;
    }

    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notifier().notify(message, kind);
    }

    fn log_data_on_save(&self) -> bool {
        self.config().log_data_on_save()
    }
}

/// What the shell currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    App,
    Data,
}

/// Local store plus fire-and-forget remote mirroring.
struct Persistence<L, R> {
    local: LocalStore<L>,
    remote: Arc<R>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<L: KeyValueStore, R: DocumentRemote> DocumentSink for Persistence<L, R> {
    fn save_local(&self, document: &JsonValue) -> Result<(), Error> {
        self.local.save(document)
    }

    fn save_remote(&self, document: JsonValue) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; skipping remote save");
            return;
        };
        let remote = self.remote.clone();
        let handle = runtime.spawn(async move { remote.save_document(&document).await });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

/// Orchestrates rendering and persistence of one demo page.
pub struct DemoShell<L, R, E, H = DemoHooks> {
    persistence: Persistence<L, R>,
    engine: E,
    template: String,
    registry: ItemRegistry,
    hooks: H,
    view: View,
}

impl<L, R, E> DemoShell<L, R, E, DemoHooks>
where
    L: KeyValueStore,
    R: DocumentRemote,
    E: TemplateEngine,
{
    /// Create a shell rendering `template` with `engine`.
    #[must_use]
    pub fn new(remote: R, local: LocalStore<L>, engine: E, template: impl Into<String>) -> Self {
        Self {
            persistence: Persistence {
                local,
                remote: Arc::new(remote),
                pending: Mutex::new(Vec::new()),
            },
            engine,
            template: template.into(),
            registry: ItemRegistry::new(),
            hooks: DemoHooks,
            view: View::App,
        }
    }
}

impl<L, R, E, H> DemoShell<L, R, E, H>
where
    L: KeyValueStore,
    R: DocumentRemote,
    E: TemplateEngine,
    H: EditorHooks,
{
    /// Replace the editor hooks.
    ///
    /// The default hooks are what keep the demo's data local; replacing them
    /// can break persistence.
    #[must_use]
    pub fn with_hooks<H2: EditorHooks>(self, hooks: H2) -> DemoShell<L, R, E, H2> {
        tracing::warn!("Overriding the default editor hooks may break the client-side demo");
        DemoShell {
            persistence: self.persistence,
            engine: self.engine,
            template: self.template,
            registry: self.registry,
            hooks,
            view: self.view,
        }
    }

    /// Start from a pre-populated item registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ItemRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Whether [`save`](Self::save) logs the whole document, as configured
    /// on the remote.
    #[must_use]
    pub fn logs_data_on_save(&self) -> bool {
        self.persistence.remote.log_data_on_save()
    }

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    #[must_use]
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    /// The local document, as the next render will show it.
    #[must_use]
    pub fn document(&self) -> JsonValue {
        self.persistence.local.load()
    }

    /// Loads the starting document, seeds the local store if it is empty,
    /// and renders the app.
    ///
    /// The starting document also becomes the target of "Reset data".
    ///
    /// # Errors
    ///
    /// Returns an error if seeding the local store or rendering fails.
    pub async fn start(&mut self) -> Result<String, Error> {
        let starting = self.persistence.remote.load_starting_document().await;
        self.persistence.local.set_default_document(starting.clone());
        if !self.persistence.local.is_initialized() {
            self.persistence.local.save(&starting)?;
        }
        self.view = View::App;
        self.render()
    }

    /// Renders the current view from the local document.
    ///
    /// # Errors
    ///
    /// Propagates template engine failures.
    pub fn render(&mut self) -> Result<String, Error> {
        let document = self.persistence.local.load();
        match self.view {
            View::App => render_app(&self.engine, &self.template, &document, &mut self.registry),
            View::Data => Ok(render_data_view(&document)),
        }
    }

    /// Switches between the app and the data dump.
    ///
    /// # Errors
    ///
    /// Propagates template engine failures.
    pub fn toggle_view(&mut self) -> Result<String, Error> {
        self.view = match self.view {
            View::App => View::Data,
            View::Data => View::App,
        };
        self.render()
    }

    /// Overwrites the local document with the starting document and
    /// re-renders the app.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store rejects the write or rendering fails.
    pub fn reset(&mut self) -> Result<String, Error> {
        self.persistence.local.reset()?;
        self.view = View::App;
        self.render()
    }

    /// Save hook: called with the whole document after every edit.
    ///
    /// Returns once the local copy is written; the remote mirror completes
    /// in the background (see [`flush`](Self::flush)).
    ///
    /// # Errors
    ///
    /// Returns an error if the local save failed.
    pub fn save(&self, document: &JsonValue) -> Result<(), Error> {
        if self.logs_data_on_save() {
            tracing::debug!(document = %document, "Saving document");
        }
        self.hooks
            .save(document, &self.persistence)
            .inspect_err(|e| {
                tracing::warn!(error = %e, "Save failed");
                self.persistence
                    .remote
                    .notify("Error saving data", NoticeKind::Error);
            })
    }

    /// New-item hook: HTML for a fresh item of `template_name`.
    ///
    /// The host inserts the HTML and then calls [`save`](Self::save) with
    /// the updated document.
    #[must_use]
    pub fn add_item(&self, template_name: &str) -> Option<String> {
        let html = self.hooks.add_item(template_name, &self.registry);
        if html.is_none() {
            tracing::warn!(template = %template_name, "No item template registered");
            self.persistence
                .remote
                .notify("Error adding new item", NoticeKind::Error);
        }
        html
    }

    /// Upload hook: the value to store for `file`.
    ///
    /// # Errors
    ///
    /// Returns the hook's error after showing an error notice.
    pub fn upload(&self, file: &UploadedFile) -> Result<String, Error> {
        match self.hooks.upload(file) {
            Ok(value) => {
                self.persistence
                    .remote
                    .notify("File upload successful", NoticeKind::Success);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, file = %file.name, "Upload failed");
                self.persistence
                    .remote
                    .notify("Error uploading file", NoticeKind::Error);
                Err(e)
            }
        }
    }

    /// Waits for remote saves started so far.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .persistence
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Remote save task failed");
            }
        }
    }
}
