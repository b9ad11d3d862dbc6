#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod exchange;
pub mod handlers;
#[cfg(feature = "http")]
pub mod http;
pub mod local;
pub mod naming;
pub mod session;
pub mod shell;
pub mod store;
pub mod token;

// Re-exports for convenient access
pub use config::ScratchpadConfig;
pub use error::Error;
pub use exchange::{
    DocumentExchange, DocumentTransport, NoticeKind, Notifier, TracingNotifier, UploadUrlResponse,
};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use local::LocalStore;
pub use naming::document_key;
pub use session::{AddressBar, MemoryAddressBar, SessionGuard, SessionState};
pub use shell::{DemoShell, DocumentRemote, EditorHooks, ItemRegistry, TemplateEngine};
pub use store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use token::{Claims, TokenBundle, decode_claims};
