// Booker - local book list with JSON export/import and API key generation

pub mod backend;
pub mod config;
pub mod credential;
pub mod filter;
pub mod record;
pub mod store;
pub mod transfer;

// Re-export main types for convenience
pub use backend::{Backend, FileBackend, MemoryBackend};
pub use config::Config;
pub use filter::{Direction, SortSpec, ViewState, count_label, view};
pub use record::{Book, NewBook, SortKey};
pub use store::Store;
pub use transfer::{Decision, ImportError, ImportOutcome, PendingImport, export_json, prepare_import};
