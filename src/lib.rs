// Library surface for headless/integration tests and reuse.
// The binary in main.rs only wires the terminal, CLI and storage together.
pub mod app;
pub mod app_dirs;
pub mod catch_all;
pub mod config;
pub mod dataset;
pub mod error;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod store;
pub mod time;
pub mod ui;

pub use dataset::{Dataset, Variant};
pub use error::{DatasetError, SessionError, StorageError};
pub use session::{Answer, LoadRejection, SessionState};
pub use store::{SessionStore, StoreConfig};
