//! # pwm-client
//!
//! Preset sync client for pwmanager.
//!
//! Front ends use this crate to keep identifier presets and app mappings in
//! step with a sync server, and to read or edit them locally.
//!
//! ## Features
//!
//! - **Three-step exchange**: `GET /ping`, `POST /sync`, `POST /confirm`
//! - **Atomic merge**: a confirmed response is applied in one transaction
//! - **Single flight**: at most one sync runs per [`SyncStatus`]
//! - **Transport Abstraction**: Pluggable transport layer (reqwest, mock)
//! - **Pure State Machine**: Uses pwm-core for the phase transitions
//!
//! ## Example
//!
//! ```ignore
//! use pwm_client::{HttpTransport, SqliteStore, SyncClient};
//!
//! let store = Arc::new(SqliteStore::new(&db_path).await?);
//! let client = SyncClient::new(store, HttpTransport::new());
//!
//! let report = client.run(false).await?;
//! println!("{} presets changed", report.changed_idents);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod status;
pub mod store;
pub mod transport;

pub use client::{
    ClientSettings, SyncClient, SyncError, SyncReport, CONFIRM_PATH, PING_PATH, SYNC_PATH,
};
pub use status::{SyncGuard, SyncStatus};
pub use store::{MemoryStore, SettingStore, SqliteStore, StoreError};
pub use transport::{
    Endpoint, HttpReply, HttpTransport, MockTransport, RecordedRequest, Scheme, Timeouts,
    Transport, TransportError,
};
