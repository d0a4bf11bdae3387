//! # pwm-types
//!
//! Records and wire format types for the pwmanager preset sync protocol.
//!
//! This crate provides the foundational types used across all pwm crates:
//! - [`IdentifierPreset`], [`AppMapping`], [`SyncConfig`] - Stored records
//! - [`Token`] - Opaque user token with redacted `Debug`
//! - [`PingResponse`], [`SyncRequest`], [`SyncResponse`], [`SyncConfirmation`] - Wire messages
//! - [`instant`] - ISO-8601 instant encoding shared by the wire and the store
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod instant;
mod messages;
mod records;
mod token;

pub use error::WireError;
pub use messages::{
    PingResponse, SyncConfirmation, SyncRequest, SyncResponse, WireMessage,
    CONTENT_TYPE, SYNC_PROTOCOL_VERSION,
};
pub use records::{AppMapping, IdentifierPreset, SyncConfig, DEFAULT_SYMBOLS};
pub use token::Token;
