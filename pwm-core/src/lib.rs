//! # pwm-core
//!
//! Pure logic for pwmanager (no I/O, instant tests).
//!
//! - [`derive`](derive::derive) - the deterministic password hash chain
//! - [`SyncPhase`] - the sync state machine, interpreted by `pwm-client`
//! - [`identifier_candidates`] - identifiers offered for a website host
//! - [`relative_time`] - "3 days ago" rendering for the status view
//!
//! Nothing here touches the network or disk; `pwm-client` performs the
//! actions these modules produce.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod derive;
pub mod humanize;
pub mod ident;
pub mod state;

pub use derive::{derive, derive_preset, DeriveError, PasswordMode};
pub use humanize::{last_sync_label, relative_time};
pub use ident::{identifier_candidates, registrable_domain};
pub use state::{PhaseAction, PhaseEvent, SyncPhase};
