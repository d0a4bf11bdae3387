//! Stored records: identifier presets, app mappings and the sync config.
//!
//! Presets and app mappings double as wire payloads inside
//! [`SyncRequest`](crate::SyncRequest) and [`SyncResponse`](crate::SyncResponse),
//! so their serde names follow the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{instant, Token};

/// Symbols eligible for insertion when no preset overrides them.
pub const DEFAULT_SYMBOLS: &str = " !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// The saved generation parameters for one identifier.
///
/// Wire form: `{ident, iter, symbols, longpw, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierPreset {
    /// Identifier the preset belongs to (typically a domain).
    #[serde(rename = "ident")]
    pub identifier: String,
    /// Iteration counter mixed into the derivation.
    #[serde(rename = "iter")]
    pub iteration: u32,
    /// Symbol alphabet used for insertion.
    pub symbols: String,
    /// Long (24 char) or short (12 char) mode.
    #[serde(rename = "longpw")]
    pub long_mode: bool,
    /// Last modification, stamped by the store on every write.
    #[serde(with = "instant")]
    pub timestamp: DateTime<Utc>,
}

impl IdentifierPreset {
    /// Create a preset with the placeholder timestamp.
    pub fn new(
        identifier: impl Into<String>,
        iteration: u32,
        symbols: impl Into<String>,
        long_mode: bool,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            iteration,
            symbols: symbols.into(),
            long_mode,
            timestamp: instant::record_default(),
        }
    }

    /// The parameters used when an identifier has no stored preset.
    pub fn default_for(identifier: impl Into<String>) -> Self {
        Self::new(identifier, 0, DEFAULT_SYMBOLS, true)
    }

    /// Whether these parameters equal the implicit defaults.
    pub fn is_default(&self) -> bool {
        self.iteration == 0 && self.symbols == DEFAULT_SYMBOLS && self.long_mode
    }

    /// Whether a front end should persist this preset.
    ///
    /// Empty identifiers are never stored, and default presets are
    /// redundant since they derive the same password as no preset.
    pub fn is_worth_saving(&self) -> bool {
        !self.identifier.is_empty() && !self.is_default()
    }

    /// Same parameters, ignoring the timestamp.
    pub fn same_settings(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.iteration == other.iteration
            && self.symbols == other.symbols
            && self.long_mode == other.long_mode
    }
}

/// Binds an application package to an identifier so the app inherits that
/// identifier's preset.
///
/// Wire form: `{pkg, ident, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMapping {
    /// Application package name.
    pub pkg: String,
    /// Identifier whose preset the app uses.
    #[serde(rename = "ident")]
    pub identifier: String,
    /// Last modification, stamped by the store on every write.
    #[serde(with = "instant")]
    pub timestamp: DateTime<Utc>,
}

impl AppMapping {
    /// Create a mapping with the placeholder timestamp.
    pub fn new(pkg: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            identifier: identifier.into(),
            timestamp: instant::record_default(),
        }
    }
}

/// Singleton sync settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Sync server host name.
    pub server_host: String,
    /// Sync server port (0 = unset).
    pub server_port: u16,
    /// Opaque user token.
    pub token: Token,
    /// Whether opportunistic (automatic) syncs may run.
    pub auto_sync: bool,
    /// Server time of the last successful sync, epoch when never synced.
    pub last_sync: DateTime<Utc>,
}

impl SyncConfig {
    /// Create a config for a server, never synced, auto-sync enabled.
    pub fn new(server_host: impl Into<String>, server_port: u16, token: impl Into<Token>) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            token: token.into(),
            ..Self::default()
        }
    }

    /// Set the auto-sync flag.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Host non-empty, port set and token non-empty.
    pub fn is_valid(&self) -> bool {
        !self.server_host.is_empty() && self.server_port > 0 && !self.token.is_empty()
    }

    /// Whether a sync ever succeeded with this config.
    pub fn has_synced(&self) -> bool {
        self.last_sync != instant::epoch()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_host: String::new(),
            server_port: 0,
            token: Token::default(),
            auto_sync: true,
            last_sync: instant::epoch(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("token", &self.token)
            .field("auto_sync", &self.auto_sync)
            .field("last_sync", &instant::format(&self.last_sync))
            .finish()
    }
}
