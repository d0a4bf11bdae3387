//! SyncClient - the preset sync exchange.
//!
//! # Architecture
//!
//! SyncClient walks the pure phase machine from `pwm-core` and performs the
//! I/O each phase calls for via the [`Transport`] and [`SettingStore`]
//! traits.
//!
//! ```text
//! Front end → SyncClient → Transport → sync server
//!                 ↓     ↘
//!       pwm-core phases   SettingStore
//! ```
//!
//! One exchange is `GET /ping`, `POST /sync` with every local preset, then
//! `POST /confirm`. Only after the server accepts the confirmation is the
//! response merged into the store, in one transaction. A confirm failure
//! after a successful push is not retried or rolled back.
//!
//! # Example
//!
//! ```ignore
//! let store: Arc<dyn SettingStore> = Arc::new(SqliteStore::new(&path).await?);
//! let client = Arc::new(SyncClient::new(store, HttpTransport::new()));
//! let handle = client.spawn_sync(true);
//! let ok = handle.await?;
//! ```

use chrono::{DateTime, Utc};
use pwm_core::{PhaseAction, PhaseEvent, SyncPhase};
use pwm_types::{
    PingResponse, SyncConfig, SyncRequest, SyncResponse, WireError, WireMessage,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::status::SyncStatus;
use crate::store::{SettingStore, StoreError};
use crate::transport::{Endpoint, HttpReply, Scheme, Timeouts, Transport, TransportError};

/// Server path of the connectivity probe.
pub const PING_PATH: &str = "/ping";
/// Server path receiving the full preset set.
pub const SYNC_PATH: &str = "/sync";
/// Server path committing an exchange.
pub const CONFIRM_PATH: &str = "/confirm";

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync is in flight.
    #[error("a sync is already in progress")]
    Busy,

    /// No sync config has been saved.
    #[error("sync is not configured")]
    NotConfigured,

    /// Automatic sync requested while auto-sync is disabled.
    #[error("auto-sync is disabled")]
    AutoSyncDisabled,

    /// Host, port or token missing.
    #[error("sync config is incomplete (host, port and token are required)")]
    InvalidConfig,

    /// The server speaks another protocol version.
    #[error("unsupported server protocol version {0}")]
    UnsupportedVersion(u32),

    /// The server answered with something other than 200.
    #[error("{path} returned HTTP {status}")]
    UnexpectedStatus {
        /// Server path of the request.
        path: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding or decoding a message failed.
    #[error("protocol error: {0}")]
    Wire(#[from] WireError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether the sync was skipped rather than attempted.
    ///
    /// Skips do not change the last-outcome flag.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::AutoSyncDisabled)
    }
}

/// Tunables for the protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Read limit for `GET /ping`.
    pub probe_timeout: Duration,
    /// Connect limit for every request.
    pub connect_timeout: Duration,
    /// Limit for `/sync` and `/confirm`.
    pub request_timeout: Duration,
    /// URL scheme of the sync server.
    pub scheme: Scheme,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            scheme: Scheme::Https,
        }
    }
}

impl ClientSettings {
    fn probe_timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            request: self.probe_timeout,
        }
    }

    fn request_timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            request: self.request_timeout,
        }
    }
}

/// What a successful sync changed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Server time of the exchange, now stored as `last_sync`.
    pub sync_time: DateTime<Utc>,
    /// Presets upserted.
    pub changed_idents: usize,
    /// Presets deleted.
    pub deleted_idents: usize,
    /// App mappings upserted.
    pub changed_apps: usize,
    /// App mappings deleted.
    pub deleted_apps: usize,
}

impl SyncReport {
    fn of(response: &SyncResponse) -> Self {
        Self {
            sync_time: response.sync_time,
            changed_idents: response.changed_idents.len(),
            deleted_idents: response.deleted_idents.len(),
            changed_apps: response.changed_apps.len(),
            deleted_apps: response.deleted_apps.len(),
        }
    }
}

/// The preset sync client.
///
/// At most one sync runs per [`SyncStatus`]; a second caller is rejected
/// immediately without touching the network.
pub struct SyncClient<T: Transport> {
    store: Arc<dyn SettingStore>,
    transport: T,
    settings: ClientSettings,
    status: Arc<SyncStatus>,
}

impl<T: Transport> SyncClient<T> {
    /// Create a client with default settings and its own status.
    pub fn new(store: Arc<dyn SettingStore>, transport: T) -> Self {
        Self {
            store,
            transport,
            settings: ClientSettings::default(),
            status: Arc::new(SyncStatus::new()),
        }
    }

    /// Replace the client settings.
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a status with other clients (e.g. [`SyncStatus::global`]).
    pub fn with_status(mut self, status: Arc<SyncStatus>) -> Self {
        self.status = status;
        self
    }

    /// The status this client reports to.
    pub fn status(&self) -> &Arc<SyncStatus> {
        &self.status
    }

    /// Current phase of the running sync.
    pub fn phase(&self) -> SyncPhase {
        self.status.phase()
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one sync and report success as a boolean.
    ///
    /// With `auto_only`, the sync is skipped (and reported as a failure)
    /// when the stored config has auto-sync disabled.
    pub async fn sync(&self, auto_only: bool) -> bool {
        match self.run(auto_only).await {
            Ok(_) => true,
            Err(e) if e.is_skip() || matches!(e, SyncError::Busy) => {
                tracing::debug!("sync not run: {}", e);
                false
            }
            Err(_) => false,
        }
    }

    /// Run [`sync`](Self::sync) on a tokio worker.
    pub fn spawn_sync(self: &Arc<Self>, auto_only: bool) -> JoinHandle<bool>
    where
        T: 'static,
    {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.sync(auto_only).await })
    }

    /// Run one sync, returning what changed or why it failed.
    pub async fn run(&self, auto_only: bool) -> Result<SyncReport, SyncError> {
        let Some(_guard) = self.status.try_begin() else {
            return Err(SyncError::Busy);
        };

        self.advance(PhaseEvent::Started);
        match self.exchange(auto_only).await {
            Ok(report) => {
                self.advance(PhaseEvent::Applied);
                tracing::info!(
                    "sync complete: {} presets changed, {} deleted, {} apps changed, {} deleted",
                    report.changed_idents,
                    report.deleted_idents,
                    report.changed_apps,
                    report.deleted_apps
                );
                Ok(report)
            }
            Err(e) if e.is_skip() => {
                self.advance(PhaseEvent::Skipped);
                Err(e)
            }
            Err(e) => {
                tracing::warn!("sync failed during {}: {}", self.phase(), e);
                self.advance(PhaseEvent::Failed);
                Err(e)
            }
        }
    }

    /// Probe the server described by `config`.
    pub async fn test_connection(&self, config: &SyncConfig) -> bool {
        match self.probe(config).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("connection test failed: {}", e);
                false
            }
        }
    }

    /// Check that `config` is complete and the server answers a supported
    /// ping.
    pub async fn probe(&self, config: &SyncConfig) -> Result<(), SyncError> {
        if !config.is_valid() {
            return Err(SyncError::InvalidConfig);
        }

        let endpoint = Endpoint::from_config(self.settings.scheme, config);
        tracing::debug!("probing {}", endpoint);
        let reply = self
            .transport
            .get(&endpoint, PING_PATH, self.settings.probe_timeouts())
            .await?;
        let ping: PingResponse = decode_ok(PING_PATH, &reply)?;
        if !ping.is_valid() {
            return Err(SyncError::UnsupportedVersion(ping.pwm_sync_version));
        }
        Ok(())
    }

    async fn exchange(&self, auto_only: bool) -> Result<SyncReport, SyncError> {
        let config = self.load_config(auto_only).await?;
        self.advance(PhaseEvent::ConfigLoaded);

        self.probe(&config).await?;
        self.advance(PhaseEvent::ProbeSucceeded);

        let endpoint = Endpoint::from_config(self.settings.scheme, &config);
        let response = self.push(&endpoint, &config).await?;
        self.advance(PhaseEvent::PushSucceeded);

        self.confirm(&endpoint, &response).await?;
        self.advance(PhaseEvent::ConfirmSucceeded);

        self.store.apply_sync(&response, &config).await?;
        Ok(SyncReport::of(&response))
    }

    async fn load_config(&self, auto_only: bool) -> Result<SyncConfig, SyncError> {
        let config = self
            .store
            .sync_config()
            .await?
            .ok_or(SyncError::NotConfigured)?;
        if auto_only && !config.auto_sync {
            return Err(SyncError::AutoSyncDisabled);
        }
        Ok(config)
    }

    async fn push(
        &self,
        endpoint: &Endpoint,
        config: &SyncConfig,
    ) -> Result<SyncResponse, SyncError> {
        let idents = self.store.all_presets().await?;
        let apps = self.store.all_app_mappings().await?;
        tracing::debug!("pushing {} presets and {} app mappings", idents.len(), apps.len());

        let request = SyncRequest::new(config, idents, apps);
        let reply = self
            .transport
            .post_json(
                endpoint,
                SYNC_PATH,
                request.to_bytes()?,
                self.settings.request_timeouts(),
            )
            .await?;
        let response: SyncResponse = decode_ok(SYNC_PATH, &reply)?;
        response.validate()?;
        Ok(response)
    }

    async fn confirm(&self, endpoint: &Endpoint, response: &SyncResponse) -> Result<(), SyncError> {
        let reply = self
            .transport
            .post_json(
                endpoint,
                CONFIRM_PATH,
                response.confirmation().to_bytes()?,
                self.settings.request_timeouts(),
            )
            .await?;
        expect_ok(CONFIRM_PATH, &reply)
    }

    /// Feed the phase machine and carry out its outcome actions.
    ///
    /// The remaining actions name the step [`exchange`](Self::exchange)
    /// performs next.
    fn advance(&self, event: PhaseEvent) {
        let (next, actions) = self.status.phase().on_event(event);
        self.status.set_phase(next);
        for action in actions {
            match action {
                PhaseAction::RecordOutcome { success } => self.status.record(success),
                step => tracing::debug!("sync phase {}: {:?}", next, step),
            }
        }
    }
}

fn expect_ok(path: &'static str, reply: &HttpReply) -> Result<(), SyncError> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(SyncError::UnexpectedStatus {
            path,
            status: reply.status,
        })
    }
}

fn decode_ok<M: WireMessage>(path: &'static str, reply: &HttpReply) -> Result<M, SyncError> {
    expect_ok(path, reply)?;
    Ok(M::from_bytes(&reply.body)?)
}
