//! Sync phase state machine.
//!
//! One sync runs `Idle → Testing → Pushing → Confirming → Applying → Idle`.
//! Any failure returns straight to `Idle`. The machine is pure: it takes an
//! event and returns the next phase plus the actions the client must perform.
//! The actual I/O (HTTP round trips, store writes) lives in `pwm-client`.

/// Phase of the (single) sync exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncPhase {
    /// No sync running.
    #[default]
    Idle,
    /// Loading the config and probing the server.
    Testing,
    /// Sending the full preset set to `/sync`.
    Pushing,
    /// Posting the confirmation to `/confirm`.
    Confirming,
    /// Merging the server's answer into the local store.
    Applying,
}

impl SyncPhase {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// Events that do not apply to the current phase leave it unchanged and
    /// produce no actions.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<PhaseAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, PhaseEvent::Started) => (Self::Testing, vec![PhaseAction::LoadConfig]),

            // From Testing
            (Self::Testing, PhaseEvent::ConfigLoaded) => (Self::Testing, vec![PhaseAction::Probe]),
            (Self::Testing, PhaseEvent::Skipped) => (Self::Idle, vec![]),
            (Self::Testing, PhaseEvent::ProbeSucceeded) => (Self::Pushing, vec![PhaseAction::Push]),

            // From Pushing
            (Self::Pushing, PhaseEvent::PushSucceeded) => {
                (Self::Confirming, vec![PhaseAction::Confirm])
            }

            // From Confirming
            (Self::Confirming, PhaseEvent::ConfirmSucceeded) => {
                (Self::Applying, vec![PhaseAction::Apply])
            }

            // From Applying
            (Self::Applying, PhaseEvent::Applied) => (
                Self::Idle,
                vec![PhaseAction::RecordOutcome { success: true }],
            ),

            // Failure edge from every active phase
            (phase, PhaseEvent::Failed) if phase.is_active() => (
                Self::Idle,
                vec![PhaseAction::RecordOutcome { success: false }],
            ),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Whether a sync is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Short lowercase name for logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Testing => "testing",
            Self::Pushing => "pushing",
            Self::Confirming => "confirming",
            Self::Applying => "applying",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A sync was admitted.
    Started,
    /// The stored config allows this sync.
    ConfigLoaded,
    /// No config, or auto-sync disabled for an automatic run.
    Skipped,
    /// Ping answered 200 with a supported version.
    ProbeSucceeded,
    /// `/sync` answered 200 with a decodable body.
    PushSucceeded,
    /// `/confirm` answered 200.
    ConfirmSucceeded,
    /// The response was merged into the store.
    Applied,
    /// The current step failed.
    Failed,
}

/// Actions to be executed by the sync client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    /// Read the sync config and check whether this run may proceed.
    LoadConfig,
    /// `GET /ping`.
    Probe,
    /// `POST /sync` with the full local snapshot.
    Push,
    /// `POST /confirm` echoing the response.
    Confirm,
    /// Apply the response to the store in one transaction.
    Apply,
    /// Publish the last-sync outcome.
    RecordOutcome {
        /// Whether the sync succeeded.
        success: bool,
    },
}
