use uuid::Uuid;

/// Notifications for the host UI. Non-blocking events map to a toast or
/// banner; blocking ones require explicit acknowledgment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    /// Remote unreachable or failing; the UI should fall back to the
    /// cached view.
    DegradedMode { reason: String },

    /// The access token was rejected; a new login is required.
    ReauthRequired,

    /// The remote copy is confirmed gone; the local copy is kept pending
    /// a user decision.
    EntityOrphaned { id: Uuid },

    /// Decryption produced data that cannot be used; the entity is
    /// excluded from further sync attempts.
    CorruptEntity { id: Uuid },

    /// The local store refused a write for lack of space.
    QuotaExceeded,

    SyncCompleted,
}

impl SyncEvent {
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            SyncEvent::ReauthRequired
                | SyncEvent::CorruptEntity { .. }
                | SyncEvent::QuotaExceeded,
        )
    }
}
