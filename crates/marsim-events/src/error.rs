//! Error types for the history log.

/// Error returned by a [`HistoricalEventListener`](crate::HistoricalEventListener).
///
/// The manager logs it and moves on to the next listener; it never reaches
/// the producer that registered the event.
#[derive(Debug, thiserror::Error)]
pub enum HistoryListenerError {
    /// The listener could not handle the record.
    #[error("history listener failed: {reason}")]
    Failed {
        /// Explanation from the listener.
        reason: String,
    },

    /// The listener's downstream sink has gone away.
    #[error("history listener sink closed")]
    Closed,
}
