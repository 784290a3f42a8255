//! UI-facing notifications emitted by the sync engine.
//!
//! [`WordSpyEvent`]s are coarse change signals delivered on a bounded channel
//! returned from `WordSpyClient::start`. The UI reads the actual snapshot
//! through the client handle; these events only say *that* something changed
//! (plus the odd payload worth carrying, like a rejection message).

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Notification emitted to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum WordSpyEvent {
    /// The transport is live and the sync loop is running.
    Connected,
    /// The sync loop exited. Always the last event of a connection.
    Disconnected {
        reason: Option<String>,
    },
    /// A fresh room membership was established.
    RoomJoined {
        room_code: String,
    },
    /// The room snapshot was replaced.
    RoomUpdated,
    /// The room (and any game) was cleared.
    RoomLeft,
    /// The game snapshot was replaced.
    GameUpdated,
    /// A chat entry was appended (confirmed or optimistic).
    MessageReceived {
        from: String,
    },
    /// The set of typing users changed.
    TypingChanged,
    /// The server rejected an action with a message. Non-fatal; state is
    /// unchanged.
    Rejected {
        message: String,
    },
}

/// Emit an event without blocking. If the channel is full the event is
/// dropped with a warning so the sync loop never stalls on a slow consumer.
pub(crate) fn notify(tx: &mpsc::Sender<WordSpyEvent>, event: WordSpyEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final [`Disconnected`](WordSpyEvent::Disconnected) event with a
/// blocking send — it must never be dropped, regardless of channel pressure.
pub(crate) async fn notify_disconnected(
    tx: &mpsc::Sender<WordSpyEvent>,
    reason: Option<String>,
) {
    if tx.send(WordSpyEvent::Disconnected { reason }).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}
