//! Error types for the session layer.

use duelhall_battle::BattleError;
use duelhall_protocol::{ConnectionId, SessionId};

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session does not exist.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The connection is already a participant of this session.
    #[error("{0} already joined session {1}")]
    AlreadyJoined(ConnectionId, SessionId),

    /// The connection is not a participant of this session.
    #[error("{0} is not in session {1}")]
    NotInSession(ConnectionId, SessionId),

    /// Picks are frozen: a battle is running, or two other participants
    /// already hold combatants.
    #[error("selection is closed in session {0}")]
    SelectionClosed(SessionId),

    /// Attack with no battle running.
    #[error("no battle in session {0}")]
    NoBattle(SessionId),

    #[error(transparent)]
    Battle(#[from] BattleError),

    /// The session's command channel is full or closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

impl SessionError {
    /// HTTP-style status code for the `Error` frame sent to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::NotInSession(..) => 404,
            Self::AlreadyJoined(..) | Self::SelectionClosed(_) | Self::NoBattle(_) => 409,
            Self::Battle(BattleError::OutOfTurn(_) | BattleError::Concluded) => 409,
            Self::Battle(_) => 400,
            Self::Unavailable(_) => 503,
        }
    }

    /// `true` for rejections that are dropped without telling anyone:
    /// attacks out of turn, from a non-fighter, or with no battle.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::NoBattle(_)
                | Self::Battle(
                    BattleError::OutOfTurn(_) | BattleError::NotAFighter(_) | BattleError::Concluded
                )
        )
    }
}
