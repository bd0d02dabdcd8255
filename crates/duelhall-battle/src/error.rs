//! Error types for the battle layer.

use duelhall_protocol::ConnectionId;

/// Reasons a battle refuses a transition. None of them mutate state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BattleError {
    /// The actor is a fighter but the turn belongs to the other one.
    #[error("it is not {0}'s turn")]
    OutOfTurn(ConnectionId),

    /// The actor is not one of the two fighters.
    #[error("{0} is not fighting in this battle")]
    NotAFighter(ConnectionId),

    /// The battle already has a winner.
    #[error("battle is already concluded")]
    Concluded,

    /// A pairing that can never be valid (e.g. a participant fighting
    /// itself).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
