//! The session state machine, free of tasks and channels.
//!
//! Every transition takes `&mut self`, validates first and only then
//! mutates, so a rejected action leaves the session exactly as it was.
//! Each one returns the broadcasts it produced, in order; delivering
//! them is the actor's job.

use duelhall_battle::{Battle, BattleRules, Contender, Verdict};
use duelhall_protocol::{
    AttackKind, BattleSnapshot, Combatant, ConnectionId, Participant, ServerMessage, SessionId,
};
use rand::Rng;

use crate::SessionError;

/// A read-only view of a session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub participants: Vec<Participant>,
    pub battle: Option<BattleSnapshot>,
}

/// Participants in join order plus the battle, if one is running.
///
/// The battle is cleared the moment it has a winner, so `battle` is
/// `Some` exactly while a fight is in progress.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    participants: Vec<Participant>,
    battle: Option<Battle>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            participants: Vec::new(),
            battle: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn battle(&self) -> Option<&Battle> {
        self.battle.as_ref()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.participants
            .iter()
            .any(|p| p.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Appends a participant with no combatant.
    ///
    /// There is no cap here: a third joiner watches, the pairing rule in
    /// [`select`](Self::select) keeps the fight at two.
    pub fn join(&mut self, connection_id: ConnectionId) -> Result<Vec<ServerMessage>, SessionError> {
        if self.contains(connection_id) {
            return Err(SessionError::AlreadyJoined(connection_id, self.id.clone()));
        }
        self.participants.push(Participant::new(connection_id));

        Ok(vec![
            ServerMessage::Notice {
                session_id: self.id.clone(),
                message: format!("{connection_id} joined the session."),
            },
            self.participants_message(),
        ])
    }

    /// Removes a participant. Removing someone who is not here is a no-op
    /// with no broadcasts.
    ///
    /// If the departing participant was fighting, the battle is dropped and
    /// the rest are told with `BattleAbandoned`.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Vec<ServerMessage> {
        let Some(index) = self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
        else {
            return Vec::new();
        };
        self.participants.remove(index);

        let mut out = Vec::new();
        if self
            .battle
            .as_ref()
            .is_some_and(|b| b.is_fighter(connection_id))
        {
            self.battle = None;
            out.push(ServerMessage::BattleAbandoned {
                session_id: self.id.clone(),
                departed: connection_id,
            });
        }
        if !self.participants.is_empty() {
            out.push(self.participants_message());
        }
        out
    }

    /// Records a participant's pick and starts the battle once exactly two
    /// participants hold a combatant.
    ///
    /// Picks may be changed freely until the battle starts.
    ///
    /// # Errors
    /// - [`SessionError::NotInSession`] for strangers;
    /// - [`SessionError::SelectionClosed`] while a battle runs, or when the
    ///   picker is uncommitted and two others already hold combatants.
    pub fn select(
        &mut self,
        connection_id: ConnectionId,
        combatant: Combatant,
        rules: &BattleRules,
    ) -> Result<Vec<ServerMessage>, SessionError> {
        let index = self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
            .ok_or_else(|| SessionError::NotInSession(connection_id, self.id.clone()))?;

        if self.battle.is_some() {
            return Err(SessionError::SelectionClosed(self.id.clone()));
        }
        let committed_others = self
            .participants
            .iter()
            .filter(|p| p.connection_id != connection_id && p.is_committed())
            .count();
        if committed_others >= 2 {
            return Err(SessionError::SelectionClosed(self.id.clone()));
        }

        // Build the battle before touching anything so a failed start
        // leaves the previous pick in place.
        let battle = if committed_others == 1 {
            let mut pair = self.participants.iter().filter_map(|p| {
                if p.connection_id == connection_id {
                    Some(Contender::new(connection_id, combatant.clone()))
                } else {
                    p.combatant
                        .clone()
                        .map(|c| Contender::new(p.connection_id, c))
                }
            });
            match (pair.next(), pair.next()) {
                (Some(first), Some(second)) => Some(Battle::start(first, second, rules)?),
                _ => None,
            }
        } else {
            None
        };

        self.participants[index].combatant = Some(combatant);
        let mut out = vec![self.participants_message()];

        if let Some(battle) = battle {
            tracing::info!(
                session_id = %self.id,
                first = %battle.fighters()[0].connection_id,
                second = %battle.fighters()[1].connection_id,
                "battle started"
            );
            out.push(ServerMessage::BattleStarted {
                session_id: self.id.clone(),
                battle: battle.snapshot(),
            });
            self.battle = Some(battle);
        }
        Ok(out)
    }

    /// Checks that `actor` could attack right now, without changing
    /// anything. Lets the caller skip the animation fetch for attacks that
    /// would be rejected anyway.
    pub fn check_attack(&self, actor: ConnectionId) -> Result<(), SessionError> {
        if !self.contains(actor) {
            return Err(SessionError::NotInSession(actor, self.id.clone()));
        }
        let battle = self
            .battle
            .as_ref()
            .ok_or_else(|| SessionError::NoBattle(self.id.clone()))?;
        battle.check_turn(actor)?;
        Ok(())
    }

    /// Resolves one attack with an already-fetched animation reference.
    ///
    /// On victory the battle is cleared and only `BattleEnded` goes out;
    /// otherwise the updated snapshot is broadcast.
    pub fn attack<R: Rng>(
        &mut self,
        actor: ConnectionId,
        kind: AttackKind,
        animation: Option<String>,
        rules: &BattleRules,
        rng: &mut R,
    ) -> Result<Vec<ServerMessage>, SessionError> {
        self.check_attack(actor)?;
        let battle = self
            .battle
            .as_mut()
            .ok_or_else(|| SessionError::NoBattle(self.id.clone()))?;

        let outcome = battle.resolve_attack(actor, kind, animation, rules, rng)?;
        tracing::debug!(
            session_id = %self.id,
            attacker = %outcome.attacker,
            defender = %outcome.defender,
            damage = outcome.damage,
            powered_up = outcome.powered_up,
            "attack resolved"
        );

        match outcome.verdict {
            Verdict::Continue { .. } => Ok(vec![ServerMessage::BattleUpdated {
                session_id: self.id.clone(),
                battle: battle.snapshot(),
            }]),
            Verdict::Victory {
                winner,
                winner_name,
            } => {
                self.battle = None;
                tracing::info!(session_id = %self.id, %winner, "battle ended");
                Ok(vec![ServerMessage::BattleEnded {
                    session_id: self.id.clone(),
                    winner,
                    message: format!("{winner_name} wins! 🎉"),
                    winner_name,
                }])
            }
        }
    }

    /// Drops the battle and every pick.
    pub fn restart(&mut self, connection_id: ConnectionId) -> Result<Vec<ServerMessage>, SessionError> {
        if !self.contains(connection_id) {
            return Err(SessionError::NotInSession(connection_id, self.id.clone()));
        }
        self.battle = None;
        for p in &mut self.participants {
            p.combatant = None;
        }
        Ok(vec![ServerMessage::Restarted {
            session_id: self.id.clone(),
        }])
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            participants: self.participants.clone(),
            battle: self.battle.as_ref().map(Battle::snapshot),
        }
    }

    fn participants_message(&self) -> ServerMessage {
        ServerMessage::Participants {
            session_id: self.id.clone(),
            participants: self.participants.clone(),
        }
    }
}
