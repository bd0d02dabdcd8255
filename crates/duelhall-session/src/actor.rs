//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Commands arrive over a bounded mpsc queue and are handled one at a
//! time, so actions within a session apply strictly in arrival order.
//! An attack awaits its animation fetch inside the actor, which holds up
//! that session's queue and nothing else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use duelhall_battle::pick_animation;
use duelhall_protocol::{
    AnimationCategory, AttackKind, Combatant, ConnectionId, ServerMessage, SessionId,
};
use duelhall_roster::AnimationProvider;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::{Session, SessionConfig, SessionError, SessionInfo};

/// Channel sender for delivering broadcasts to one participant's
/// connection handler.
pub type ParticipantSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a session actor through its channel.
///
/// Variants carrying a `oneshot::Sender` are request/response: the
/// caller waits on that channel for the outcome.
pub(crate) enum SessionCommand {
    Join {
        connection_id: ConnectionId,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Replies with how many participants remain. The actor stops once
    /// that reaches zero.
    Leave {
        connection_id: ConnectionId,
        reply: oneshot::Sender<usize>,
    },

    Select {
        connection_id: ConnectionId,
        combatant: Combatant,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    Attack {
        connection_id: ConnectionId,
        kind: AttackKind,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    Restart {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    Info {
        reply: oneshot::Sender<SessionInfo>,
    },

    /// Stops the actor if nobody is in the session. Replies with the
    /// participant count.
    Release {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to a running session actor.
///
/// Cheap to clone: it is an `mpsc::Sender` plus the id. Callers clone it
/// out of the registry and release the registry lock before awaiting.
///
/// Once the session empties, the actor closes its queue and every further
/// call fails with [`SessionError::Unavailable`].
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) async fn join(
        &self,
        connection_id: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Join {
            connection_id,
            sender,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Returns the number of participants left.
    pub(crate) async fn leave(&self, connection_id: ConnectionId) -> Result<usize, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Leave {
            connection_id,
            reply,
        })
        .await?;
        self.wait(rx).await
    }

    /// Records a combatant pick; may start the battle.
    pub async fn select(
        &self,
        connection_id: ConnectionId,
        combatant: Combatant,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Select {
            connection_id,
            combatant,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    /// Submits an attack. Out-of-turn attacks, attacks from non-fighters
    /// and attacks with no battle are dropped by the actor and still
    /// answer `Ok(())`.
    pub async fn attack(&self, connection_id: ConnectionId, kind: AttackKind) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Attack {
            connection_id,
            kind,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    pub async fn restart(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Restart {
            connection_id,
            reply,
        })
        .await?;
        self.wait(rx).await?
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Info { reply }).await?;
        self.wait(rx).await
    }

    /// Stops the actor if the session is empty. Returns the participant
    /// count.
    pub(crate) async fn release(&self) -> Result<usize, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Release { reply }).await?;
        self.wait(rx).await
    }

    /// `true` once the actor has stopped taking commands.
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// `true` if both handles reach the same actor.
    pub(crate) fn same_actor(&self, other: &SessionHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable(self.session_id.clone()))
    }

    async fn wait<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, SessionError> {
        rx.await
            .map_err(|_| SessionError::Unavailable(self.session_id.clone()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<A: AnimationProvider> {
    session: Session,
    config: SessionConfig,
    /// Per-participant outbound channels.
    senders: HashMap<ConnectionId, ParticipantSender>,
    animations: Arc<A>,
    rng: StdRng,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<A: AnimationProvider> SessionActor<A> {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session.id(), "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Join {
                    connection_id,
                    sender,
                    reply,
                } => {
                    let result = self.handle_join(connection_id, sender);
                    let _ = reply.send(result);
                }
                SessionCommand::Leave {
                    connection_id,
                    reply,
                } => {
                    self.handle_leave(connection_id);
                    if self.reply_or_close(reply) {
                        break;
                    }
                }
                SessionCommand::Select {
                    connection_id,
                    combatant,
                    reply,
                } => {
                    let result = self.handle_select(connection_id, combatant);
                    let _ = reply.send(result);
                }
                SessionCommand::Attack {
                    connection_id,
                    kind,
                    reply,
                } => {
                    let result = self.handle_attack(connection_id, kind).await;
                    let _ = reply.send(result);
                }
                SessionCommand::Restart {
                    connection_id,
                    reply,
                } => {
                    let result = self.handle_restart(connection_id);
                    let _ = reply.send(result);
                }
                SessionCommand::Info { reply } => {
                    let _ = reply.send(self.session.info());
                }
                SessionCommand::Release { reply } => {
                    if self.reply_or_close(reply) {
                        break;
                    }
                }
            }
        }

        tracing::info!(session_id = %self.session.id(), "session actor stopped");
    }

    /// Replies with the participant count. An empty session closes the
    /// queue first, so the caller sees the handle as closed by the time
    /// the reply lands. Returns `true` if the actor should stop.
    ///
    /// Commands still queued behind this one are dropped and their
    /// callers get `Unavailable`.
    fn reply_or_close(&mut self, reply: oneshot::Sender<usize>) -> bool {
        let remaining = self.session.len();
        if remaining == 0 {
            self.receiver.close();
        }
        let _ = reply.send(remaining);
        remaining == 0
    }

    fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<(), SessionError> {
        let out = self.session.join(connection_id)?;

        let _ = sender.send(ServerMessage::Joined {
            session_id: self.session.id().clone(),
        });
        self.senders.insert(connection_id, sender);
        tracing::info!(
            session_id = %self.session.id(),
            %connection_id,
            participants = self.session.len(),
            "participant joined"
        );

        self.broadcast(out);
        Ok(())
    }

    fn handle_leave(&mut self, connection_id: ConnectionId) {
        if !self.session.contains(connection_id) {
            return;
        }
        let out = self.session.leave(connection_id);
        self.senders.remove(&connection_id);
        tracing::info!(
            session_id = %self.session.id(),
            %connection_id,
            participants = self.session.len(),
            "participant left"
        );
        if out
            .iter()
            .any(|m| matches!(m, ServerMessage::BattleAbandoned { .. }))
        {
            tracing::info!(session_id = %self.session.id(), departed = %connection_id, "battle abandoned");
        }

        self.broadcast(out);
    }

    fn handle_select(
        &mut self,
        connection_id: ConnectionId,
        combatant: Combatant,
    ) -> Result<(), SessionError> {
        let out = self
            .session
            .select(connection_id, combatant, &self.config.rules)?;
        self.broadcast(out);
        Ok(())
    }

    /// Validate, fetch the animation, then apply the pure transition.
    ///
    /// Nothing else runs on this session between the check and the
    /// transition, so the check cannot go stale while the fetch is
    /// pending.
    async fn handle_attack(
        &mut self,
        connection_id: ConnectionId,
        kind: AttackKind,
    ) -> Result<(), SessionError> {
        if let Err(e) = self.session.check_attack(connection_id) {
            return self.drop_silent(connection_id, e);
        }

        let category = pick_animation(&mut self.rng);
        let animation = fetch_animation(
            self.animations.as_ref(),
            category,
            self.config.provider_timeout,
            self.session.id(),
        )
        .await;

        match self.session.attack(
            connection_id,
            kind,
            animation,
            &self.config.rules,
            &mut self.rng,
        ) {
            Ok(out) => {
                self.broadcast(out);
                Ok(())
            }
            Err(e) => self.drop_silent(connection_id, e),
        }
    }

    fn handle_restart(&mut self, connection_id: ConnectionId) -> Result<(), SessionError> {
        let out = self.session.restart(connection_id)?;
        tracing::info!(session_id = %self.session.id(), %connection_id, "session restarted");
        self.broadcast(out);
        Ok(())
    }

    /// Swallows rejections that get no answer, passes the rest back.
    fn drop_silent(&self, connection_id: ConnectionId, err: SessionError) -> Result<(), SessionError> {
        if err.is_silent() {
            tracing::debug!(
                session_id = %self.session.id(),
                %connection_id,
                reason = %err,
                "attack dropped"
            );
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Sends every message to every participant. A closed receiver means
    /// the participant is on its way out; the message is dropped.
    fn broadcast(&self, msgs: Vec<ServerMessage>) {
        for msg in msgs {
            for p in self.session.participants() {
                if let Some(sender) = self.senders.get(&p.connection_id) {
                    let _ = sender.send(msg.clone());
                }
            }
        }
    }
}

/// One bounded animation fetch. Any failure means no animation.
async fn fetch_animation<A: AnimationProvider>(
    animations: &A,
    category: AnimationCategory,
    limit: Duration,
    session_id: &SessionId,
) -> Option<String> {
    match tokio::time::timeout(limit, animations.fetch(category)).await {
        Ok(Ok(reference)) => Some(reference),
        Ok(Err(e)) => {
            tracing::warn!(%session_id, %category, error = %e, "animation fetch failed");
            None
        }
        Err(_) => {
            tracing::warn!(%session_id, %category, ?limit, "animation fetch timed out");
            None
        }
    }
}

/// Spawns a session actor and returns a handle to it.
pub(crate) fn spawn_session<A: AnimationProvider>(
    session_id: SessionId,
    config: SessionConfig,
    animations: Arc<A>,
    rng: StdRng,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let actor = SessionActor {
        session: Session::new(session_id.clone()),
        config,
        senders: HashMap::new(),
        animations,
        rng,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
