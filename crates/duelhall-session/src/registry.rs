//! Session registry: creates, tracks, and tears down sessions.
//!
//! The table sits behind one async mutex that is only held for
//! bookkeeping. Every wait on a session actor happens with the lock
//! released, so a session stuck on a slow provider holds up nobody else.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use duelhall_protocol::{ConnectionId, SessionId};
use duelhall_roster::AnimationProvider;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use crate::actor::spawn_session;
use crate::{ParticipantSender, SessionConfig, SessionError, SessionHandle, SessionInfo};

/// How many times a join retries after racing into a session that was
/// closing.
const JOIN_ATTEMPTS: usize = 3;

/// All live sessions plus which connection sits in which of them.
///
/// Sessions are created on first join and destroyed when their last
/// participant leaves; the registry never keeps an empty one. Methods
/// take `&self`, so the server shares one registry across connection
/// tasks without an outer lock.
pub struct SessionRegistry<A: AnimationProvider> {
    config: SessionConfig,
    animations: Arc<A>,
    table: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    /// Live sessions, keyed by id.
    sessions: HashMap<SessionId, SessionHandle>,

    /// Reverse index for disconnect cleanup. A connection may sit in
    /// several sessions at once.
    memberships: HashMap<ConnectionId, HashSet<SessionId>>,

    /// Sessions created so far, for per-session seeding.
    created: u64,
}

impl Table {
    /// The session's handle unless its actor has already stopped.
    fn live(&self, session_id: &SessionId) -> Option<&SessionHandle> {
        self.sessions.get(session_id).filter(|h| !h.is_closed())
    }

    /// Drops the entry for `session_id` if it still points at `handle`'s
    /// actor. A newer session under the same id is left alone.
    fn forget(&mut self, session_id: &SessionId, handle: &SessionHandle) {
        let current = self
            .sessions
            .get(session_id)
            .is_some_and(|h| h.same_actor(handle));
        if !current {
            return;
        }
        self.sessions.remove(session_id);
        for joined in self.memberships.values_mut() {
            joined.remove(session_id);
        }
        self.memberships.retain(|_, joined| !joined.is_empty());
        tracing::info!(%session_id, "session destroyed");
    }

    fn unindex(&mut self, connection_id: ConnectionId, session_id: &SessionId) {
        if let Some(joined) = self.memberships.get_mut(&connection_id) {
            joined.remove(session_id);
            if joined.is_empty() {
                self.memberships.remove(&connection_id);
            }
        }
    }

    fn next_rng(&mut self, seed: Option<u64>) -> StdRng {
        let n = self.created;
        self.created += 1;
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_os_rng(),
        }
    }
}

impl<A: AnimationProvider> SessionRegistry<A> {
    pub fn new(config: SessionConfig, animations: A) -> Self {
        Self::with_shared(config, Arc::new(animations))
    }

    /// Like [`new`](Self::new) for a provider that is already shared.
    pub fn with_shared(mut config: SessionConfig, animations: Arc<A>) -> Self {
        config.rules = config.rules.validated();
        Self {
            config,
            animations,
            table: Mutex::new(Table::default()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Adds a connection to a session, creating the session if unknown.
    ///
    /// The joiner gets `Joined`; everyone, joiner included, gets the join
    /// notice and the participant list.
    pub async fn join_session(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<(), SessionError> {
        for _ in 0..JOIN_ATTEMPTS {
            let (handle, created) = self.open(&session_id).await;

            let joined = handle.join(connection_id, sender.clone()).await;
            match joined {
                Ok(()) => {
                    self.table
                        .lock()
                        .await
                        .memberships
                        .entry(connection_id)
                        .or_default()
                        .insert(session_id);
                    return Ok(());
                }
                Err(SessionError::Unavailable(_)) => {
                    // Emptied and stopped between lookup and join.
                    tracing::debug!(%session_id, %connection_id, "session closed under a join, retrying");
                    self.table.lock().await.forget(&session_id, &handle);
                }
                Err(e) => {
                    if created {
                        // Never leave a session nobody got into.
                        self.reap(&session_id, &handle, handle.release().await).await;
                    }
                    return Err(e);
                }
            }
        }
        Err(SessionError::Unavailable(session_id))
    }

    /// Removes a connection from a session and destroys the session if
    /// that emptied it.
    ///
    /// Removing a connection that is not in the session is a no-op.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the session does not exist.
    pub async fn remove_participant(
        &self,
        session_id: &SessionId,
        connection_id: ConnectionId,
    ) -> Result<(), SessionError> {
        let handle = self.handle(session_id).await?;
        let left = handle.leave(connection_id).await;

        self.table.lock().await.unindex(connection_id, session_id);
        self.reap(session_id, &handle, left).await;
        Ok(())
    }

    /// Removes a connection from every session it joined. Returns those
    /// sessions.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Vec<SessionId> {
        let joined: Vec<(SessionId, Option<SessionHandle>)> = {
            let mut table = self.table.lock().await;
            let ids = table.memberships.remove(&connection_id).unwrap_or_default();
            let handles = ids
                .into_iter()
                .map(|id| {
                    let handle = table.sessions.get(&id).cloned();
                    (id, handle)
                })
                .collect();
            handles
        };

        let mut left = Vec::with_capacity(joined.len());
        for (session_id, handle) in joined {
            match handle {
                Some(handle) => {
                    let remaining = handle.leave(connection_id).await;
                    self.reap(&session_id, &handle, remaining).await;
                }
                None => tracing::debug!(%session_id, %connection_id, "already gone"),
            }
            left.push(session_id);
        }
        left
    }

    /// A clone of the session's handle, for callers that want to await
    /// the actor without holding the registry.
    pub async fn handle(&self, session_id: &SessionId) -> Result<SessionHandle, SessionError> {
        self.table
            .lock()
            .await
            .live(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))
    }

    pub async fn info(&self, session_id: &SessionId) -> Result<SessionInfo, SessionError> {
        self.handle(session_id).await?.info().await
    }

    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.table.lock().await.live(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        let table = self.table.lock().await;
        table.sessions.values().filter(|h| !h.is_closed()).count()
    }

    /// Sessions a connection is currently in, sorted.
    pub async fn sessions_of(&self, connection_id: ConnectionId) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .table
            .lock()
            .await
            .memberships
            .get(&connection_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// The live handle for `session_id`, spawning a fresh session if there
    /// is none. `true` when it was just created.
    async fn open(&self, session_id: &SessionId) -> (SessionHandle, bool) {
        let mut table = self.table.lock().await;
        if let Some(handle) = table.live(session_id) {
            return (handle.clone(), false);
        }
        if let Some(stopped) = table.sessions.get(session_id).cloned() {
            table.forget(session_id, &stopped);
        }

        let rng = table.next_rng(self.config.rng_seed);
        let handle = spawn_session(
            session_id.clone(),
            self.config.clone(),
            Arc::clone(&self.animations),
            rng,
        );
        table.sessions.insert(session_id.clone(), handle.clone());
        tracing::info!(%session_id, "session created");
        (handle, true)
    }

    /// Drops the session once its actor reports it empty or unreachable.
    async fn reap(
        &self,
        session_id: &SessionId,
        handle: &SessionHandle,
        remaining: Result<usize, SessionError>,
    ) {
        match remaining {
            Ok(0) => {}
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "session actor unreachable, dropping it");
            }
        }
        self.table.lock().await.forget(session_id, handle);
    }
}

#[cfg(test)]
mod tests {
    use duelhall_protocol::{AnimationCategory, ServerMessage};
    use duelhall_roster::ProviderError;
    use tokio::sync::mpsc;

    use super::*;

    struct NoAnimations;

    impl AnimationProvider for NoAnimations {
        async fn fetch(&self, _category: AnimationCategory) -> Result<String, ProviderError> {
            Err(ProviderError::Status(404))
        }
    }

    fn registry() -> SessionRegistry<NoAnimations> {
        SessionRegistry::new(SessionConfig::default().rng_seed(1), NoAnimations)
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn sid(id: &str) -> SessionId {
        SessionId::from(id)
    }

    fn channel() -> (ParticipantSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_first_join_creates_session() {
        let reg = registry();
        let (tx, mut rx) = channel();

        reg.join_session(sid("arena"), cid(1), tx).await.unwrap();

        assert!(reg.contains(&sid("arena")).await);
        assert_eq!(reg.session_count().await, 1);
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Joined {
                session_id: sid("arena")
            })
        );
    }

    #[tokio::test]
    async fn test_duplicate_join_keeps_single_membership() {
        let reg = registry();
        let (tx, _rx) = channel();
        reg.join_session(sid("arena"), cid(1), tx.clone()).await.unwrap();

        let err = reg.join_session(sid("arena"), cid(1), tx).await.unwrap_err();

        assert!(matches!(err, SessionError::AlreadyJoined(..)));
        assert_eq!(reg.info(&sid("arena")).await.unwrap().participants.len(), 1);
    }

    #[tokio::test]
    async fn test_last_leave_destroys_session() {
        let reg = registry();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        reg.join_session(sid("arena"), cid(1), tx1).await.unwrap();
        reg.join_session(sid("arena"), cid(2), tx2).await.unwrap();

        reg.remove_participant(&sid("arena"), cid(1)).await.unwrap();
        assert!(reg.contains(&sid("arena")).await);

        let handle = reg.handle(&sid("arena")).await.unwrap();
        reg.remove_participant(&sid("arena"), cid(2)).await.unwrap();
        assert!(!reg.contains(&sid("arena")).await);
        assert_eq!(reg.session_count().await, 0);
        // The actor is gone too.
        assert!(handle.is_closed());
        assert!(matches!(handle.info().await, Err(SessionError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_remove_non_member_is_noop() {
        let reg = registry();
        let (tx, _rx) = channel();
        reg.join_session(sid("arena"), cid(1), tx).await.unwrap();

        reg.remove_participant(&sid("arena"), cid(9)).await.unwrap();
        reg.remove_participant(&sid("arena"), cid(9)).await.unwrap();

        assert_eq!(reg.info(&sid("arena")).await.unwrap().participants.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.remove_participant(&sid("ghost"), cid(1)).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(reg.handle(&sid("ghost")).await, Err(SessionError::NotFound(_))));
        assert!(matches!(reg.info(&sid("ghost")).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disconnect_leaves_every_session() {
        let reg = registry();
        let (tx, _rx) = channel();
        let (other, _other_rx) = channel();
        reg.join_session(sid("a"), cid(1), tx.clone()).await.unwrap();
        reg.join_session(sid("b"), cid(1), tx).await.unwrap();
        reg.join_session(sid("b"), cid(2), other).await.unwrap();
        assert_eq!(reg.sessions_of(cid(1)).await, vec![sid("a"), sid("b")]);

        let mut left = reg.disconnect(cid(1)).await;
        left.sort();

        assert_eq!(left, vec![sid("a"), sid("b")]);
        assert!(!reg.contains(&sid("a")).await);
        assert!(reg.contains(&sid("b")).await);
        assert!(reg.sessions_of(cid(1)).await.is_empty());
        assert_eq!(reg.sessions_of(cid(2)).await, vec![sid("b")]);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_connection() {
        let reg = registry();
        assert!(reg.disconnect(cid(5)).await.is_empty());
    }

    #[tokio::test]
    async fn test_join_replaces_a_stopped_session() {
        let reg = registry();
        let (tx, _rx) = channel();
        reg.join_session(sid("arena"), cid(1), tx).await.unwrap();
        let stale = reg.handle(&sid("arena")).await.unwrap();

        // Empty the session behind the registry's back: the actor stops
        // but the table entry is still there.
        assert_eq!(stale.leave(cid(1)).await.unwrap(), 0);
        assert!(stale.is_closed());
        assert!(!reg.contains(&sid("arena")).await);

        let (tx, mut rx) = channel();
        reg.join_session(sid("arena"), cid(2), tx).await.unwrap();

        let fresh = reg.handle(&sid("arena")).await.unwrap();
        assert!(!fresh.same_actor(&stale));
        assert_eq!(rx.recv().await, Some(ServerMessage::Joined { session_id: sid("arena") }));
        assert_eq!(reg.session_count().await, 1);
        assert!(reg.sessions_of(cid(1)).await.is_empty());
        assert_eq!(reg.sessions_of(cid(2)).await, vec![sid("arena")]);
    }

    #[tokio::test]
    async fn test_release_only_stops_empty_sessions() {
        let reg = registry();
        let (tx, _rx) = channel();
        reg.join_session(sid("arena"), cid(1), tx).await.unwrap();
        let handle = reg.handle(&sid("arena")).await.unwrap();

        assert_eq!(handle.release().await.unwrap(), 1);
        assert!(!handle.is_closed());
    }

    #[tokio::test]
    async fn test_seeded_rngs_differ_per_session() {
        use rand::Rng;

        let reg = registry();
        let seed = reg.config().rng_seed;
        let mut table = reg.table.lock().await;
        let a: u64 = table.next_rng(seed).random();
        let b: u64 = table.next_rng(seed).random();
        assert_ne!(a, b);

        let mut again = Table::default();
        assert_eq!(again.next_rng(seed).random::<u64>(), a);
    }
}
