use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::HeadacheCase;

use super::session::Session;
use super::DialogueError;

/// Live sessions keyed by id. Each session has its own lock; a turn holds
/// it from start to finish, so turns of one session never interleave while
/// different sessions proceed in parallel.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session, optionally seeded with a case.
    pub async fn create(&self, snapshot: Option<HeadacheCase>) -> (Uuid, Arc<Mutex<Session>>) {
        let session = match snapshot {
            Some(case) => Session::from_snapshot(case),
            None => Session::new(),
        };
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        tracing::info!(session_id = %id, "Session created");
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Existing session for `id`, or a new one when no id is given.
    pub async fn resolve(
        &self,
        id: Option<Uuid>,
        snapshot: Option<HeadacheCase>,
    ) -> Result<(Uuid, Arc<Mutex<Session>>), DialogueError> {
        match id {
            Some(id) => self
                .get(id)
                .await
                .map(|handle| (id, handle))
                .ok_or(DialogueError::UnknownSession(id)),
            None => Ok(self.create(snapshot).await),
        }
    }

    /// Restart the conversation of `id`, keeping the id. Waits for any
    /// turn in progress.
    pub async fn reset(&self, id: Uuid) -> Result<(), DialogueError> {
        let handle = self.get(id).await.ok_or(DialogueError::UnknownSession(id))?;
        handle.lock().await.reset();
        tracing::info!(session_id = %id, "Session reset");
        Ok(())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
