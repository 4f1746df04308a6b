//! Process-wide registry of live game controllers. Each session has at
//! most one controller, shared by every connection that joined it and
//! reference-counted so it disappears with the last connection.

use crate::services::game::error::ControllerError;
use crate::services::game::words::WordSource;
use crate::services::game::GameController;
use crate::utils::types::SessionKey;
use log::debug;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to a session's controller. The mutex is the session's
/// single-writer serialization point: every event and tick goes through
/// it.
pub type ControllerRef = Arc<Mutex<GameController>>;

struct Entry {
    use_count: usize,
    controller: ControllerRef,
}

pub struct ControllerRegistry {
    db: DatabaseConnection,
    word_source: Arc<dyn WordSource>,
    /// Construction of a missing controller happens while this lock is
    /// held, which is what guarantees at most one controller per session
    entries: Mutex<HashMap<SessionKey, Entry>>,
}

impl ControllerRegistry {
    pub fn new(db: DatabaseConnection, word_source: Arc<dyn WordSource>) -> Self {
        Self {
            db,
            word_source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the controller for the session, constructing it on first
    /// use. Construction failures ([ControllerError::GameOver],
    /// [ControllerError::NotFound]) propagate to the caller.
    pub async fn acquire(&self, session_key: SessionKey) -> Result<ControllerRef, ControllerError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&session_key) {
            entry.use_count += 1;
            return Ok(entry.controller.clone());
        }

        let controller =
            GameController::create(self.db.clone(), session_key, self.word_source.clone()).await?;
        let controller: ControllerRef = Arc::new(Mutex::new(controller));
        entries.insert(
            session_key,
            Entry {
                use_count: 1,
                controller: controller.clone(),
            },
        );
        Ok(controller)
    }

    /// Drops one reference to the session's controller, removing it
    /// entirely when the last reference is gone
    pub async fn release(&self, session_key: SessionKey) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&session_key) {
            entry.use_count = entry.use_count.saturating_sub(1);
            if entry.use_count == 0 {
                entries.remove(&session_key);
                debug!("Dropped controller (session: {})", session_key);
            }
        }
    }

    /// Whether a controller currently exists for the session
    pub async fn contains(&self, session_key: SessionKey) -> bool {
        self.entries.lock().await.contains_key(&session_key)
    }
}

#[cfg(test)]
mod test {
    use super::ControllerRegistry;
    use crate::database::connect_test;
    use crate::database::entities::game_sessions::CreateGameSession;
    use crate::database::entities::{GameMode, GameSession};
    use crate::services::game::error::ControllerError;
    use crate::services::game::words::SequenceSource;
    use std::sync::Arc;

    async fn setup() -> (ControllerRegistry, GameSession) {
        let db = connect_test().await;
        let session = GameSession::create(
            &db,
            CreateGameSession {
                mode: GameMode::Single,
                name: "registry test".to_string(),
                password: None,
                is_private: false,
                players_max: 0,
                creator_id: None,
            },
        )
        .await
        .unwrap();
        let registry = ControllerRegistry::new(db, Arc::new(SequenceSource::new()));
        (registry, session)
    }

    #[tokio::test]
    async fn test_acquire_shares_one_controller() {
        let (registry, session) = setup().await;

        let first = registry.acquire(session.session_key).await.unwrap();
        let second = registry.acquire(session.session_key).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains(session.session_key).await);
    }

    #[tokio::test]
    async fn test_release_drops_at_zero() {
        let (registry, session) = setup().await;

        registry.acquire(session.session_key).await.unwrap();
        registry.acquire(session.session_key).await.unwrap();

        registry.release(session.session_key).await;
        assert!(registry.contains(session.session_key).await);

        registry.release(session.session_key).await;
        assert!(!registry.contains(session.session_key).await);
    }

    #[tokio::test]
    async fn test_acquire_propagates_construction_errors() {
        let (registry, _session) = setup().await;

        let err = registry.acquire(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ControllerError::NotFound));
        assert!(!registry.contains(uuid::Uuid::new_v4()).await);
    }
}
