//! Game session rows. A session is the durable unit of play: it carries
//! the mode, optional password, player caps and the lifecycle timestamps
//! the controller stamps while the game advances.

use crate::database::DbResult;
use crate::utils::hashing::{hash_password, verify_password};
use crate::utils::types::{PlayerId, SessionId, SessionKey};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::IntoActiveModel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent game mode. Stored as a one-letter code, appears on the
/// wire only as its lowercase label
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(1))")]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[sea_orm(string_value = "s")]
    Single,
    #[sea_orm(string_value = "i")]
    Ironwall,
    #[sea_orm(string_value = "t")]
    Tugofwar,
    #[sea_orm(string_value = "e")]
    Endless,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [
        GameMode::Single,
        GameMode::Ironwall,
        GameMode::Tugofwar,
        GameMode::Endless,
    ];

    /// The label used on the wire for this mode
    pub fn label(&self) -> &'static str {
        match self {
            GameMode::Single => "single",
            GameMode::Ironwall => "ironwall",
            GameMode::Tugofwar => "tugofwar",
            GameMode::Endless => "endless",
        }
    }

    /// Parses a wire label back into a mode
    pub fn from_label(label: &str) -> Option<GameMode> {
        GameMode::ALL.into_iter().find(|mode| mode.label() == label)
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "game_sessions")]
pub struct Model {
    /// Unique Identifier for the session row
    #[sea_orm(primary_key)]
    pub id: SessionId,
    /// Mode the session is played in
    pub mode: GameMode,
    /// Name shown in the session list
    pub name: String,
    /// Hashed password for private sessions, omitted from serialization
    #[serde(skip)]
    pub password: Option<String>,
    pub is_private: bool,
    /// Maximum player count, zero meaning uncapped
    pub players_max: u32,
    /// Number of players currently in the session
    pub players_now: u32,
    /// Player that created the session, None for anonymous creators
    pub creator_id: Option<PlayerId>,
    /// Public UUID the session is addressed by
    pub session_key: SessionKey,
    pub is_finished: bool,
    pub created_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub finished_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::session_results::Entity")]
    Results,
}

impl Related<super::session_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Details required to create a new session
pub struct CreateGameSession {
    pub mode: GameMode,
    pub name: String,
    pub password: Option<String>,
    pub is_private: bool,
    pub players_max: u32,
    pub creator_id: Option<PlayerId>,
}

impl Model {
    /// Creates a new session row. Private sessions get their password
    /// hashed before storage.
    pub async fn create(db: &DatabaseConnection, create: CreateGameSession) -> DbResult<Self> {
        let password = match create.password {
            Some(value) if create.is_private => Some(
                hash_password(&value)
                    .map_err(|err| DbErr::Custom(format!("Failed to hash password: {err}")))?,
            ),
            _ => None,
        };

        ActiveModel {
            mode: Set(create.mode),
            name: Set(create.name),
            password: Set(password),
            is_private: Set(create.is_private),
            players_max: Set(create.players_max),
            players_now: Set(0),
            creator_id: Set(create.creator_id),
            session_key: Set(Uuid::new_v4()),
            is_finished: Set(false),
            created_at: Set(Utc::now()),
            started_at: Set(None),
            finished_at: Set(None),
            id: NotSet,
        }
        .insert(db)
        .await
    }

    /// Attempts to find a session by its public UUID
    pub async fn by_session_key(db: &DatabaseConnection, key: SessionKey) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(Column::SessionKey.eq(key))
            .one(db)
            .await
    }

    /// Lists every session that hasn't finished yet, for the REST surface
    pub async fn list_open(db: &DatabaseConnection) -> DbResult<Vec<Self>> {
        Entity::find()
            .filter(Column::IsFinished.eq(false))
            .all(db)
            .await
    }

    /// Stamps the session start timestamp. Only the first call has an
    /// effect, later calls return the model unchanged.
    pub async fn start(self, db: &DatabaseConnection) -> DbResult<Self> {
        if self.started_at.is_some() {
            return Ok(self);
        }
        let mut model = self.into_active_model();
        model.started_at = Set(Some(Utc::now()));
        model.update(db).await
    }

    /// Marks the session finished and stamps the finish timestamp
    pub async fn finish(self, db: &DatabaseConnection) -> DbResult<Self> {
        if self.is_finished {
            return Ok(self);
        }
        let mut model = self.into_active_model();
        model.is_finished = Set(true);
        model.finished_at = Set(Some(Utc::now()));
        model.update(db).await
    }

    /// Updates the live player count shown in the session list
    pub async fn set_players_now(
        db: &DatabaseConnection,
        id: SessionId,
        players_now: u32,
    ) -> DbResult<()> {
        Entity::update_many()
            .col_expr(Column::PlayersNow, Expr::value(players_now))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Creates the successor session for a finished game: same name,
    /// privacy, player cap and creator, with the newly voted mode
    pub async fn create_from_previous(
        &self,
        db: &DatabaseConnection,
        new_mode: GameMode,
    ) -> DbResult<Self> {
        ActiveModel {
            mode: Set(new_mode),
            name: Set(self.name.clone()),
            password: Set(self.password.clone()),
            is_private: Set(self.is_private),
            players_max: Set(self.players_max),
            players_now: Set(0),
            creator_id: Set(self.creator_id),
            session_key: Set(Uuid::new_v4()),
            is_finished: Set(false),
            created_at: Set(Utc::now()),
            started_at: Set(None),
            finished_at: Set(None),
            id: NotSet,
        }
        .insert(db)
        .await
    }

    /// Checks a join password against the stored hash. Sessions without
    /// a password accept any value.
    pub fn check_password(&self, password: Option<&str>) -> bool {
        match (&self.password, password) {
            (None, _) => true,
            (Some(hash), Some(given)) => verify_password(given, hash),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CreateGameSession, GameMode, Model};
    use crate::database::connect_test;

    fn create_details() -> CreateGameSession {
        CreateGameSession {
            mode: GameMode::Single,
            name: "lobby one".to_string(),
            password: None,
            is_private: false,
            players_max: 0,
            creator_id: None,
        }
    }

    #[test]
    fn test_mode_labels() {
        for mode in GameMode::ALL {
            assert_eq!(GameMode::from_label(mode.label()), Some(mode));
        }
        assert_eq!(GameMode::from_label("blitz"), None);
    }

    #[tokio::test]
    async fn test_start_stamp_is_set_once() {
        let db = connect_test().await;
        let session = Model::create(&db, create_details()).await.unwrap();

        let session = session.start(&db).await.unwrap();
        let first = session.started_at.expect("start timestamp missing");

        let session = session.start(&db).await.unwrap();
        assert_eq!(session.started_at, Some(first));
    }

    #[tokio::test]
    async fn test_private_session_password() {
        let db = connect_test().await;
        let mut details = create_details();
        details.password = Some("open sesame".to_string());
        details.is_private = true;
        let session = Model::create(&db, details).await.unwrap();

        assert!(session.check_password(Some("open sesame")));
        assert!(!session.check_password(Some("wrong")));
        assert!(!session.check_password(None));
    }

    #[tokio::test]
    async fn test_successor_copies_settings() {
        let db = connect_test().await;
        let mut details = create_details();
        details.players_max = 4;
        let session = Model::create(&db, details).await.unwrap();

        let next = session
            .create_from_previous(&db, GameMode::Endless)
            .await
            .unwrap();

        assert_eq!(next.name, session.name);
        assert_eq!(next.players_max, 4);
        assert_eq!(next.mode, GameMode::Endless);
        assert_ne!(next.session_key, session.session_key);
        assert!(next.started_at.is_none());
    }
}
