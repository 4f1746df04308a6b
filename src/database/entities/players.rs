//! Durable player profiles. A row exists for every participant that ever
//! joined a session: registered accounts carry a username and password
//! hash, anonymous participants only a displayed name.

use crate::database::DbResult;
use crate::utils::types::PlayerId;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "players")]
pub struct Model {
    /// Unique Identifier for the player
    #[sea_orm(primary_key)]
    pub id: PlayerId,
    /// Login name for registered accounts, None for anonymous players
    pub username: Option<String>,
    /// Name shown to other players in sessions
    pub display_name: String,
    /// Hashed password which is omitted from serialization
    #[serde(skip)]
    pub password: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::session_results::Entity")]
    Results,
    #[sea_orm(has_many = "super::player_stats::Entity")]
    Stats,
}

impl Related<super::session_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl Related<super::player_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates a registered player account with the provided credentials
    /// along with its empty stats rows
    pub async fn create_registered(
        db: &DatabaseConnection,
        username: String,
        password: String,
    ) -> DbResult<Self> {
        let model = ActiveModel {
            username: Set(Some(username.clone())),
            display_name: Set(username),
            password: Set(Some(password)),
            ..Default::default()
        }
        .insert(db)
        .await?;
        super::player_stats::Model::create_for_player(db, model.id).await?;
        Ok(model)
    }

    /// Creates a player row for an anonymous participant known only by
    /// the displayed name they joined with
    pub async fn create_anonymous(db: &DatabaseConnection, display_name: String) -> DbResult<Self> {
        let model = ActiveModel {
            display_name: Set(display_name),
            ..Default::default()
        }
        .insert(db)
        .await?;
        super::player_stats::Model::create_for_player(db, model.id).await?;
        Ok(model)
    }

    /// Attempts to find a player with the provided ID
    pub async fn by_id(db: &DatabaseConnection, id: PlayerId) -> DbResult<Option<Self>> {
        Entity::find_by_id(id).one(db).await
    }

    /// Attempts to find a registered player by username
    pub async fn by_username(db: &DatabaseConnection, username: &str) -> DbResult<Option<Self>> {
        Entity::find()
            .filter(Column::Username.eq(username))
            .one(db)
            .await
    }
}
