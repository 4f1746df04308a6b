use self::migration::Migrator;
use log::info;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use std::io;
use std::path::Path;
use tokio::fs::{create_dir_all, File};

pub mod entities;
pub mod migration;

pub type DbResult<T> = Result<T, sea_orm::DbErr>;

/// Connects to the SQLite database at the provided file path, creating
/// the file if it doesn't exist, and runs any pending migrations
pub async fn init(database_file: &str) -> io::Result<DatabaseConnection> {
    info!("Connecting to database..");

    let file_path = Path::new(database_file);
    if let Some(parent) = file_path.parent() {
        if !parent.exists() {
            create_dir_all(parent).await?;
        }
    }

    if !file_path.exists() {
        File::create(file_path).await?;
    }

    let con_str = format!("sqlite:{database_file}");
    let connection = sea_orm::Database::connect(&con_str).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to create database connection: {err:?}"),
        )
    })?;

    info!("Running migrations...");

    Migrator::up(&connection, None).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to run database migrations: {err:?}"),
        )
    })?;

    Ok(connection)
}

/// Connects to an in-memory database with migrations applied, used
/// by tests across the crate
#[cfg(test)]
pub async fn connect_test() -> DatabaseConnection {
    let connection = sea_orm::Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&connection, None)
        .await
        .expect("Failed to run migrations");
    connection
}
