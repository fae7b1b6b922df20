use escrow_engine::{EscrowDatabase, SqliteDatabase};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping stale test database");
    }
    Sqlite::create_database(url).await.expect("Error creating test database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error connecting to test database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database {url} is ready");
    db
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/escrow_engine_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await.expect("Error closing database");
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Error dropping test database {url}: {e}");
    }
}
