//! SQLite pool setup for the local cache

use reparto_core::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database connection pool
pub type DbPool = Pool<Sqlite>;

const MEMORY_PATH: &str = ":memory:";

/// Where the cache lives and how the pool talks to it
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: String,
    pub max_connections: u32,
    /// WAL lets the tracker queue pings while a sync pass reads them
    pub enable_wal: bool,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "reparto.db".to_string(),
            max_connections: 4,
            enable_wal: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Cache file at `path`
    pub fn for_file(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }

    /// Private in-memory cache
    ///
    /// Each connection to `:memory:` opens its own empty database, so the
    /// pool holds exactly one.
    pub fn in_memory() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            max_connections: 1,
            enable_wal: false,
            ..Default::default()
        }
    }

    pub fn with_wal(mut self, enable: bool) -> Self {
        self.enable_wal = enable;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }
}

/// Opens the pool, creating the file when missing
///
/// Foreign keys are always on: order lines and route stops cascade with
/// their parents.
pub async fn connect(config: DatabaseConfig) -> Result<DbPool, AppError> {
    let mut options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))
        .map_err(|e| AppError::database(format!("Invalid cache path '{}'", config.path), e))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    options = if config.is_in_memory() {
        options.journal_mode(SqliteJournalMode::Memory)
    } else if config.enable_wal {
        options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
    } else {
        options
    };

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.is_in_memory() {
        // Recycling the only connection would discard the cache
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Cannot open cache at {}", config.path), e))?;

    log::debug!(
        "Opened cache at {} ({} connection(s))",
        config.path,
        config.max_connections
    );
    Ok(pool)
}

#[cfg(test)]
pub async fn create_test_db() -> Result<DbPool, AppError> {
    connect(DatabaseConfig::in_memory()).await
}
