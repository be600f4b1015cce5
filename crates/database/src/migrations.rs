//! Schema creation and destructive versioning
//!
//! The cache holds nothing that cannot be fetched again, so an outdated schema
//! is dropped and recreated rather than migrated in place.

use crate::DbPool;
use reparto_core::AppError;

/// Current database schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 2;

/// Cache tables, in creation order (dropped in reverse)
pub const TABLES: [&str; 7] = [
    "products",
    "users",
    "orders",
    "order_lines",
    "routes",
    "route_orders",
    "location_pings",
];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    description TEXT    NOT NULL DEFAULT '',
    price       TEXT    NOT NULL,
    stock       INTEGER NOT NULL CHECK (stock >= 0),
    category    TEXT    NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

CREATE TABLE IF NOT EXISTS users (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL,
    email TEXT NOT NULL,
    role  TEXT NOT NULL,
    phone TEXT
);

CREATE TABLE IF NOT EXISTS orders (
    id           INTEGER PRIMARY KEY,
    customer_id  INTEGER NOT NULL,
    courier_id   INTEGER,
    status       TEXT    NOT NULL,
    created_at   INTEGER NOT NULL,
    delivered_at INTEGER,
    street       TEXT    NOT NULL,
    city         TEXT    NOT NULL,
    postal_code  TEXT    NOT NULL,
    latitude     REAL,
    longitude    REAL,
    notes        TEXT
);
CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
CREATE INDEX IF NOT EXISTS idx_orders_courier ON orders(courier_id);

CREATE TABLE IF NOT EXISTS order_lines (
    id         INTEGER PRIMARY KEY,
    order_id   INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    product_id INTEGER NOT NULL,
    quantity   INTEGER NOT NULL CHECK (quantity > 0),
    subtotal   TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_order_lines_order ON order_lines(order_id);

CREATE TABLE IF NOT EXISTS routes (
    id                     INTEGER PRIMARY KEY,
    courier_id             INTEGER NOT NULL,
    scheduled_date         INTEGER NOT NULL,
    estimated_distance_km  REAL    NOT NULL DEFAULT 0,
    estimated_duration_min INTEGER NOT NULL DEFAULT 0,
    status                 TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_routes_courier ON routes(courier_id);

CREATE TABLE IF NOT EXISTS route_orders (
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    order_id INTEGER NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (route_id, order_id)
);

CREATE TABLE IF NOT EXISTS location_pings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    courier_id  INTEGER NOT NULL,
    latitude    REAL    NOT NULL,
    longitude   REAL    NOT NULL,
    recorded_at INTEGER NOT NULL,
    synced      INTEGER NOT NULL DEFAULT 0,
    sending     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_location_pings_pending ON location_pings(synced, recorded_at);
"#;

/// Returns the schema version this build expects
pub fn current_version() -> i64 {
    SCHEMA_VERSION
}

/// Reads the version recorded in the database file
pub async fn stored_version(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to read schema version", e))
}

/// Brings the schema to `SCHEMA_VERSION`
///
/// A fresh database gets the schema created. A database stamped with any other
/// version loses every cache table before the schema is recreated. Returns
/// `true` when existing data was discarded.
pub async fn run_migrations(pool: &DbPool) -> Result<bool, AppError> {
    let stored = stored_version(pool).await?;
    if stored == SCHEMA_VERSION {
        // Idempotent: picks up tables a crash may have left missing
        create_schema(pool).await?;
        return Ok(false);
    }

    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| AppError::database("Failed to acquire connection", e))?;

    let discarded = stored != 0 || has_cache_tables(&mut *conn).await?;
    if discarded {
        log::warn!(
            "Cache schema version {} does not match {}, rebuilding",
            stored,
            SCHEMA_VERSION
        );

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database("Failed to disable foreign keys", e))?;

        for table in TABLES.iter().rev() {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&mut *conn)
                .await
                .map_err(|e| migration_failed(&format!("dropping {}", table), e))?;
        }

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database("Failed to enable foreign keys", e))?;
    }

    sqlx::raw_sql(SCHEMA)
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("creating schema", e))?;

    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to stamp schema version", e))?;

    log::info!("Cache schema at version {}", SCHEMA_VERSION);
    Ok(discarded)
}

async fn create_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| migration_failed("creating schema", e))?;
    Ok(())
}

async fn has_cache_tables(conn: &mut sqlx::SqliteConnection) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'products'",
    )
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to inspect schema", e))?;
    Ok(count > 0)
}

fn migration_failed(step: &str, e: sqlx::Error) -> AppError {
    AppError::MigrationFailed {
        version: SCHEMA_VERSION.to_string(),
        reason: format!("{}: {}", step, e),
    }
}

/// Verifies database integrity
pub async fn verify_integrity(pool: &DbPool) -> Result<(), AppError> {
    let result: String = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to check integrity", e))?;

    if result != "ok" {
        return Err(AppError::database(
            format!("Database integrity check failed: {}", result),
            std::io::Error::other("Integrity check failed"),
        ));
    }

    Ok(())
}

/// Optimizes the database
pub async fn optimize(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query("PRAGMA optimize")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to optimize database", e))?;

    Ok(())
}
