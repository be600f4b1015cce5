//! Courier location ping queue
//!
//! Pings are written unsynced, claimed by whoever uploads them, marked synced
//! once the server accepted them and pruned after the retention window. A
//! claimed ping is never handed to a second uploader.

use crate::DbPool;
use reparto_core::{AppError, LocationPing, Timestamp, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const SELECT_PING: &str = r#"
    SELECT id, courier_id, latitude, longitude, recorded_at, synced
    FROM location_pings
"#;

/// Stores a ping and returns its local id
pub async fn insert_ping(pool: &DbPool, ping: &LocationPing) -> Result<i64, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO location_pings (courier_id, latitude, longitude, recorded_at, synced)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(ping.courier_id)
    .bind(ping.latitude)
    .bind(ping.longitude)
    .bind(ping.recorded_at.as_millis())
    .bind(ping.synced as i64)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to store location ping", e))?;

    Ok(result.last_insert_rowid())
}

/// Unsynced pings, oldest first
pub async fn pending_pings(pool: &DbPool) -> Result<Vec<LocationPing>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE synced = 0 ORDER BY recorded_at, id",
        SELECT_PING
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch pending pings", e))?;

    rows.into_iter().map(row_to_ping).collect()
}

/// Most recent pings of one courier, newest first
pub async fn recent_pings(
    pool: &DbPool,
    courier_id: UserId,
    limit: u32,
) -> Result<Vec<LocationPing>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE courier_id = ? ORDER BY recorded_at DESC, id DESC LIMIT ?",
        SELECT_PING
    ))
    .bind(courier_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch recent pings", e))?;

    rows.into_iter().map(row_to_ping).collect()
}

/// Claims an unsynced ping for upload
///
/// Returns `false` when the ping is already synced or another uploader holds it.
pub async fn claim_ping(pool: &DbPool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE location_pings SET sending = 1 WHERE id = ? AND synced = 0 AND sending = 0",
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to claim ping", e))?;

    Ok(result.rows_affected() == 1)
}

/// Gives a claimed ping back to the queue after a failed upload
pub async fn release_ping(pool: &DbPool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE location_pings SET sending = 0 WHERE id = ? AND synced = 0")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to release ping", e))?;

    Ok(result.rows_affected() > 0)
}

/// Releases every claim; uploads interrupted by a crash are retried
pub async fn release_all_claims(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE location_pings SET sending = 0 WHERE sending = 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to release ping claims", e))?;

    Ok(result.rows_affected())
}

/// Marks one ping as accepted by the server
pub async fn mark_ping_synced(pool: &DbPool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE location_pings SET synced = 1, sending = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to mark ping synced", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes synced pings recorded before `cutoff`; unsynced pings are kept
pub async fn prune_synced_before(pool: &DbPool, cutoff: Timestamp) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM location_pings WHERE synced = 1 AND recorded_at < ?")
        .bind(cutoff.as_millis())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to prune pings", e))?;

    Ok(result.rows_affected())
}

/// Number of stored pings
pub async fn count_pings(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM location_pings")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count pings", e))
}

/// Number of pings still waiting for the server
pub async fn count_pending_pings(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM location_pings WHERE synced = 0")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count pending pings", e))
}

fn row_to_ping(row: SqliteRow) -> Result<LocationPing, AppError> {
    let recorded_at: i64 = row
        .try_get("recorded_at")
        .map_err(|e| AppError::database("Missing recorded_at", e))?;
    let synced: i64 = row
        .try_get("synced")
        .map_err(|e| AppError::database("Missing synced flag", e))?;

    Ok(LocationPing {
        id: Some(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing ping id", e))?,
        ),
        courier_id: row
            .try_get("courier_id")
            .map_err(|e| AppError::database("Missing courier id", e))?,
        latitude: row
            .try_get("latitude")
            .map_err(|e| AppError::database("Missing latitude", e))?,
        longitude: row
            .try_get("longitude")
            .map_err(|e| AppError::database("Missing longitude", e))?,
        recorded_at: Timestamp::from_millis(recorded_at),
        synced: synced != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use reparto_core::Coordinates;

    async fn setup() -> Result<DbPool, AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;
        Ok(pool)
    }

    fn ping(at: i64) -> LocationPing {
        LocationPing::new(7, Coordinates::new(40.41, -3.70)).at(Timestamp::from_millis(at))
    }

    #[tokio::test]
    async fn test_pending_pings_oldest_first() {
        let pool = setup().await.expect("Failed to setup database");
        insert_ping(&pool, &ping(3_000)).await.unwrap();
        insert_ping(&pool, &ping(1_000)).await.unwrap();
        insert_ping(&pool, &ping(2_000)).await.unwrap();

        let pending = pending_pings(&pool).await.unwrap();
        let times: Vec<i64> = pending.iter().map(|p| p.recorded_at.as_millis()).collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
        assert!(pending.iter().all(|p| p.id.is_some() && !p.synced));
    }

    #[tokio::test]
    async fn test_mark_synced_removes_from_queue() {
        let pool = setup().await.expect("Failed to setup database");
        let first = insert_ping(&pool, &ping(1_000)).await.unwrap();
        insert_ping(&pool, &ping(2_000)).await.unwrap();

        assert!(mark_ping_synced(&pool, first).await.unwrap());
        assert_eq!(count_pending_pings(&pool).await.unwrap(), 1);
        assert_eq!(count_pings(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_released() {
        let pool = setup().await.expect("Failed to setup database");
        let id = insert_ping(&pool, &ping(1_000)).await.unwrap();

        assert!(claim_ping(&pool, id).await.unwrap());
        assert!(!claim_ping(&pool, id).await.unwrap());
        assert_eq!(count_pending_pings(&pool).await.unwrap(), 1);

        assert!(release_ping(&pool, id).await.unwrap());
        assert!(claim_ping(&pool, id).await.unwrap());

        mark_ping_synced(&pool, id).await.unwrap();
        assert!(!claim_ping(&pool, id).await.unwrap());
        assert!(!release_ping(&pool, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_all_claims() {
        let pool = setup().await.expect("Failed to setup database");
        let first = insert_ping(&pool, &ping(1_000)).await.unwrap();
        let second = insert_ping(&pool, &ping(2_000)).await.unwrap();
        claim_ping(&pool, first).await.unwrap();
        claim_ping(&pool, second).await.unwrap();

        assert_eq!(release_all_claims(&pool).await.unwrap(), 2);
        assert!(claim_ping(&pool, first).await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_keeps_unsynced_and_recent() {
        let pool = setup().await.expect("Failed to setup database");
        let old_synced = insert_ping(&pool, &ping(1_000)).await.unwrap();
        insert_ping(&pool, &ping(1_500)).await.unwrap();
        let recent_synced = insert_ping(&pool, &ping(9_000)).await.unwrap();
        mark_ping_synced(&pool, old_synced).await.unwrap();
        mark_ping_synced(&pool, recent_synced).await.unwrap();

        let pruned = prune_synced_before(&pool, Timestamp::from_millis(5_000))
            .await
            .unwrap();

        assert_eq!(pruned, 1);
        assert_eq!(count_pings(&pool).await.unwrap(), 2);
        assert_eq!(count_pending_pings(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_pings_limit() {
        let pool = setup().await.expect("Failed to setup database");
        for at in 1..=5 {
            insert_ping(&pool, &ping(at * 1_000)).await.unwrap();
        }

        let recent = recent_pings(&pool, 7, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].recorded_at.as_millis(), 5_000);
    }
}
