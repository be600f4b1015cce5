//! Route and route/order join cache operations

use super::orders::{lines_for_order, row_to_order};
use super::to_u32;
use crate::DbPool;
use reparto_core::{
    AppError, Order, OrderId, Route, RouteId, RouteOrder, RouteStatus, Timestamp, UserId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

const SELECT_ROUTE: &str = r#"
    SELECT id, courier_id, scheduled_date, estimated_distance_km, estimated_duration_min, status
    FROM routes
"#;

async fn insert_route(conn: &mut SqliteConnection, route: &Route) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO routes (
            id, courier_id, scheduled_date, estimated_distance_km, estimated_duration_min, status
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(route.id)
    .bind(route.courier_id)
    .bind(route.scheduled_date.as_millis())
    .bind(route.estimated_distance_km)
    .bind(route.estimated_duration_min as i64)
    .bind(route.status.as_wire_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to store route", e))?;

    sqlx::query("DELETE FROM route_orders WHERE route_id = ?")
        .bind(route.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to clear route orders", e))?;

    for (position, order_id) in route.order_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR REPLACE INTO route_orders (route_id, order_id, position) VALUES (?, ?, ?)",
        )
        .bind(route.id)
        .bind(order_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to store route order", e))?;
    }

    Ok(())
}

/// Inserts or replaces a route and its order associations
pub async fn upsert_route(pool: &DbPool, route: &Route) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    insert_route(&mut *tx, route).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit route", e))?;

    Ok(())
}

/// Replaces every cached route with `routes`
pub async fn replace_routes(pool: &DbPool, routes: &[Route]) -> Result<(), AppError> {
    replace_where(pool, None, routes).await
}

/// Replaces the cached routes of one courier, leaving other couriers untouched
pub async fn replace_courier_routes(
    pool: &DbPool,
    courier_id: UserId,
    routes: &[Route],
) -> Result<(), AppError> {
    replace_where(pool, Some(courier_id), routes).await
}

async fn replace_where(
    pool: &DbPool,
    courier_id: Option<UserId>,
    routes: &[Route],
) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    // route_orders rows go with their route through ON DELETE CASCADE
    let cleared = match courier_id {
        Some(courier_id) => {
            sqlx::query("DELETE FROM routes WHERE courier_id = ?")
                .bind(courier_id)
                .execute(&mut *tx)
                .await
        }
        None => sqlx::query("DELETE FROM routes").execute(&mut *tx).await,
    };
    cleared.map_err(|e| AppError::database("Failed to clear routes", e))?;

    for route in routes {
        insert_route(&mut *tx, route).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit routes", e))?;

    Ok(())
}

/// Gets a route with its order ids
pub async fn get_route(pool: &DbPool, id: RouteId) -> Result<Route, AppError> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ROUTE))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch route", e))?
        .ok_or_else(|| AppError::cache_miss("Route", id))?;

    let mut route = row_to_route(row)?;
    route.order_ids = route_order_ids(pool, id).await?;
    Ok(route)
}

/// Lists every cached route by scheduled date
pub async fn list_routes(pool: &DbPool) -> Result<Vec<Route>, AppError> {
    let rows = sqlx::query(&format!("{} ORDER BY scheduled_date, id", SELECT_ROUTE))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list routes", e))?;

    with_order_ids(pool, rows).await
}

/// Lists the cached routes of one courier by scheduled date
pub async fn routes_for_courier(pool: &DbPool, courier_id: UserId) -> Result<Vec<Route>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE courier_id = ? ORDER BY scheduled_date, id",
        SELECT_ROUTE
    ))
    .bind(courier_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list courier routes", e))?;

    with_order_ids(pool, rows).await
}

/// Join rows of one route in stop order
pub async fn route_orders(pool: &DbPool, route_id: RouteId) -> Result<Vec<RouteOrder>, AppError> {
    let rows = sqlx::query(
        "SELECT route_id, order_id, position FROM route_orders WHERE route_id = ? ORDER BY position",
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch route orders", e))?;

    rows.into_iter()
        .map(|row| {
            let position: i64 = row
                .try_get("position")
                .map_err(|e| AppError::database("Missing position", e))?;
            Ok(RouteOrder {
                route_id: row
                    .try_get("route_id")
                    .map_err(|e| AppError::database("Missing route id", e))?,
                order_id: row
                    .try_get("order_id")
                    .map_err(|e| AppError::database("Missing order id", e))?,
                position: to_u32(position),
            })
        })
        .collect()
}

/// Order ids of one route in stop order
pub async fn route_order_ids(pool: &DbPool, route_id: RouteId) -> Result<Vec<OrderId>, AppError> {
    sqlx::query_scalar("SELECT order_id FROM route_orders WHERE route_id = ? ORDER BY position")
        .bind(route_id)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch route order ids", e))
}

/// Cached orders of one route in stop order
///
/// Orders that are on the route but not cached are skipped.
pub async fn orders_in_route(pool: &DbPool, route_id: RouteId) -> Result<Vec<Order>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT o.id, o.customer_id, o.courier_id, o.status, o.created_at, o.delivered_at,
               o.street, o.city, o.postal_code, o.latitude, o.longitude, o.notes
        FROM route_orders ro
        JOIN orders o ON o.id = ro.order_id
        WHERE ro.route_id = ?
        ORDER BY ro.position
        "#,
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch route orders", e))?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let mut order = row_to_order(row)?;
        order.lines = lines_for_order(pool, order.id).await?;
        orders.push(order);
    }
    Ok(orders)
}

/// Updates the cached route status
pub async fn set_route_status(
    pool: &DbPool,
    id: RouteId,
    status: RouteStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE routes SET status = ? WHERE id = ?")
        .bind(status.as_wire_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to update route status", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes a route and its join rows
pub async fn delete_route(pool: &DbPool, id: RouteId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM routes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete route", e))?;

    Ok(result.rows_affected() > 0)
}

/// Number of cached routes
pub async fn count_routes(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM routes")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count routes", e))
}

/// Number of cached route/order associations
pub async fn count_route_orders(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM route_orders")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count route orders", e))
}

async fn with_order_ids(pool: &DbPool, rows: Vec<SqliteRow>) -> Result<Vec<Route>, AppError> {
    let mut routes = Vec::with_capacity(rows.len());
    for row in rows {
        let mut route = row_to_route(row)?;
        route.order_ids = route_order_ids(pool, route.id).await?;
        routes.push(route);
    }
    Ok(routes)
}

fn row_to_route(row: SqliteRow) -> Result<Route, AppError> {
    let id: RouteId = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing route id", e))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;
    let scheduled_date: i64 = row
        .try_get("scheduled_date")
        .map_err(|e| AppError::database("Missing scheduled date", e))?;
    let duration: i64 = row
        .try_get("estimated_duration_min")
        .map_err(|e| AppError::database("Missing estimated duration", e))?;

    let status = RouteStatus::parse(&status).unwrap_or_else(|| {
        log::warn!("Route {} has unknown status '{}', treating as pending", id, status);
        RouteStatus::Pending
    });

    Ok(Route {
        id,
        courier_id: row
            .try_get("courier_id")
            .map_err(|e| AppError::database("Missing courier id", e))?,
        scheduled_date: Timestamp::from_millis(scheduled_date),
        estimated_distance_km: row.try_get("estimated_distance_km").unwrap_or_default(),
        estimated_duration_min: to_u32(duration),
        status,
        order_ids: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use crate::queries::orders::upsert_order;
    use reparto_core::{DeliveryAddress, OrderStatus};

    async fn setup() -> Result<DbPool, AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;
        Ok(pool)
    }

    fn route(id: RouteId, courier_id: UserId, order_ids: Vec<OrderId>) -> Route {
        Route {
            id,
            courier_id,
            scheduled_date: Timestamp::from_millis(86_400_000 * id),
            estimated_distance_km: 12.5,
            estimated_duration_min: 45,
            status: RouteStatus::Pending,
            order_ids,
        }
    }

    fn order(id: OrderId) -> Order {
        Order {
            id,
            customer_id: 1,
            courier_id: Some(7),
            status: OrderStatus::Prepared,
            created_at: Timestamp::from_millis(id),
            delivered_at: None,
            address: DeliveryAddress::new("Gran Vía 2", "Madrid", "28013"),
            notes: None,
            lines: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_route_keeps_stop_order() {
        let pool = setup().await.expect("Failed to setup database");
        let original = route(1, 7, vec![30, 10, 20]);

        upsert_route(&pool, &original).await.expect("Failed to store route");

        let retrieved = get_route(&pool, 1).await.expect("Failed to get route");
        assert_eq!(retrieved, original);

        let joins = route_orders(&pool, 1).await.unwrap();
        assert_eq!(joins.len(), 3);
        assert_eq!(joins[0].order_id, 30);
        assert_eq!(joins[2].position, 2);
    }

    #[tokio::test]
    async fn test_replace_courier_routes_leaves_others() {
        let pool = setup().await.expect("Failed to setup database");
        replace_routes(&pool, &[route(1, 7, vec![1]), route(2, 8, vec![2])])
            .await
            .unwrap();

        replace_courier_routes(&pool, 7, &[route(3, 7, vec![3, 4])])
            .await
            .unwrap();

        let ids: Vec<RouteId> = list_routes(&pool).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(count_route_orders(&pool).await.unwrap(), 3);
        assert_eq!(routes_for_courier(&pool, 7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_orders_in_route_joins_cached_orders() {
        let pool = setup().await.expect("Failed to setup database");
        upsert_order(&pool, &order(10)).await.unwrap();
        upsert_order(&pool, &order(20)).await.unwrap();
        upsert_route(&pool, &route(1, 7, vec![20, 99, 10])).await.unwrap();

        let orders = orders_in_route(&pool, 1).await.unwrap();
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[tokio::test]
    async fn test_set_route_status_and_delete() {
        let pool = setup().await.expect("Failed to setup database");
        upsert_route(&pool, &route(1, 7, vec![1, 2])).await.unwrap();

        assert!(set_route_status(&pool, 1, RouteStatus::InProgress).await.unwrap());
        assert_eq!(get_route(&pool, 1).await.unwrap().status, RouteStatus::InProgress);

        assert!(delete_route(&pool, 1).await.unwrap());
        assert_eq!(count_routes(&pool).await.unwrap(), 0);
        assert_eq!(count_route_orders(&pool).await.unwrap(), 0);
    }
}
