//! Order and order line cache operations

use super::{parse_decimal, to_u32};
use crate::DbPool;
use reparto_core::{
    AppError, Coordinates, DeliveryAddress, Order, OrderId, OrderLine, OrderStatus, Timestamp,
    UserId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection};

const SELECT_ORDER: &str = r#"
    SELECT id, customer_id, courier_id, status, created_at, delivered_at,
           street, city, postal_code, latitude, longitude, notes
    FROM orders
"#;

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> Result<(), AppError> {
    let coordinates = order.address.coordinates;

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO orders (
            id, customer_id, courier_id, status, created_at, delivered_at,
            street, city, postal_code, latitude, longitude, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.courier_id)
    .bind(order.status.as_wire_str())
    .bind(order.created_at.as_millis())
    .bind(order.delivered_at.map(|t| t.as_millis()))
    .bind(&order.address.street)
    .bind(&order.address.city)
    .bind(&order.address.postal_code)
    .bind(coordinates.map(|c| c.latitude))
    .bind(coordinates.map(|c| c.longitude))
    .bind(&order.notes)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database("Failed to store order", e))?;

    // Lines follow the header: whatever was cached before is replaced
    sqlx::query("DELETE FROM order_lines WHERE order_id = ?")
        .bind(order.id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database("Failed to clear order lines", e))?;

    for line in &order.lines {
        insert_line(&mut *conn, line).await?;
    }

    Ok(())
}

async fn insert_line<'e, E>(executor: E, line: &OrderLine) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO order_lines (id, order_id, product_id, quantity, subtotal)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(line.id)
    .bind(line.order_id)
    .bind(line.product_id)
    .bind(line.quantity as i64)
    .bind(line.subtotal.to_string())
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to store order line", e))?;

    Ok(())
}

/// Inserts or replaces an order together with its lines
pub async fn upsert_order(pool: &DbPool, order: &Order) -> Result<(), AppError> {
    upsert_orders(pool, std::slice::from_ref(order)).await
}

/// Inserts or replaces a batch of orders in one transaction
pub async fn upsert_orders(pool: &DbPool, orders: &[Order]) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    for order in orders {
        insert_order(&mut *tx, order).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit orders", e))?;

    Ok(())
}

/// Inserts or replaces a single order line; the order must be cached
pub async fn upsert_order_line(pool: &DbPool, line: &OrderLine) -> Result<(), AppError> {
    insert_line(pool, line).await
}

/// Gets an order with its lines
pub async fn get_order(pool: &DbPool, id: OrderId) -> Result<Order, AppError> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ORDER))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch order", e))?
        .ok_or_else(|| AppError::cache_miss("Order", id))?;

    let mut order = row_to_order(row)?;
    order.lines = lines_for_order(pool, id).await?;
    Ok(order)
}

/// Lists every cached order, newest first
pub async fn list_orders(pool: &DbPool) -> Result<Vec<Order>, AppError> {
    let rows = sqlx::query(&format!("{} ORDER BY created_at DESC, id DESC", SELECT_ORDER))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list orders", e))?;

    with_lines(pool, rows).await
}

/// Lists cached orders placed by a customer, newest first
pub async fn orders_for_customer(
    pool: &DbPool,
    customer_id: UserId,
) -> Result<Vec<Order>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE customer_id = ? ORDER BY created_at DESC, id DESC",
        SELECT_ORDER
    ))
    .bind(customer_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list customer orders", e))?;

    with_lines(pool, rows).await
}

/// Lists cached orders assigned to a courier, newest first
pub async fn orders_for_courier(pool: &DbPool, courier_id: UserId) -> Result<Vec<Order>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE courier_id = ? ORDER BY created_at DESC, id DESC",
        SELECT_ORDER
    ))
    .bind(courier_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list courier orders", e))?;

    with_lines(pool, rows).await
}

/// Lines of one order in id order
pub async fn lines_for_order(pool: &DbPool, order_id: OrderId) -> Result<Vec<OrderLine>, AppError> {
    let rows = sqlx::query(
        "SELECT id, order_id, product_id, quantity, subtotal FROM order_lines WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch order lines", e))?;

    rows.into_iter().map(row_to_line).collect()
}

/// Updates the cached status; stamps `delivered_at` when the order is delivered
pub async fn set_order_status(
    pool: &DbPool,
    id: OrderId,
    status: OrderStatus,
) -> Result<bool, AppError> {
    let delivered_at = (status == OrderStatus::Delivered).then(|| Timestamp::now().as_millis());

    let result = sqlx::query(
        "UPDATE orders SET status = ?, delivered_at = COALESCE(?, delivered_at) WHERE id = ?",
    )
    .bind(status.as_wire_str())
    .bind(delivered_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update order status", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes an order and, by cascade, its lines
pub async fn delete_order(pool: &DbPool, id: OrderId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete order", e))?;

    Ok(result.rows_affected() > 0)
}

/// Number of cached orders
pub async fn count_orders(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count orders", e))
}

/// Number of cached order lines
pub async fn count_order_lines(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM order_lines")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count order lines", e))
}

async fn with_lines(pool: &DbPool, rows: Vec<SqliteRow>) -> Result<Vec<Order>, AppError> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let mut order = row_to_order(row)?;
        order.lines = lines_for_order(pool, order.id).await?;
        orders.push(order);
    }
    Ok(orders)
}

pub(crate) fn row_to_order(row: SqliteRow) -> Result<Order, AppError> {
    let status: String = row
        .try_get("status")
        .map_err(|e| AppError::database("Missing status", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let delivered_at: Option<i64> = row.try_get("delivered_at").ok().flatten();
    let latitude: Option<f64> = row.try_get("latitude").ok().flatten();
    let longitude: Option<f64> = row.try_get("longitude").ok().flatten();

    let id: OrderId = row
        .try_get("id")
        .map_err(|e| AppError::database("Missing order id", e))?;

    let status = OrderStatus::parse(&status).unwrap_or_else(|| {
        log::warn!("Order {} has unknown status '{}', treating as pending", id, status);
        OrderStatus::Pending
    });

    let address = DeliveryAddress {
        street: row
            .try_get("street")
            .map_err(|e| AppError::database("Missing street", e))?,
        city: row
            .try_get("city")
            .map_err(|e| AppError::database("Missing city", e))?,
        postal_code: row
            .try_get("postal_code")
            .map_err(|e| AppError::database("Missing postal code", e))?,
        coordinates: latitude
            .zip(longitude)
            .map(|(lat, lon)| Coordinates::new(lat, lon)),
    };

    Ok(Order {
        id,
        customer_id: row
            .try_get("customer_id")
            .map_err(|e| AppError::database("Missing customer id", e))?,
        courier_id: row.try_get("courier_id").ok().flatten(),
        status,
        created_at: Timestamp::from_millis(created_at),
        delivered_at: delivered_at.map(Timestamp::from_millis),
        address,
        notes: row.try_get("notes").ok().flatten(),
        lines: Vec::new(),
    })
}

fn row_to_line(row: SqliteRow) -> Result<OrderLine, AppError> {
    let quantity: i64 = row
        .try_get("quantity")
        .map_err(|e| AppError::database("Missing quantity", e))?;
    let subtotal: String = row
        .try_get("subtotal")
        .map_err(|e| AppError::database("Missing subtotal", e))?;

    Ok(OrderLine {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database("Missing line id", e))?,
        order_id: row
            .try_get("order_id")
            .map_err(|e| AppError::database("Missing order id", e))?,
        product_id: row
            .try_get("product_id")
            .map_err(|e| AppError::database("Missing product id", e))?,
        quantity: to_u32(quantity),
        subtotal: parse_decimal(&subtotal, "order_lines.subtotal")?,
    })
}
