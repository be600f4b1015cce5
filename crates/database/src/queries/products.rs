//! Product cache operations

use super::{parse_decimal, to_u32};
use crate::DbPool;
use reparto_core::{AppError, Product, ProductId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, description, price, stock, category, active
    FROM products
"#;

async fn insert_product<'e, E>(executor: E, product: &Product) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO products (id, name, description, price, stock, category, active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .bind(product.stock as i64)
    .bind(&product.category)
    .bind(product.active as i64)
    .execute(executor)
    .await
    .map_err(|e| AppError::database("Failed to store product", e))?;

    Ok(())
}

/// Inserts or replaces a single product
pub async fn upsert_product(pool: &DbPool, product: &Product) -> Result<(), AppError> {
    insert_product(pool, product).await
}

/// Inserts or replaces a batch of products in one transaction
pub async fn upsert_products(pool: &DbPool, products: &[Product]) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    for product in products {
        insert_product(&mut *tx, product).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit products", e))?;

    Ok(())
}

/// Replaces the whole product table with `products`
///
/// Readers see either the previous catalog or the new one, never a mix.
pub async fn replace_products(pool: &DbPool, products: &[Product]) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    sqlx::query("DELETE FROM products")
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database("Failed to clear products", e))?;

    for product in products {
        insert_product(&mut *tx, product).await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit products", e))?;

    Ok(())
}

/// Gets a product by ID
pub async fn get_product(pool: &DbPool, id: ProductId) -> Result<Product, AppError> {
    find_product(pool, id)
        .await?
        .ok_or_else(|| AppError::cache_miss("Product", id))
}

/// Gets a product by ID, `None` when not cached
pub async fn find_product(pool: &DbPool, id: ProductId) -> Result<Option<Product>, AppError> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_PRODUCT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch product", e))?;

    row.map(row_to_product).transpose()
}

/// Lists every cached product ordered by name
pub async fn list_products(pool: &DbPool) -> Result<Vec<Product>, AppError> {
    let rows = sqlx::query(&format!("{} ORDER BY name COLLATE NOCASE, id", SELECT_PRODUCT))
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list products", e))?;

    rows.into_iter().map(row_to_product).collect()
}

/// Lists cached products of one category (case-insensitive)
pub async fn list_products_by_category(
    pool: &DbPool,
    category: &str,
) -> Result<Vec<Product>, AppError> {
    let rows = sqlx::query(&format!(
        "{} WHERE category = ? COLLATE NOCASE ORDER BY name COLLATE NOCASE, id",
        SELECT_PRODUCT
    ))
    .bind(category)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list products by category", e))?;

    rows.into_iter().map(row_to_product).collect()
}

/// Deletes a product; returns whether a row existed
pub async fn delete_product(pool: &DbPool, id: ProductId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete product", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes every product
pub async fn delete_all_products(pool: &DbPool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM products")
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to clear products", e))?;

    Ok(result.rows_affected())
}

/// Number of cached products
pub async fn count_products(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count products", e))
}

fn row_to_product(row: SqliteRow) -> Result<Product, AppError> {
    let price: String = row
        .try_get("price")
        .map_err(|e| AppError::database("Missing price", e))?;
    let stock: i64 = row
        .try_get("stock")
        .map_err(|e| AppError::database("Missing stock", e))?;
    let active: i64 = row
        .try_get("active")
        .map_err(|e| AppError::database("Missing active flag", e))?;

    Ok(Product {
        id: row
            .try_get("id")
            .map_err(|e| AppError::database("Missing product id", e))?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing name", e))?,
        description: row.try_get("description").unwrap_or_default(),
        price: parse_decimal(&price, "products.price")?,
        stock: to_u32(stock),
        category: row
            .try_get("category")
            .map_err(|e| AppError::database("Missing category", e))?,
        active: active != 0,
    })
}
