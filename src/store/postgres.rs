//! Postgres store.
//!
//! Aggregates live in JSONB `doc` columns. Stock and wallet balance are
//! plain columns changed with conditional `UPDATE … RETURNING`, and order
//! saves compare the `version` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CatalogStore, CheckoutStore, CouponStore, OrderStore, ShopperStore, StoreError, StoreResult, WalletStore,
};
use crate::domain::aggregates::{
    Cart, CheckoutSession, Coupon, Order, Product, ShippingAddress, TransactionKind, Variant, Wallet,
    WalletTransaction,
};
use crate::domain::value_objects::CouponCode;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn exists(&self, sql: &str, id: Uuid) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(sql).bind(id).fetch_one(&self.pool).await?)
    }
}

fn unique_violation(e: sqlx::Error, what: &'static str) -> StoreError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        other => StoreError::Database(other),
    }
}

fn with_version((Json(mut order), version): (Json<Order>, i64)) -> Order {
    order.set_version(version);
    order
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, user_id, status, coupon_code, coupon_applied, created_at, version, doc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(order.status().as_str())
        .bind(order.coupon_code().map(CouponCode::as_str))
        .bind(order.coupon_applied())
        .bind(order.created_at())
        .bind(order.version())
        .bind(Json(order))
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "order"))?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<(Json<Order>, i64)> =
            sqlx::query_as("SELECT doc, version FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(with_version))
    }

    async fn save_order(&self, order: &Order) -> StoreResult<i64> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, coupon_applied = $4, doc = $5, version = version + 1
             WHERE id = $1 AND version = $2",
        )
        .bind(order.id())
        .bind(order.version())
        .bind(order.status().as_str())
        .bind(order.coupon_applied())
        .bind(Json(order))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.exists("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)", order.id()).await? {
                Err(StoreError::VersionConflict(order.id()))
            } else {
                Err(StoreError::NotFound("order"))
            };
        }
        Ok(order.version() + 1)
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows: Vec<(Json<Order>, i64)> =
            sqlx::query_as("SELECT doc, version FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(with_version).collect())
    }

    async fn list_orders(&self, limit: u32, offset: u32) -> StoreResult<Vec<Order>> {
        let rows: Vec<(Json<Order>, i64)> =
            sqlx::query_as("SELECT doc, version FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(with_version).collect())
    }

    async fn coupon_used(&self, user_id: Uuid, code: &CouponCode) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM orders
                WHERE user_id = $1 AND coupon_code = $2 AND coupon_applied AND status <> 'Cancelled'
            )",
        )
        .bind(user_id)
        .bind(code.as_str())
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<Json<Product>> = sqlx::query_scalar("SELECT doc FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(p)| p))
    }

    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>> {
        let row: Option<(Json<Variant>, i32)> =
            sqlx::query_as("SELECT doc, stock FROM variants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(mut v), stock)| {
            v.stock = stock;
            v
        }))
    }

    async fn adjust_stock(&self, variant_id: Uuid, delta: i32) -> StoreResult<i32> {
        let stock: Option<i32> = sqlx::query_scalar(
            "UPDATE variants SET stock = stock + $2 WHERE id = $1 AND stock + $2 >= 0 RETURNING stock",
        )
        .bind(variant_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match stock {
            Some(stock) => Ok(stock),
            None if self.exists("SELECT EXISTS (SELECT 1 FROM variants WHERE id = $1)", variant_id).await? => {
                Err(StoreError::InsufficientStock(variant_id))
            }
            None => Err(StoreError::NotFound("variant")),
        }
    }
}

fn parse_kind(kind: &str) -> StoreResult<TransactionKind> {
    match kind {
        "credit" => Ok(TransactionKind::Credit),
        "debit" => Ok(TransactionKind::Debit),
        other => Err(StoreError::Rejected(format!("unknown wallet transaction kind '{other}'"))),
    }
}

#[async_trait]
impl WalletStore for PgStore {
    async fn wallet(&self, user_id: Uuid) -> StoreResult<Wallet> {
        let rows: Vec<(String, Decimal, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT kind, amount, reason, created_at FROM wallet_transactions WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let transactions = rows
            .into_iter()
            .map(|(kind, amount, reason, created_at)| {
                Ok(WalletTransaction { kind: parse_kind(&kind)?, amount, reason, created_at })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Wallet::from_transactions(user_id, transactions))
    }

    async fn apply_transaction(&self, user_id: Uuid, tx: &WalletTransaction) -> StoreResult<Decimal> {
        if tx.amount <= Decimal::ZERO {
            return Err(StoreError::Rejected(format!("wallet amount must be positive, got {}", tx.amount)));
        }
        let mut db = self.pool.begin().await?;

        sqlx::query("INSERT INTO wallets (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *db)
            .await?;

        let balance: Option<Decimal> = sqlx::query_scalar(
            "UPDATE wallets SET balance = balance + $2 WHERE user_id = $1 AND balance + $2 >= 0 RETURNING balance",
        )
        .bind(user_id)
        .bind(tx.signed_amount())
        .fetch_optional(&mut *db)
        .await?;
        // Dropping `db` without commit rolls the lazy wallet insert back too.
        let Some(balance) = balance else {
            return Err(StoreError::InsufficientBalance);
        };

        sqlx::query(
            "INSERT INTO wallet_transactions (user_id, kind, amount, reason, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(&tx.reason)
        .bind(tx.created_at)
        .execute(&mut *db)
        .await?;

        db.commit().await?;
        Ok(balance)
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn coupon(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        let row: Option<Json<Coupon>> = sqlx::query_scalar("SELECT doc FROM coupons WHERE code = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(c)| c))
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        sqlx::query("INSERT INTO coupons (code, is_active, doc) VALUES ($1, $2, $3)")
            .bind(coupon.code.as_str())
            .bind(coupon.is_active)
            .bind(Json(coupon))
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "coupon"))?;
        Ok(())
    }

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let rows: Vec<Json<Coupon>> = sqlx::query_scalar("SELECT doc FROM coupons ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn set_coupon_active(&self, code: &CouponCode, active: bool) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE coupons SET is_active = $2, doc = jsonb_set(doc, '{isActive}', to_jsonb($2::boolean))
             WHERE code = $1",
        )
        .bind(code.as_str())
        .bind(active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("coupon"));
        }
        Ok(())
    }
}

#[async_trait]
impl ShopperStore for PgStore {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Cart> {
        let row: Option<Json<Cart>> = sqlx::query_scalar("SELECT doc FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map_or_else(|| Cart::new(user_id), |Json(c)| c))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO carts (user_id, doc) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(cart.user_id())
        .bind(Json(cart))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        self.save_cart(&Cart::new(user_id)).await
    }

    async fn address(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<ShippingAddress>> {
        let row: Option<Json<ShippingAddress>> =
            sqlx::query_scalar("SELECT doc FROM addresses WHERE id = $1 AND user_id = $2")
                .bind(address_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(a)| a))
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    async fn put_checkout(&self, session: &CheckoutSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO checkout_sessions (token, user_id, expires_at, doc) VALUES ($1, $2, $3, $4)
             ON CONFLICT (token) DO UPDATE SET doc = EXCLUDED.doc, expires_at = EXCLUDED.expires_at",
        )
        .bind(session.token)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(Json(session))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn checkout(&self, token: Uuid) -> StoreResult<Option<CheckoutSession>> {
        let row: Option<Json<CheckoutSession>> =
            sqlx::query_scalar("SELECT doc FROM checkout_sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(s)| s))
    }

    async fn delete_checkout(&self, token: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM checkout_sessions WHERE token = $1 OR expires_at < NOW()")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
