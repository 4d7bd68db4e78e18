//! PostgreSQL-backed banner storage.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use adlimit_core::config::DatabaseConfig;
use adlimit_targeting::schema::{AclLeaf, Comparison, LogicalOp};

use crate::error::StoreError;
use crate::{BannerStore, RuleSetSource};

/// Create a PostgreSQL connection pool and run migrations.
/// Returns None if the PG_* environment is not configured.
pub async fn init_pg_pool(config: &DatabaseConfig) -> Option<PgPool> {
    if !config.is_configured() {
        warn!("PG_HOST not configured — persistence disabled");
        return None;
    }

    let connection_string = config.connection_string();
    let connect = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&connection_string);
    match connect.await {
        Ok(pool) => {
            info!("PostgreSQL connected: {}", config.host);
            match sqlx::migrate!("../../migrations").run(&pool).await {
                Ok(_) => {
                    info!("Database migrations applied successfully");
                    Some(pool)
                }
                Err(e) => {
                    warn!("Failed to run migrations: {} — persistence disabled", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("PostgreSQL connection failed: {} — persistence disabled", e);
            None
        }
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AclRow {
    logical: String,
    rule_type: String,
    comparison: String,
    data: String,
    execution_order: i32,
}

impl AclRow {
    /// Unparseable logical/comparison text in old rows degrades to the
    /// defaults instead of poisoning the whole banner.
    fn into_leaf(self, banner_id: i64) -> AclLeaf {
        let logical = LogicalOp::parse(&self.logical).unwrap_or_else(|| {
            warn!(banner_id, raw = %self.logical, "unknown logical in stored row; using 'and'");
            LogicalOp::And
        });
        let comparison = Comparison::parse(&self.comparison).unwrap_or_else(|| {
            warn!(banner_id, raw = %self.comparison, "unknown comparison in stored row; using '=='");
            Comparison::Eq
        });
        AclLeaf {
            logical,
            rule_type: self.rule_type,
            comparison,
            data: self.data,
            execution_order: self.execution_order.max(0) as u32,
        }
    }
}

#[async_trait]
impl BannerStore for PgStore {
    async fn load_leaves(&self, banner_id: i64) -> Result<Vec<AclLeaf>, StoreError> {
        let rows: Vec<AclRow> = sqlx::query_as(
            "SELECT logical, rule_type, comparison, data, execution_order
             FROM banner_acls
             WHERE banner_id = $1
             ORDER BY execution_order",
        )
        .bind(banner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_leaf(banner_id)).collect())
    }

    async fn replace_targeting(
        &self,
        banner_id: i64,
        rows: &[AclLeaf],
        compiled: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE banners
             SET compiled_limitation = $2, acls_updated_at = now()
             WHERE banner_id = $1",
        )
        .bind(banner_id)
        .bind(compiled)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::BannerNotFound(banner_id));
        }

        sqlx::query("DELETE FROM banner_acls WHERE banner_id = $1")
            .bind(banner_id)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO banner_acls
                   (banner_id, logical, rule_type, comparison, data, execution_order)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(banner_id)
            .bind(row.logical.as_str())
            .bind(&row.rule_type)
            .bind(row.comparison.as_str())
            .bind(&row.data)
            .bind(row.execution_order as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RuleSetSource for PgStore {
    async fn load_rules(
        &self,
        rule_set_id: i64,
    ) -> Result<Option<Vec<serde_json::Value>>, StoreError> {
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT rule_set_id FROM rule_sets WHERE rule_set_id = $1")
                .bind(rule_set_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT rule_json
             FROM rule_set_rules
             WHERE rule_set_id = $1
             ORDER BY position, id",
        )
        .bind(rule_set_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for (raw,) in rows {
            match serde_json::from_str(&raw) {
                Ok(v) => rules.push(v),
                Err(e) => {
                    warn!(rule_set_id, error = %e, "skipping unparseable stored rule");
                }
            }
        }
        Ok(Some(rules))
    }
}
