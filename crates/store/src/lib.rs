//! Banner targeting persistence and apply orchestration.
//!
//! Storage sits behind two async traits so the orchestrator never knows
//! which backend it talks to: `PgStore` in production, `MemoryStore` in
//! tests.

pub mod apply;
pub mod error;
pub mod memory;
pub mod postgres;

pub use apply::{apply, ApplyMode, ApplyReport, ApplyRequest, TargetOutcome};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::{init_pg_pool, PgStore};

use async_trait::async_trait;

use adlimit_targeting::schema::AclLeaf;

/// Per-banner ACL row storage.
///
/// `replace_targeting` is one atomic unit of work: the row replacement
/// and the compiled-expression write commit or roll back together.
/// Other banners are never affected by one banner's rollback.
#[async_trait]
pub trait BannerStore: Send + Sync {
    /// Load a banner's persisted rows in execution order.
    async fn load_leaves(&self, banner_id: i64) -> Result<Vec<AclLeaf>, StoreError>;

    /// Replace a banner's rows and compiled expression in one transaction.
    async fn replace_targeting(
        &self,
        banner_id: i64,
        rows: &[AclLeaf],
        compiled: &str,
    ) -> Result<(), StoreError>;
}

/// Resolves a stored rule set into its raw rule nodes in persisted order.
#[async_trait]
pub trait RuleSetSource: Send + Sync {
    /// `Ok(None)` means the rule set does not exist.
    async fn load_rules(
        &self,
        rule_set_id: i64,
    ) -> Result<Option<Vec<serde_json::Value>>, StoreError>;
}
