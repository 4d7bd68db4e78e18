//! In-memory store used by tests and local experiments.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use adlimit_targeting::schema::AclLeaf;

use crate::error::StoreError;
use crate::{BannerStore, RuleSetSource};

#[derive(Default)]
struct BannerRecord {
    leaves: Vec<AclLeaf>,
    compiled: String,
}

#[derive(Default)]
struct Inner {
    banners: HashMap<i64, BannerRecord>,
    rule_sets: HashMap<i64, Vec<Value>>,
    fail_banners: HashSet<i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_banner(&self, banner_id: i64) {
        self.lock().banners.insert(banner_id, BannerRecord::default());
    }

    pub fn insert_banner_with_leaves(&self, banner_id: i64, leaves: Vec<AclLeaf>) {
        self.lock().banners.insert(
            banner_id,
            BannerRecord {
                leaves,
                compiled: String::new(),
            },
        );
    }

    pub fn insert_rule_set(&self, rule_set_id: i64, rules: Vec<Value>) {
        self.lock().rule_sets.insert(rule_set_id, rules);
    }

    /// Make every write to this banner fail, for isolation tests.
    pub fn fail_banner(&self, banner_id: i64) {
        self.lock().fail_banners.insert(banner_id);
    }

    /// Current persisted state of a banner: its rows and compiled string.
    pub fn banner(&self, banner_id: i64) -> Option<(Vec<AclLeaf>, String)> {
        self.lock()
            .banners
            .get(&banner_id)
            .map(|b| (b.leaves.clone(), b.compiled.clone()))
    }
}

#[async_trait]
impl BannerStore for MemoryStore {
    async fn load_leaves(&self, banner_id: i64) -> Result<Vec<AclLeaf>, StoreError> {
        let inner = self.lock();
        let record = inner
            .banners
            .get(&banner_id)
            .ok_or(StoreError::BannerNotFound(banner_id))?;
        Ok(record.leaves.clone())
    }

    async fn replace_targeting(
        &self,
        banner_id: i64,
        rows: &[AclLeaf],
        compiled: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_banners.contains(&banner_id) {
            return Err(StoreError::Other(format!(
                "simulated write failure for banner {banner_id}"
            )));
        }
        let record = inner
            .banners
            .get_mut(&banner_id)
            .ok_or(StoreError::BannerNotFound(banner_id))?;
        record.leaves = rows.to_vec();
        record.compiled = compiled.to_string();
        Ok(())
    }
}

#[async_trait]
impl RuleSetSource for MemoryStore {
    async fn load_rules(&self, rule_set_id: i64) -> Result<Option<Vec<Value>>, StoreError> {
        Ok(self.lock().rule_sets.get(&rule_set_id).cloned())
    }
}
