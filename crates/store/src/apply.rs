//! Apply orchestration: compile a rule source once, then persist it to
//! one or many banners with replace/merge semantics.
//!
//! One banner is one transactional unit. A failure while persisting one
//! banner is recorded in that banner's outcome and never prevents the
//! remaining banners from being processed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use adlimit_targeting::flatten::acl_rows;
use adlimit_targeting::schema::{GroupMode, GroupRule, LeafRule, LogicalOp, RuleNode};
use adlimit_targeting::{compile, flatten, normalize};

use crate::error::StoreError;
use crate::{BannerStore, RuleSetSource};

// ── Request / report types ──────────────────────────────────────────

/// Replace discards a banner's existing rules; merge keeps them in
/// front of the new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    #[default]
    Replace,
    Merge,
}

impl ApplyMode {
    /// Unrecognized values fall back to replace.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "merge" => Self::Merge,
            _ => Self::Replace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

impl<'de> Deserialize<'de> for ApplyMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    #[serde(rename = "targetIds")]
    pub target_ids: Vec<i64>,
    #[serde(default)]
    pub mode: ApplyMode,
    /// Inline raw rule tree; ignored when `rule_set_id` is set.
    #[serde(default)]
    pub rules: Option<Vec<Value>>,
    #[serde(rename = "ruleSetId", default)]
    pub rule_set_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub mode: ApplyMode,
    #[serde(rename = "ruleSetUsed")]
    pub rule_set_used: Option<i64>,
    pub warnings: Vec<String>,
    pub results: Vec<TargetOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    #[serde(rename = "targetId")]
    pub target_id: i64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ApplyMode>,
    #[serde(rename = "compiledLength", skip_serializing_if = "Option::is_none")]
    pub compiled_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetOutcome {
    fn ok(target_id: i64, mode: ApplyMode, compiled_length: usize) -> Self {
        Self {
            target_id,
            ok: true,
            mode: Some(mode),
            compiled_length: Some(compiled_length),
            error: None,
        }
    }

    fn err(target_id: i64, message: impl Into<String>) -> Self {
        Self {
            target_id,
            ok: false,
            mode: None,
            compiled_length: None,
            error: Some(message.into()),
        }
    }
}

// ── Orchestration ───────────────────────────────────────────────────

/// Apply a rule source to every requested banner.
///
/// The rule source is normalized and flattened once; warnings are shared
/// across all targets. Structural problems (no targets, no rule source,
/// unknown rule set) reject the whole call before any banner is touched.
pub async fn apply<S>(store: &S, req: &ApplyRequest) -> Result<ApplyReport, StoreError>
where
    S: BannerStore + RuleSetSource,
{
    if req.target_ids.is_empty() {
        return Err(StoreError::MissingTargets);
    }

    let raw = match req.rule_set_id {
        Some(id) => store
            .load_rules(id)
            .await?
            .ok_or(StoreError::RuleSetNotFound(id))?,
        None => req.rules.clone().ok_or(StoreError::MissingRules)?,
    };

    let (normalized, warnings) = normalize(&raw);
    let new_leaves = flatten(&normalized);
    info!(
        targets = req.target_ids.len(),
        mode = req.mode.as_str(),
        leaves = new_leaves.len(),
        "applying targeting rules"
    );

    let mut results = Vec::with_capacity(req.target_ids.len());
    for &target_id in &req.target_ids {
        if target_id <= 0 {
            results.push(TargetOutcome::err(target_id, "invalid id"));
            continue;
        }
        match apply_one(store, target_id, req.mode, &new_leaves).await {
            Ok(compiled_length) => {
                debug!(target_id, compiled_length, "targeting applied");
                results.push(TargetOutcome::ok(target_id, req.mode, compiled_length));
            }
            Err(e) => {
                warn!(target_id, error = %e, "targeting apply failed for banner");
                results.push(TargetOutcome::err(target_id, e.to_string()));
            }
        }
    }

    Ok(ApplyReport {
        mode: req.mode,
        rule_set_used: req.rule_set_id,
        warnings,
        results,
    })
}

/// Persist the final leaf sequence for one banner and return the length
/// of the stored compiled expression.
async fn apply_one<S: BannerStore>(
    store: &S,
    banner_id: i64,
    mode: ApplyMode,
    new_leaves: &[LeafRule],
) -> Result<usize, StoreError> {
    let mut combined: Vec<LeafRule> = Vec::new();
    if mode == ApplyMode::Merge {
        for row in store.load_leaves(banner_id).await? {
            combined.push(row.to_leaf());
        }
    }
    combined.extend_from_slice(new_leaves);

    let rows = acl_rows(&combined);
    let tree = vec![RuleNode::Group(GroupRule {
        mode: GroupMode::All,
        logical: LogicalOp::And,
        rules: combined.into_iter().map(RuleNode::Leaf).collect(),
    })];
    let compiled = compile(&tree);

    store.replace_targeting(banner_id, &rows, &compiled).await?;
    Ok(compiled.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_strings_default_to_replace() {
        assert_eq!(ApplyMode::parse("merge"), ApplyMode::Merge);
        assert_eq!(ApplyMode::parse("MERGE"), ApplyMode::Merge);
        assert_eq!(ApplyMode::parse("replace"), ApplyMode::Replace);
        assert_eq!(ApplyMode::parse("bogus"), ApplyMode::Replace);
        assert_eq!(ApplyMode::parse(""), ApplyMode::Replace);
    }

    #[test]
    fn request_deserializes_wire_names() {
        let req: ApplyRequest = serde_json::from_value(serde_json::json!({
            "targetIds": [1, 2],
            "mode": "merge",
            "ruleSetId": 7
        }))
        .unwrap();
        assert_eq!(req.target_ids, vec![1, 2]);
        assert_eq!(req.mode, ApplyMode::Merge);
        assert_eq!(req.rule_set_id, Some(7));
        assert!(req.rules.is_none());
    }
}
