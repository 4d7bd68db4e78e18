//! Typed rule tree schema shared by the normalizer, flattener and compiler.

use serde::{Deserialize, Serialize};

// ── Enumerations ────────────────────────────────────────────────────

/// Logical connective linking a node to its preceding sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
    Not,
}

impl LogicalOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }
}

/// How a group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    #[default]
    All,
    Any,
    None,
}

impl GroupMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::None => "none",
        }
    }
}

/// Comparison operator carried by a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Comparison {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

// ── Condition data ──────────────────────────────────────────────────

/// Payload of a leaf condition: a scalar value, a value list, or an
/// hour range. `from`/`to` keep the raw strings so out-of-policy input
/// survives normalization unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleData {
    List(Vec<String>),
    Range { from: String, to: String },
    Scalar(String),
}

impl RuleData {
    pub fn empty() -> Self {
        Self::Scalar(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::List(v) => v.is_empty(),
            Self::Range { from, to } => from.is_empty() && to.is_empty(),
        }
    }

    /// Row form: scalars as-is, lists and ranges JSON-encoded.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }

    /// Parse a stored row value back into condition data. Anything that
    /// is not a JSON list or `{from, to}` object is kept as a scalar.
    pub fn from_stored(raw: &str) -> Self {
        match serde_json::from_str::<RuleData>(raw) {
            Ok(data @ (Self::List(_) | Self::Range { .. })) => data,
            _ => Self::Scalar(raw.to_string()),
        }
    }
}

// ── Rule tree ───────────────────────────────────────────────────────

/// One node of a normalized rule tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(GroupRule),
    Leaf(LeafRule),
}

impl RuleNode {
    /// Logical connective to the preceding sibling at the same level.
    pub fn logical(&self) -> LogicalOp {
        match self {
            Self::Group(g) => g.logical,
            Self::Leaf(l) => l.logical,
        }
    }
}

/// Logical container of child nodes. Groups are structural only; they
/// never persist as a row of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRule {
    #[serde(rename = "group")]
    pub mode: GroupMode,
    #[serde(default)]
    pub logical: LogicalOp,
    pub rules: Vec<RuleNode>,
}

/// A single targeting condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRule {
    #[serde(default)]
    pub logical: LogicalOp,
    /// Free-form type tag; unsupported tags survive normalization and
    /// render as always-true stubs.
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub comparison: Comparison,
    pub data: RuleData,
    /// 1-based position assigned by the normalizer, leaves only.
    #[serde(default)]
    pub order: u32,
}

// ── Persisted row form ──────────────────────────────────────────────

/// Flattened, persisted form of a leaf condition. One banner owns a
/// contiguous, order-sorted sequence of these rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclLeaf {
    pub logical: LogicalOp,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub comparison: Comparison,
    /// Scalar value or JSON-encoded list/range.
    pub data: String,
    #[serde(rename = "order")]
    pub execution_order: u32,
}

impl AclLeaf {
    /// Rebuild a leaf condition from the persisted row.
    pub fn to_leaf(&self) -> LeafRule {
        LeafRule {
            logical: self.logical,
            rule_type: self.rule_type.clone(),
            comparison: self.comparison,
            data: RuleData::from_stored(&self.data),
            order: self.execution_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_list_round_trips() {
        let data = RuleData::List(vec!["US".into(), "CA".into()]);
        let stored = data.to_stored();
        assert_eq!(stored, r#"["US","CA"]"#);
        assert_eq!(RuleData::from_stored(&stored), data);
    }

    #[test]
    fn stored_range_round_trips() {
        let data = RuleData::Range {
            from: "9".into(),
            to: "17".into(),
        };
        let stored = data.to_stored();
        assert_eq!(RuleData::from_stored(&stored), data);
    }

    #[test]
    fn stored_scalar_is_verbatim() {
        assert_eq!(RuleData::Scalar("US".into()).to_stored(), "US");
        assert_eq!(RuleData::from_stored("US"), RuleData::Scalar("US".into()));
        // A bare number is not a list or range, so it stays scalar.
        assert_eq!(RuleData::from_stored("7"), RuleData::Scalar("7".into()));
    }

    #[test]
    fn comparison_parse_rejects_unknown() {
        assert_eq!(Comparison::parse(">="), Some(Comparison::Ge));
        assert_eq!(Comparison::parse("=>"), None);
        assert_eq!(Comparison::parse("invalid"), None);
    }

    #[test]
    fn leaf_serializes_with_wire_names() {
        let leaf = LeafRule {
            logical: LogicalOp::And,
            rule_type: "Geo:Country".into(),
            comparison: Comparison::Eq,
            data: RuleData::Scalar("US".into()),
            order: 1,
        };
        let json = serde_json::to_value(&leaf).unwrap();
        assert_eq!(json["type"], "Geo:Country");
        assert_eq!(json["comparison"], "==");
        assert_eq!(json["logical"], "and");
        assert_eq!(json["order"], 1);
    }
}
