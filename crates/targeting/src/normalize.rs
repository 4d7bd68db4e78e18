//! Fail-soft rule tree normalization.
//!
//! Canonicalizes every node of a raw JSON rule tree, assigns sequence
//! numbers to leaves and collects advisory warnings. Malformed input is
//! never a hard error: every anomaly downgrades to a warning plus a
//! best-effort default. The only node ever dropped is a leaf with no
//! type tag at all.

use serde_json::Value;

use crate::catalog;
use crate::schema::{Comparison, GroupMode, GroupRule, LeafRule, LogicalOp, RuleData, RuleNode};

/// Normalize a raw rule tree into a typed tree plus warnings.
///
/// The leaf order counter starts at 1 and increments once per kept leaf,
/// independent of group nesting depth.
pub fn normalize(raw: &[Value]) -> (Vec<RuleNode>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut seq = 1u32;
    let nodes = normalize_nodes(raw, &mut warnings, &mut seq);
    tracing::debug!(
        nodes = nodes.len(),
        warnings = warnings.len(),
        "normalized rule tree"
    );
    (nodes, warnings)
}

fn normalize_nodes(nodes: &[Value], warnings: &mut Vec<String>, seq: &mut u32) -> Vec<RuleNode> {
    let mut out = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if has_key(node, "group") {
            out.push(RuleNode::Group(normalize_group(node, i, warnings, seq)));
        } else if let Some(leaf) = normalize_leaf(node, i, warnings, seq) {
            out.push(RuleNode::Leaf(leaf));
        }
    }
    out
}

fn normalize_group(
    node: &Value,
    index: usize,
    warnings: &mut Vec<String>,
    seq: &mut u32,
) -> GroupRule {
    let mode_raw = scalar_string(node.get("group")).to_lowercase();
    let mode = match GroupMode::parse(&mode_raw) {
        Some(mode) => mode,
        Option::None => {
            warnings.push(format!(
                "Unknown group mode at index {index}; defaulting to 'all'."
            ));
            GroupMode::All
        }
    };

    let logical = normalize_logical(node, warnings, |_| {
        format!("Unknown group logical at index {index}; defaulting to 'and'.")
    });

    let raw_children: &[Value] = match node.get("rules") {
        Some(Value::Array(items)) => items,
        _ => &[],
    };
    let rules = normalize_nodes(raw_children, warnings, seq);
    if rules.is_empty() {
        warnings.push(format!("Empty group at index {index}."));
    }

    GroupRule {
        mode,
        logical,
        rules,
    }
}

fn normalize_leaf(
    node: &Value,
    index: usize,
    warnings: &mut Vec<String>,
    seq: &mut u32,
) -> Option<LeafRule> {
    let rule_type = scalar_string(node.get("type"));
    if rule_type.is_empty() {
        warnings.push(format!("Rule missing type at index {index}."));
        return Option::None;
    }
    if !catalog::is_supported(&rule_type) {
        warnings.push(format!(
            "Unsupported rule type '{rule_type}' at index {index}; will be commented."
        ));
    }

    let comparison = match node.get("comparison") {
        Option::None | Some(Value::Null) => Comparison::Eq,
        Some(v) => {
            let raw = scalar_string(Some(v));
            match Comparison::parse(&raw) {
                Some(cmp) => cmp,
                Option::None => {
                    warnings.push(format!(
                        "Invalid comparison '{raw}' at index {index}; defaulting to '=='."
                    ));
                    Comparison::Eq
                }
            }
        }
    };

    let logical = normalize_logical(node, warnings, |raw| {
        format!("Invalid logical '{raw}' at index {index}; defaulting to 'and'.")
    });

    let raw_data = node.get("data").filter(|v| !v.is_null());
    let mut data = convert_data(raw_data);

    if rule_type == "Site:Variable" {
        data = fold_kv_pairs(node, raw_data.is_some(), data, warnings);
    }

    if rule_type == "Time:DayOfWeek" {
        data = check_day_of_week(data, warnings);
    } else if rule_type == "Time:HourRange" {
        data = check_hour_range(data, warnings);
    }

    let order = *seq;
    *seq += 1;

    Some(LeafRule {
        logical,
        rule_type,
        comparison,
        data,
        order,
    })
}

/// Read and validate the `logical` key shared by groups and leaves.
fn normalize_logical(
    node: &Value,
    warnings: &mut Vec<String>,
    message: impl FnOnce(&str) -> String,
) -> LogicalOp {
    match node.get("logical") {
        Option::None | Some(Value::Null) => LogicalOp::And,
        Some(v) => {
            let raw = scalar_string(Some(v)).to_lowercase();
            match LogicalOp::parse(&raw) {
                Some(op) => op,
                Option::None => {
                    warnings.push(message(&raw));
                    LogicalOp::And
                }
            }
        }
    }
}

/// Fold `kv` map entries into `key|value` strings appended to the leaf data.
/// Pairs with an empty key or value are dropped with a warning.
fn fold_kv_pairs(
    node: &Value,
    had_data: bool,
    data: RuleData,
    warnings: &mut Vec<String>,
) -> RuleData {
    let Some(Value::Object(kv)) = node.get("kv") else {
        return data;
    };

    let mut pairs = Vec::new();
    for (key, value) in kv {
        let key = key.trim();
        let value_raw = scalar_string(Some(value));
        let value = value_raw.trim();
        if key.is_empty() || value.is_empty() {
            warnings.push("Site:Variable kv contains empty key/value; skipping.".to_string());
            continue;
        }
        pairs.push(format!("{key}|{value}"));
    }
    if pairs.is_empty() {
        return data;
    }

    let mut merged = if had_data {
        match data {
            RuleData::List(items) => items,
            RuleData::Scalar(s) => vec![s],
            RuleData::Range { .. } => Vec::new(),
        }
    } else {
        Vec::new()
    };
    merged.extend(pairs);
    RuleData::List(merged)
}

/// Keep only validated in-range day values (0-6); warn once per dropped
/// value. A leaf whose values are all dropped keeps an empty list and
/// later compiles to an empty fragment.
fn check_day_of_week(data: RuleData, warnings: &mut Vec<String>) -> RuleData {
    let values = match data {
        RuleData::List(items) => items,
        RuleData::Scalar(s) => vec![s],
        RuleData::Range { .. } => Vec::new(),
    };

    let mut kept = Vec::new();
    for v in &values {
        match parse_int(v) {
            Some(n) if (0..=6).contains(&n) => kept.push(n.to_string()),
            _ => warnings.push(format!("Time:DayOfWeek value '{v}' is out of range 0–6.")),
        }
    }
    RuleData::List(kept)
}

/// Validate an hour range without altering it. Overnight windows
/// (`from > to`) stay un-split; the warning is advisory only.
fn check_hour_range(data: RuleData, warnings: &mut Vec<String>) -> RuleData {
    let (from, to) = match data {
        RuleData::Range { from, to } => (from, to),
        _ => (String::new(), String::new()),
    };

    match (parse_int(&from), parse_int(&to)) {
        (Some(f), Some(t)) => {
            if !(0..=23).contains(&f) {
                warnings.push("HourRange 'from' out of range (0–23).".to_string());
            }
            if !(0..=23).contains(&t) {
                warnings.push("HourRange 'to' out of range (0–23).".to_string());
            }
            if f > t {
                warnings.push(
                    "HourRange from>to; split into two ranges for overnight windows.".to_string(),
                );
            }
        }
        _ => warnings.push("Time:HourRange requires numeric 'from' and 'to'.".to_string()),
    }

    RuleData::Range { from, to }
}

// ── Raw value helpers ───────────────────────────────────────────────

/// Key present with a non-null value.
fn has_key(node: &Value, key: &str) -> bool {
    node.get(key).is_some_and(|v| !v.is_null())
}

/// Stringify a raw scalar: strings verbatim, numbers via display,
/// booleans as "1"/"", everything else empty.
fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "1".to_string(),
        Some(Value::Bool(false)) => String::new(),
        _ => String::new(),
    }
}

/// Numeric check with integer truncation ("3.7" passes and becomes 3).
fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64)
}

fn convert_data(raw: Option<&Value>) -> RuleData {
    match raw {
        Option::None => RuleData::empty(),
        Some(Value::Array(items)) => {
            RuleData::List(items.iter().map(|v| scalar_string(Some(v))).collect())
        }
        Some(Value::Object(map)) => {
            if map.contains_key("from") || map.contains_key("to") {
                RuleData::Range {
                    from: scalar_string(map.get("from")),
                    to: scalar_string(map.get("to")),
                }
            } else {
                RuleData::List(map.values().map(|v| scalar_string(Some(v))).collect())
            }
        }
        Some(v) => RuleData::Scalar(scalar_string(Some(v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(raw: serde_json::Value) -> (Vec<RuleNode>, Vec<String>) {
        normalize(raw.as_array().expect("test input is an array"))
    }

    fn leaf(node: &RuleNode) -> &LeafRule {
        match node {
            RuleNode::Leaf(l) => l,
            RuleNode::Group(_) => panic!("expected leaf"),
        }
    }

    fn group(node: &RuleNode) -> &GroupRule {
        match node {
            RuleNode::Group(g) => g,
            RuleNode::Leaf(_) => panic!("expected group"),
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (nodes, warnings) = run(json!([]));
        assert!(nodes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn simple_rule_passes_clean() {
        let (nodes, warnings) =
            run(json!([{"type": "Geo:Country", "comparison": "==", "data": "US"}]));
        assert!(warnings.is_empty());
        assert_eq!(nodes.len(), 1);

        let l = leaf(&nodes[0]);
        assert_eq!(l.logical, LogicalOp::And);
        assert_eq!(l.rule_type, "Geo:Country");
        assert_eq!(l.comparison, Comparison::Eq);
        assert_eq!(l.data, RuleData::Scalar("US".into()));
        assert_eq!(l.order, 1);
    }

    #[test]
    fn unsupported_type_is_kept_with_warning() {
        let (nodes, warnings) =
            run(json!([{"type": "Unsupported:Type", "comparison": "==", "data": "test"}]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Unsupported rule type"));
        assert!(warnings[0].contains("Unsupported:Type"));
        // Fail-open: the leaf survives for stub rendering.
        assert_eq!(nodes.len(), 1);
        assert_eq!(leaf(&nodes[0]).rule_type, "Unsupported:Type");
    }

    #[test]
    fn invalid_comparison_coerces_to_eq() {
        let (nodes, warnings) =
            run(json!([{"type": "Geo:Country", "comparison": "invalid", "data": "US"}]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Invalid comparison"));
        assert_eq!(leaf(&nodes[0]).comparison, Comparison::Eq);
    }

    #[test]
    fn invalid_logical_coerces_to_and() {
        let (nodes, warnings) = run(json!([
            {"type": "Geo:Country", "comparison": "==", "data": "US"},
            {"logical": "invalid", "type": "Client:Browser", "comparison": "==", "data": "Chrome"}
        ]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Invalid logical"));
        assert_eq!(leaf(&nodes[1]).logical, LogicalOp::And);
    }

    #[test]
    fn day_of_week_drops_out_of_range_values() {
        let (nodes, warnings) =
            run(json!([{"type": "Time:DayOfWeek", "comparison": "==", "data": [0, 1, 7, "invalid"]}]));
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.contains("out of range")));
        // Only the validated values survive.
        assert_eq!(
            leaf(&nodes[0]).data,
            RuleData::List(vec!["0".into(), "1".into()])
        );
    }

    #[test]
    fn day_of_week_scalar_becomes_list() {
        let (nodes, warnings) = run(json!([{"type": "Time:DayOfWeek", "data": 3}]));
        assert!(warnings.is_empty());
        assert_eq!(leaf(&nodes[0]).data, RuleData::List(vec!["3".into()]));
    }

    #[test]
    fn hour_range_bounds_are_checked() {
        let (_, warnings) =
            run(json!([{"type": "Time:HourRange", "data": {"from": 25, "to": -1}}]));
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.contains("out of range"))
                .count(),
            2
        );
    }

    #[test]
    fn hour_range_overnight_warns_but_keeps_range() {
        let (nodes, warnings) =
            run(json!([{"type": "Time:HourRange", "data": {"from": 20, "to": 6}}]));
        let joined = warnings.join(" ");
        assert!(joined.contains("from>to"));
        assert!(joined.contains("overnight"));
        // The raw range is retained, not split.
        assert_eq!(
            leaf(&nodes[0]).data,
            RuleData::Range {
                from: "20".into(),
                to: "6".into()
            }
        );
    }

    #[test]
    fn hour_range_requires_numeric_bounds() {
        let (_, warnings) =
            run(json!([{"type": "Time:HourRange", "data": {"from": "x", "to": 5}}]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("requires numeric"));
    }

    #[test]
    fn site_variable_kv_pairs_fold_into_data() {
        let (nodes, warnings) = run(json!([{
            "type": "Site:Variable",
            "comparison": "==",
            "data": "existing",
            "kv": {"key1": "value1", "key2": "value2"}
        }]));
        assert!(warnings.is_empty());
        let RuleData::List(items) = &leaf(&nodes[0]).data else {
            panic!("expected list data");
        };
        assert!(items.contains(&"existing".to_string()));
        assert!(items.contains(&"key1|value1".to_string()));
        assert!(items.contains(&"key2|value2".to_string()));
    }

    #[test]
    fn site_variable_empty_kv_pairs_warn() {
        let (nodes, warnings) = run(json!([{
            "type": "Site:Variable",
            "comparison": "==",
            "kv": {"key1": "value1", "": "empty_key", "empty_value": ""}
        }]));
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.contains("empty key/value")));
        let RuleData::List(items) = &leaf(&nodes[0]).data else {
            panic!("expected list data");
        };
        assert_eq!(items, &vec!["key1|value1".to_string()]);
    }

    #[test]
    fn group_is_normalized_recursively() {
        let (nodes, warnings) = run(json!([{
            "group": "all",
            "rules": [{"type": "Geo:Country", "comparison": "==", "data": "US"}]
        }]));
        assert!(warnings.is_empty());
        let g = group(&nodes[0]);
        assert_eq!(g.mode, GroupMode::All);
        assert_eq!(g.logical, LogicalOp::And);
        assert_eq!(g.rules.len(), 1);
        assert_eq!(leaf(&g.rules[0]).order, 1);
    }

    #[test]
    fn unknown_group_mode_defaults_to_all() {
        let (nodes, warnings) = run(json!([{
            "group": "invalid",
            "rules": [{"type": "Geo:Country", "data": "US"}]
        }]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Unknown group mode"));
        assert_eq!(group(&nodes[0]).mode, GroupMode::All);
    }

    #[test]
    fn empty_group_is_kept_with_warning() {
        let (nodes, warnings) = run(json!([{"group": "all", "rules": []}]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Empty group"));
        assert_eq!(nodes.len(), 1);
        assert!(group(&nodes[0]).rules.is_empty());
    }

    #[test]
    fn missing_type_drops_only_that_node() {
        let (nodes, warnings) = run(json!([
            {"comparison": "==", "data": "test"},
            {"type": "Geo:Country", "comparison": "==", "data": "US"}
        ]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing type"));
        assert_eq!(nodes.len(), 1);
        let l = leaf(&nodes[0]);
        assert_eq!(l.rule_type, "Geo:Country");
        // The dropped node does not consume a sequence number.
        assert_eq!(l.order, 1);
    }

    #[test]
    fn leaf_order_is_contiguous_across_nesting() {
        let (nodes, _) = run(json!([
            {"type": "Geo:Country", "data": "US"},
            {"group": "any", "rules": [
                {"type": "Client:Browser", "data": "Chrome"},
                {"type": "Client:Browser", "data": "Firefox"}
            ]},
            {"type": "Client:Language", "data": "en"}
        ]));
        assert_eq!(leaf(&nodes[0]).order, 1);
        let g = group(&nodes[1]);
        assert_eq!(leaf(&g.rules[0]).order, 2);
        assert_eq!(leaf(&g.rules[1]).order, 3);
        assert_eq!(leaf(&nodes[2]).order, 4);
    }

    #[test]
    fn mixed_valid_and_invalid_rules() {
        let (nodes, warnings) = run(json!([
            {"type": "Geo:Country", "comparison": "==", "data": "US"},
            {"type": "", "comparison": "==", "data": "invalid"},
            {"type": "Unsupported:Type", "comparison": "invalid_op", "data": "test"},
            {"logical": "invalid_logical", "type": "Client:Browser", "comparison": "==", "data": "Chrome"}
        ]));
        assert_eq!(warnings.len(), 4);
        assert_eq!(nodes.len(), 3);

        let joined = warnings.join(" ");
        assert!(joined.contains("missing type"));
        assert!(joined.contains("Unsupported rule type"));
        assert!(joined.contains("Invalid comparison"));
        assert!(joined.contains("Invalid logical"));
    }
}
