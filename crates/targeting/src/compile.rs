//! Expression compiler: renders a normalized rule tree into the
//! delivery-limitation syntax of the external evaluator.
//!
//! Rendering is total. Every node renders to some string; degenerate
//! input (empty groups, empty hour ranges) renders empty and is skipped
//! by the caller, and unrecognized type tags render as an always-true
//! stub so an unknown rule never silently excludes traffic.

use crate::schema::{GroupMode, GroupRule, LeafRule, LogicalOp, RuleData, RuleNode};

/// Predicate function names of the external evaluator, per condition type.
const PREDICATES: &[(&str, &str)] = &[
    ("Site:Variable", "MAX_checkSite_Variable"),
    ("Site:Domain", "MAX_checkSite_Domain"),
    ("Source:Source", "MAX_checkSource"),
    ("Geo:Country", "MAX_checkGeo_Country"),
    ("Client:Browser", "MAX_checkClient_Browser"),
    ("Client:Language", "MAX_checkClient_Language"),
    ("Time:HourOfDay", "MAX_checkTime_HourOfDay"),
    ("Time:DayOfWeek", "MAX_checkTime_DayOfWeek"),
];

fn predicate_for(rule_type: &str) -> Option<&'static str> {
    PREDICATES
        .iter()
        .find(|(t, _)| *t == rule_type)
        .map(|(_, f)| *f)
}

/// Compile a rule sequence into one expression string (empty for empty
/// input). Adjacent terms are implicitly conjoined by the external
/// syntax; `or` terms get an `OR ` prefix and `not` terms render as
/// `AND NOT (...)`. Any leading connective on the first surviving term
/// is stripped.
pub fn compile(items: &[RuleNode]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for item in items {
        let expr = compile_node(item);
        if expr.is_empty() {
            continue;
        }
        parts.push(match item.logical() {
            LogicalOp::And => expr,
            LogicalOp::Or => format!("OR {expr}"),
            LogicalOp::Not => format!("AND NOT ({expr})"),
        });
    }

    let mut compiled = String::new();
    for (idx, piece) in parts.iter().enumerate() {
        if idx == 0 {
            let head = piece
                .strip_prefix("AND ")
                .or_else(|| piece.strip_prefix("OR "))
                .unwrap_or(piece);
            compiled.push_str(head);
        } else {
            compiled.push(' ');
            compiled.push_str(piece);
        }
    }
    compiled.trim().to_string()
}

fn compile_node(node: &RuleNode) -> String {
    match node {
        RuleNode::Group(g) => compile_group(g),
        RuleNode::Leaf(l) => compile_leaf(l),
    }
}

/// Render a group: non-empty children are individually parenthesized,
/// joined by the mode glue and wrapped; `none` negates the whole join.
/// A group with no renderable children renders empty.
fn compile_group(group: &GroupRule) -> String {
    let children: Vec<String> = group
        .rules
        .iter()
        .map(compile_node)
        .filter(|e| !e.is_empty())
        .collect();
    if children.is_empty() {
        return String::new();
    }

    let glue = match group.mode {
        GroupMode::Any => " OR ",
        GroupMode::All | GroupMode::None => " AND ",
    };
    let joined = children
        .iter()
        .map(|c| parenthesize(c))
        .collect::<Vec<_>>()
        .join(glue);
    let inner = format!("({joined})");

    match group.mode {
        GroupMode::None => format!("NOT {inner}"),
        _ => inner,
    }
}

fn compile_leaf(leaf: &LeafRule) -> String {
    if leaf.rule_type.is_empty() {
        return String::new();
    }

    if leaf.rule_type == "Time:DayOfWeek" {
        let values = match &leaf.data {
            RuleData::List(items) => items.clone(),
            RuleData::Scalar(s) => vec![s.clone()],
            RuleData::Range { .. } => Vec::new(),
        };
        let clauses: Vec<String> = values
            .iter()
            .map(|v| format!("MAX_checkTime_DayOfWeek('{}', '==')", esc(v)))
            .collect();
        return parenthesize(&clauses.join(" OR "));
    }

    if leaf.rule_type == "Time:HourRange" {
        let (from, to) = match &leaf.data {
            RuleData::Range { from, to } => (from.as_str(), to.as_str()),
            _ => ("", ""),
        };
        if from.is_empty() || to.is_empty() {
            return String::new();
        }
        let lower = format!("MAX_checkTime_HourOfDay('{}', '>=')", esc(from));
        let upper = format!("MAX_checkTime_HourOfDay('{}', '<=')", esc(to));
        return parenthesize(&format!("{lower} AND {upper}"));
    }

    let cmp = leaf.comparison.as_str();
    let Some(func) = predicate_for(&leaf.rule_type) else {
        // Fail-open stub: must always evaluate true in the external syntax.
        let data = leaf.data.to_stored();
        return format!(
            "/* unsupported:{} {} {} */ 1",
            leaf.rule_type,
            cmp,
            quote(&data)
        );
    };

    match &leaf.data {
        RuleData::List(items) => {
            if items.is_empty() {
                return String::new();
            }
            let pieces: Vec<String> = items
                .iter()
                .map(|v| format!("{func}({}, {})", quote(v), quote(cmp)))
                .collect();
            parenthesize(&pieces.join(" OR "))
        }
        RuleData::Scalar(value) => format!("{func}({}, {})", quote(value), quote(cmp)),
        // A range payload on a non-range type has nothing meaningful to render.
        RuleData::Range { .. } => String::new(),
    }
}

// ── String helpers ──────────────────────────────────────────────────

fn quote(value: &str) -> String {
    format!("'{}'", esc(value))
}

/// Naive single-quote escaping only. Known weak point, kept as the
/// external syntax contract; see DESIGN.md.
fn esc(value: &str) -> String {
    value.replace('\'', "\\'")
}

fn parenthesize(expr: &str) -> String {
    let expr = expr.trim();
    if expr.is_empty() {
        return String::new();
    }
    if expr.starts_with('(') && expr.ends_with(')') {
        return expr.to_string();
    }
    format!("({expr})")
}
