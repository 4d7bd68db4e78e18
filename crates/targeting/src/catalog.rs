//! Catalog of supported condition types, for UI and collaborator payloads.

use serde::Serialize;

/// Descriptor of one supported condition type.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionType {
    #[serde(rename = "type")]
    pub rule_type: &'static str,
    pub label: &'static str,
    #[serde(rename = "dataShape")]
    pub data_shape: &'static str,
    pub comparisons: &'static [&'static str],
    pub listable: bool,
    pub range: bool,
}

pub const CONDITION_TYPES: &[ConditionType] = &[
    ConditionType {
        rule_type: "Site:Variable",
        label: "Site Variable",
        data_shape: "string \"param|value\" | array<string> | kv{param:value}",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Site:Domain",
        label: "Site Domain",
        data_shape: "string | array<string>",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Source:Source",
        label: "Source Tag",
        data_shape: "string | array<string>",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Geo:Country",
        label: "Geo Country (ISO)",
        data_shape: "string ISO code | array<string>",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Client:Browser",
        label: "Client Browser",
        data_shape: "string | array<string>",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Client:Language",
        label: "Client Language",
        data_shape: "string | array<string> (RFC 2616)",
        comparisons: &["==", "!="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Time:DayOfWeek",
        label: "Time: Day of Week",
        data_shape: "int 0-6 | array<int>",
        comparisons: &["=="],
        listable: true,
        range: false,
    },
    ConditionType {
        rule_type: "Time:HourOfDay",
        label: "Time: Hour of Day",
        data_shape: "int 0-23",
        comparisons: &["==", "!=", ">", "<", ">=", "<="],
        listable: false,
        range: true,
    },
    ConditionType {
        rule_type: "Time:HourRange",
        label: "Time: Hour Range",
        data_shape: "object {from:int,to:int}",
        comparisons: &["(implicit >=, <=)"],
        listable: false,
        range: true,
    },
];

pub const LOGICAL_OPS: &[&str] = &["and", "or", "not"];
pub const GROUP_MODES: &[&str] = &["all", "any", "none"];

/// Whether the normalizer recognizes this type tag. Unsupported tags are
/// kept anyway and rendered as always-true stubs.
pub fn is_supported(rule_type: &str) -> bool {
    CONDITION_TYPES.iter().any(|t| t.rule_type == rule_type)
}

/// Full catalog payload for collaborators (type list, logical ops, group modes).
pub fn describe() -> serde_json::Value {
    serde_json::json!({
        "types": CONDITION_TYPES,
        "logical": LOGICAL_OPS,
        "groupModes": GROUP_MODES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_covers_all_catalog_entries() {
        for t in CONDITION_TYPES {
            assert!(is_supported(t.rule_type));
        }
        assert!(!is_supported("Foo:Bar"));
        assert!(!is_supported(""));
    }

    #[test]
    fn describe_lists_group_modes() {
        let payload = describe();
        assert_eq!(payload["groupModes"][2], "none");
        assert_eq!(payload["types"].as_array().unwrap().len(), 9);
    }
}
