//! Validate-only facade: one call producing the preview payload
//! (normalized tree, warnings, ACL row preview, compiled expression).

use serde::Serialize;
use serde_json::Value;

use crate::compile::compile;
use crate::flatten::{acl_rows, flatten};
use crate::normalize::normalize;
use crate::schema::{AclLeaf, RuleNode};

/// Preview payload for a validate-only call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutput {
    pub normalized: Vec<RuleNode>,
    pub warnings: Vec<String>,
    #[serde(rename = "aclPreview")]
    pub acl_preview: Vec<AclLeaf>,
    pub compiled: String,
}

/// Normalize, flatten and compile a raw rule tree without persisting
/// anything. Warnings never block the preview.
pub fn validate(raw: &[Value]) -> ValidationOutput {
    let (normalized, warnings) = normalize(raw);
    let acl_preview = acl_rows(&flatten(&normalized));
    let compiled = compile(&normalized);
    ValidationOutput {
        normalized,
        warnings,
        acl_preview,
        compiled,
    }
}
