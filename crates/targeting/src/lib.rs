//! Ad-targeting rule tree compiler.
//!
//! This crate provides:
//! - A typed rule tree schema (leaf conditions plus AND/OR/NONE groups)
//! - A fail-soft normalizer that canonicalizes raw JSON trees and collects
//!   advisory warnings instead of rejecting malformed input
//! - A flattener producing the ordered ACL rows a banner persists
//! - An expression compiler emitting the delivery-limitation syntax
//!   consumed by the ad-serving evaluator
//! - A catalog describing the supported condition types

pub mod catalog;
pub mod compile;
pub mod flatten;
pub mod normalize;
pub mod schema;
pub mod validate;

pub use compile::compile;
pub use flatten::{acl_rows, flatten};
pub use normalize::normalize;
pub use validate::{validate, ValidationOutput};
