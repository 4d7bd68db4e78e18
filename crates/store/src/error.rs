use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("banner not found: {0}")]
    BannerNotFound(i64),

    #[error("rule set not found: {0}")]
    RuleSetNotFound(i64),

    #[error("rules must be provided inline or via rule_set_id")]
    MissingRules,

    #[error("target_ids required")]
    MissingTargets,

    #[error("{0}")]
    Other(String),
}
