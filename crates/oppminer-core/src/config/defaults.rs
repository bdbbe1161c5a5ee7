//! Default values for configuration fields.
//!
//! Kept in one place so the serde defaults and the documentation stay in
//! sync.

pub(super) fn llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub(super) fn ideation_model() -> String {
    "gpt-4o-mini".to_string()
}

pub(super) fn fallback_model() -> Option<String> {
    Some("gpt-3.5-turbo".to_string())
}

pub(super) fn validation_model() -> String {
    "gpt-4o".to_string()
}

pub(super) fn cost_limit_usd() -> f64 {
    10.0
}

pub(super) fn db_path() -> String {
    "~/.oppminer/oppminer.db".to_string()
}

pub(super) fn host() -> String {
    "127.0.0.1".to_string()
}

pub(super) fn port() -> u16 {
    8080
}
