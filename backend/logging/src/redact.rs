//! Log Redaction
//!
//! Scrubs model-provider API keys and bearer tokens from strings before they are logged.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:gsk|sk)[-_][A-Za-z0-9_\-]{16,}").expect("valid api key pattern")
});
static BEARER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+[A-Za-z0-9\-\._~+/]+=*").expect("valid bearer pattern")
});

/// Redacts provider secrets in a string.
pub fn redact_secrets(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "Bearer [REDACTED]");
    API_KEY_RE
        .replace_all(&redacted, "[REDACTED_KEY]")
        .into_owned()
}
