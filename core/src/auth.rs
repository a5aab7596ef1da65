//! `Authorization` header values for Freshdesk.
//!
//! Freshdesk authenticates API keys as Basic credentials whose password is
//! ignored; by convention it is `X`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// `Basic base64("<api_key>:X")`.
pub fn basic_auth(api_key: &str) -> String {
    basic_auth_with_password(api_key, "X")
}

pub fn basic_auth_with_password(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}
