mod admin;
mod audit_log;
mod order;
mod product;
mod settings;
mod stats;

pub use admin::*;
pub use audit_log::*;
pub use order::*;
pub use product::*;
pub use settings::*;
pub use stats::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a double Option field where:
/// - Field absent in JSON → None (don't update)
/// - Field present with null → Some(None) (set to NULL in DB)
/// - Field present with value → Some(Some(value)) (set to value)
pub(crate) fn deserialize_optional_nullable<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<T> = Option::deserialize(deserializer)?;
    Ok(Some(value))
}

/// Accepts `http://` and `https://` URLs with a non-empty remainder.
pub(crate) fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    ["http://", "https://"].iter().any(|scheme| {
        value.len() > scheme.len()
            && value[..scheme.len()].eq_ignore_ascii_case(scheme)
            && !value[scheme.len()..].contains(char::is_whitespace)
    })
}
