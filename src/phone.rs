//! Recipient address normalization.

use crate::consts;
use std::fmt;

/// A recipient identifier in the messaging client's address format,
/// e.g. `+12345678901@c.us`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress(String);

impl NormalizedAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keeps digits plus a `+` in first position and drops everything else
fn strip_to_dialable(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let mut cleaned = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        cleaned.push('+');
    }
    cleaned.extend(trimmed.chars().filter(char::is_ascii_digit));
    cleaned
}

/// Validates and canonicalizes a raw phone number.
///
/// Returns `None` when the cleaned number is shorter than
/// [PHONE_MIN_LEN](consts::PHONE_MIN_LEN) or longer than
/// [PHONE_MAX_LEN](consts::PHONE_MAX_LEN) characters.
///
/// An already normalized address strips back to the same digits,
/// so normalizing twice never duplicates the suffix.
pub fn normalize(raw: &str) -> Option<NormalizedAddress> {
    let cleaned = strip_to_dialable(raw);
    if !(consts::PHONE_MIN_LEN..=consts::PHONE_MAX_LEN).contains(&cleaned.len()) {
        return None;
    }

    Some(NormalizedAddress(format!(
        "{cleaned}{suffix}",
        suffix = consts::CHAT_ADDRESS_SUFFIX
    )))
}
