//! Arbitrary-width numeric fields and their base-10 rendering.
//!
//! Gas, value, nonce and signature fields arrive as literals (`0x`-hex or
//! base-10 text). They are never squeezed into machine words: a
//! [`Quantity`] keeps the original literal and renders it through a 256-bit
//! integer into the decimal text that is bound to `NUMERIC` columns.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::IndexerError;

/// What to do with a literal that does not parse as an unsigned integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericPolicy {
    /// Store `0` and log a warning naming the field.
    #[default]
    Lenient,
    /// Fail the whole block; the gap scanner retries it later.
    Strict,
}

/// A numeric literal as decoded from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(String);

impl Quantity {
    pub fn new(literal: impl Into<String>) -> Self {
        Self(literal.into())
    }

    /// The literal exactly as received.
    pub fn literal(&self) -> &str {
        &self.0
    }

    /// Parse the literal. `0x`, `0o` and `0b` prefixes select the radix,
    /// anything else is read as base 10. An absent (empty) literal is zero.
    pub fn value(&self) -> Option<U256> {
        let literal = self.0.trim();
        if literal.is_empty() {
            return Some(U256::ZERO);
        }
        U256::from_str(literal).ok()
    }

    /// Base-10 text of the literal, or `None` if it is malformed.
    pub fn to_decimal(&self) -> Option<String> {
        self.value().map(|v| v.to_string())
    }

    /// Base-10 text of the literal under `policy`.
    pub fn render(&self, field: &str, policy: NumericPolicy) -> Result<String, IndexerError> {
        match self.to_decimal() {
            Some(text) => Ok(text),
            None => match policy {
                NumericPolicy::Lenient => {
                    tracing::warn!(field, literal = %self.0, "malformed numeric literal; storing 0");
                    Ok("0".to_string())
                }
                NumericPolicy::Strict => Err(IndexerError::Numeric {
                    field: field.to_string(),
                    literal: self.0.clone(),
                }),
            },
        }
    }
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<U256> for Quantity {
    fn from(v: U256) -> Self {
        Self(v.to_string())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Producers emit JSON strings or bare JSON numbers for these fields. Numbers
// keep their exact text; anything that is not an unsigned integer is left
// for `render` to judge under the configured policy.
impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self(s),
            Value::Number(n) => Self(n.to_string()),
            Value::Null => Self::default(),
            other => Self(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_literal_keeps_full_precision() {
        let q = Quantity::new("123456789012345678901234567890");
        assert_eq!(q.to_decimal().as_deref(), Some("123456789012345678901234567890"));
    }

    #[test]
    fn hex_literal_renders_as_decimal() {
        assert_eq!(Quantity::new("0x10").to_decimal().as_deref(), Some("16"));
        assert_eq!(
            Quantity::new("0xde0b6b3a7640000").to_decimal().as_deref(),
            Some("1000000000000000000")
        );
    }

    #[test]
    fn malformed_literal_is_zero_when_lenient() {
        let q = Quantity::new("twelve");
        assert_eq!(q.render("gas_price", NumericPolicy::Lenient).unwrap(), "0");
    }

    #[test]
    fn absent_literal_is_zero_under_either_policy() {
        assert_eq!(Quantity::default().render("max_fee_per_gas", NumericPolicy::Strict).unwrap(), "0");
    }

    #[test]
    fn malformed_literal_fails_when_strict() {
        let err = Quantity::new("-5").render("value", NumericPolicy::Strict).unwrap_err();
        match err {
            IndexerError::Numeric { field, literal } => {
                assert_eq!(field, "value");
                assert_eq!(literal, "-5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn deserializes_from_string_or_integer() {
        let q: Quantity = serde_json::from_str("\"0x2a\"").unwrap();
        assert_eq!(q.to_decimal().as_deref(), Some("42"));
        let q: Quantity = serde_json::from_str("42").unwrap();
        assert_eq!(q.literal(), "42");
    }

    #[test]
    fn bare_big_integer_keeps_every_digit() {
        let q: Quantity = serde_json::from_str("123456789012345678901234567890").unwrap();
        assert_eq!(q.literal(), "123456789012345678901234567890");
        assert_eq!(
            q.render("value", NumericPolicy::Strict).unwrap(),
            "123456789012345678901234567890"
        );
    }

    #[test]
    fn bare_negative_integer_decodes_and_follows_policy() {
        let q: Quantity = serde_json::from_str("-5").unwrap();
        assert_eq!(q.literal(), "-5");
        assert_eq!(q.render("nonce", NumericPolicy::Lenient).unwrap(), "0");
        assert!(q.render("nonce", NumericPolicy::Strict).is_err());
    }

    #[test]
    fn non_numeric_json_is_a_malformed_literal() {
        let q: Quantity = serde_json::from_str("true").unwrap();
        assert_eq!(q.to_decimal(), None);
        let q: Quantity = serde_json::from_str("null").unwrap();
        assert_eq!(q.to_decimal().as_deref(), Some("0"));
    }
}
