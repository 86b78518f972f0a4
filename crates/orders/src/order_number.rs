//! Human-readable order numbers (`ORD-` + 8 uppercase hex digits).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PREFIX: &str = "ORD-";
const TOKEN_LEN: usize = 8;

/// Globally unique, human-readable order identifier, distinct from the numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let token = value
            .strip_prefix(PREFIX)
            .ok_or_else(|| format!("order number must start with {PREFIX:?}: {value:?}"))?;
        let well_formed = token.len() == TOKEN_LEN
            && token
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
        if !well_formed {
            return Err(format!("malformed order number: {value:?}"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OrderNumber::parse(value)
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

/// Source of candidate order numbers.
///
/// Candidates only need to be collision-resistant; the ledger is the authority on
/// uniqueness and the placement engine retries on a clash.
pub trait OrderNumberGenerator: Send + Sync {
    fn next_number(&self) -> OrderNumber;
}

/// Draws the token from a random (v4) UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOrderNumbers;

impl OrderNumberGenerator for RandomOrderNumbers {
    fn next_number(&self) -> OrderNumber {
        let hex = Uuid::new_v4().simple().to_string();
        OrderNumber(format!("{PREFIX}{}", hex[..TOKEN_LEN].to_ascii_uppercase()))
    }
}
