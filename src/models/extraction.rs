use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Deserializer, Serialize};

use crate::format::{decimal_from_json, parse_amount};

/// One row of the DARF tax-composition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_amount")]
    pub principal: BigDecimal,
    #[serde(deserialize_with = "de_amount")]
    pub multa: BigDecimal, // penalty
    #[serde(deserialize_with = "de_amount")]
    pub juros: BigDecimal, // interest
    #[serde(deserialize_with = "de_amount")]
    pub total: BigDecimal,
}

/// Structured data the extractor returns for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(alias = "header_total", deserialize_with = "de_amount")]
    pub header_total: BigDecimal,
    pub items: Vec<LineItem>,
}

impl ExtractionResult {
    /// Plain sum of every item total, regardless of category.
    pub fn items_total(&self) -> BigDecimal {
        self.items
            .iter()
            .fold(BigDecimal::zero(), |acc, item| acc + &item.total)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

/// Accepts JSON numbers as well as numeric strings (`"1234.56"` or `"1.234,56"`).
/// Unreadable or negative amounts are errors, never zero.
fn de_amount<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(number) => decimal_from_json(&number),
        RawAmount::Text(text) => parse_amount(&text),
    };
    match amount {
        Some(amount) if amount >= BigDecimal::zero() => Ok(amount),
        _ => Err(serde::de::Error::custom("amount is not a non-negative number")),
    }
}
