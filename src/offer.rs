// Priced room offers and the aggregate result they are collected into

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

pub const DEFAULT_CURRENCY: &str = "EUR";

// One priced room/hotel combination returned by a provider for one group size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default, deserialize_with = "lenient_string")]
    pub hotel_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hotel_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_id: String,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub room_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub max_people: u32,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default = "default_currency", deserialize_with = "lenient_currency")]
    pub currency: String,
    #[serde(default, alias = "provider", deserialize_with = "lenient_string")]
    pub provider_name: String,
    #[serde(default)]
    pub raw: Value,
}

// Identifies the same offer across chunks: unique per provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub provider_name: String,
    pub room_id: String,
}

impl Offer {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            provider_name: self.provider_name.clone(),
            room_id: self.room_id.clone(),
        }
    }

    // Decodes one loosely-shaped item; anything that is not a JSON object is dropped
    pub fn from_loose_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

// Prices are always finite and non-negative; anything else collapses to zero
pub fn normalize_price(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}

pub fn parse_price(value: &Value) -> f64 {
    match value {
        Value::Number(n) => normalize_price(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => normalize_price(s.trim().parse::<f64>().unwrap_or(0.0)),
        _ => 0.0,
    }
}

// Stable ascending sort; equal prices keep their insertion order
pub fn sort_by_price(offers: &mut [Offer]) {
    offers.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
}

/// All offers collected for one request, kept sorted ascending by price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    offers: Vec<Offer>,
}

impl AggregateResult {
    pub fn from_offers(mut offers: Vec<Offer>) -> Self {
        sort_by_price(&mut offers);
        Self { offers }
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn into_offers(self) -> Vec<Offer> {
        self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

fn lenient_currency<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(default_currency))
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0))
}

fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(parse_price(&value))
}
