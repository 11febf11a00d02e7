// HotelsSimulator provider: HTTP pricing backend answering one group size per call

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::SimulatorConfig;
use crate::offer::{parse_price, Offer, DEFAULT_CURRENCY};
use crate::provider::{with_retries, HotelsProvider, ProviderError};
use crate::query::SearchQuery;

pub const SIMULATOR_PROVIDER_NAME: &str = "HotelsSimulator";

// The backend answers in one of three envelopes; decoded once, here
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SimulatorEnvelope {
    Wrapped {
        #[serde(rename = "statusCode", default)]
        status_code: Option<u16>,
        body: SimulatorBody,
    },
    Bare(BareAccommodations),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SimulatorBody {
    // JSON document encoded as a string
    Encoded(String),
    Structured(BodyPayload),
}

#[derive(Debug, Default, Deserialize)]
struct BodyPayload {
    #[serde(default)]
    accommodations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BareAccommodations {
    accommodations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Accommodation {
    #[serde(deserialize_with = "hotel_code")]
    hotel_code: String,
    #[serde(default)]
    hotel_name: String,
    #[serde(default)]
    prices_info: Option<PricesInfo>,
    #[serde(default)]
    hotel_descriptive_content: Option<DescriptiveContent>,
}

#[derive(Debug, Deserialize)]
struct PricesInfo {
    #[serde(rename = "AmountAfterTax", default)]
    amount_after_tax: Value,
}

#[derive(Debug, Deserialize)]
struct DescriptiveContent {
    #[serde(rename = "PricesInfo", default)]
    prices_info: Option<PricesInfo>,
}

// Codes arrive as strings or bare numbers; null or any other shape is unusable
fn hotel_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(code) => Ok(code),
        Value::Number(code) => Ok(code.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unusable HotelCode: {}",
            other
        ))),
    }
}

// Absent, null, empty and zero amounts defer to the descriptive content.
// Anything else is taken as given, even when it parses to zero.
fn is_unset_amount(amount: &Value) -> bool {
    match amount {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        _ => false,
    }
}

impl Accommodation {
    fn price(&self) -> f64 {
        let primary = self.prices_info.as_ref().map(|p| &p.amount_after_tax);
        let amount = match primary {
            Some(amount) if !is_unset_amount(amount) => Some(amount),
            _ => self
                .hotel_descriptive_content
                .as_ref()
                .and_then(|c| c.prices_info.as_ref())
                .map(|p| &p.amount_after_tax),
        };
        amount.map_or(0.0, parse_price)
    }

    fn into_offer(self, group_size: u32, raw: Value) -> Offer {
        let price = self.price();
        Offer {
            room_id: format!("{}:{}:{}", self.hotel_code, group_size, price),
            hotel_id: self.hotel_code,
            hotel_name: self.hotel_name,
            room_name: None,
            max_people: group_size,
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            provider_name: SIMULATOR_PROVIDER_NAME.to_string(),
            raw,
        }
    }
}

pub(crate) fn decode_response(body: &[u8], group_size: u32) -> Result<Vec<Offer>, ProviderError> {
    let envelope: SimulatorEnvelope = serde_json::from_slice(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("unrecognised envelope: {}", e)))?;

    let accommodations = match envelope {
        SimulatorEnvelope::Wrapped {
            status_code: Some(status_code),
            ..
        } if status_code >= 400 => {
            return Err(ProviderError::ApiResponseError {
                status_code,
                is_retryable: status_code >= 500,
            });
        }
        SimulatorEnvelope::Wrapped { body, .. } => match body {
            SimulatorBody::Encoded(text) => {
                serde_json::from_str::<BodyPayload>(&text)
                    .map_err(|e| ProviderError::MalformedResponse(format!("encoded body: {}", e)))?
                    .accommodations
            }
            SimulatorBody::Structured(payload) => payload.accommodations,
        },
        SimulatorEnvelope::Bare(bare) => bare.accommodations,
    };

    let mut offers = Vec::with_capacity(accommodations.len());
    for raw in accommodations {
        match serde_json::from_value::<Accommodation>(raw.clone()) {
            Ok(accommodation) => offers.push(accommodation.into_offer(group_size, raw)),
            Err(e) => debug!(error = %e, "skipping accommodation without hotel code"),
        }
    }
    Ok(offers)
}

pub struct HotelsSimulatorProvider {
    client: reqwest::Client,
    config: SimulatorConfig,
}

impl HotelsSimulatorProvider {
    pub fn new(config: SimulatorConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn fetch_once(&self, query: &SearchQuery) -> Result<Vec<Offer>, ProviderError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ApiResponseError {
                status_code: status.as_u16(),
                is_retryable: status.is_server_error(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        decode_response(&body, query.group_size())
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.config.timeout_ms)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl HotelsProvider for HotelsSimulatorProvider {
    fn name(&self) -> &str {
        SIMULATOR_PROVIDER_NAME
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Offer>, ProviderError> {
        with_retries(&self.config.retry, SIMULATOR_PROVIDER_NAME, || {
            self.fetch_once(query)
        })
        .await
    }
}
