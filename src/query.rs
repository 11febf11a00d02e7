// Search query model and the request validation that guards the orchestrator

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const MIN_GROUP_SIZE: u32 = 1;
pub const MAX_GROUP_SIZE: u32 = 10;

// Providers expect US-style dates on the wire
const WIRE_DATE_FORMAT: &str = "%m/%d/%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing query")]
    MissingQuery,

    #[error("Invalid ski_site")]
    InvalidSkiSite,

    #[error("Invalid group_size")]
    InvalidGroupSize,

    #[error("Invalid dates")]
    InvalidDates,
}

/// A validated lodging search. Fields are read-only once constructed; per-task
/// variants are derived with [`SearchQuery::with_group_size`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    ski_site: i64,
    #[serde(serialize_with = "serialize_wire_date")]
    from_date: NaiveDate,
    #[serde(serialize_with = "serialize_wire_date")]
    to_date: NaiveDate,
    group_size: u32,
}

impl SearchQuery {
    pub fn new(
        ski_site: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        group_size: u32,
    ) -> Result<Self, ValidationError> {
        if !(MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&group_size) {
            return Err(ValidationError::InvalidGroupSize);
        }
        if to_date < from_date {
            return Err(ValidationError::InvalidDates);
        }

        Ok(Self {
            ski_site,
            from_date,
            to_date,
            group_size,
        })
    }

    // Accepts either a bare query object or one wrapped under "query".
    // Numeric fields may arrive as JSON numbers or numeric strings.
    pub fn from_request(body: &Value) -> Result<Self, ValidationError> {
        let query = match body {
            Value::Object(map) if map.contains_key("query") => &map["query"],
            other => other,
        };
        let Value::Object(fields) = query else {
            return Err(ValidationError::MissingQuery);
        };

        let ski_site = coerce_number(fields.get("ski_site"))
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            // i64::MAX as f64 rounds up to 2^63, which is out of range
            .filter(|n| n.abs() < i64::MAX as f64)
            .map(|n| n as i64)
            .ok_or(ValidationError::InvalidSkiSite)?;

        let group_size = coerce_number(fields.get("group_size"))
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .filter(|n| (MIN_GROUP_SIZE as f64..=MAX_GROUP_SIZE as f64).contains(n))
            .map(|n| n as u32)
            .ok_or(ValidationError::InvalidGroupSize)?;

        let from_date = date_field(fields, "from_date")?;
        let to_date = date_field(fields, "to_date")?;

        Self::new(ski_site, from_date, to_date, group_size)
    }

    pub fn ski_site(&self) -> i64 {
        self.ski_site
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    pub fn group_size(&self) -> u32 {
        self.group_size
    }

    // Every room capacity that can host the requested party
    pub fn group_sizes(&self) -> RangeInclusive<u32> {
        self.group_size..=MAX_GROUP_SIZE
    }

    pub fn with_group_size(&self, group_size: u32) -> Self {
        Self {
            group_size,
            ..self.clone()
        }
    }
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn date_field(fields: &Map<String, Value>, name: &str) -> Result<NaiveDate, ValidationError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .and_then(parse_date)
        .ok_or(ValidationError::InvalidDates)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, ISO_DATE_FORMAT))
        .ok()
}

fn serialize_wire_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(WIRE_DATE_FORMAT))
}
