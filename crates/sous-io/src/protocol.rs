//! Wire formats of the state front end: JSON out, form-encoded or JSON in.

use serde::Serialize;
use sous_core::{tags, ControlResult, CookerState};
use std::collections::BTreeMap;
use thiserror::Error;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("malformed field {0:?}")]
    MalformedPair(String),

    #[error("field {key:?} is not a number: {value:?}")]
    NotANumber { key: String, value: String },

    #[error("invalid JSON body: {0}")]
    Json(String),

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),
}

/// Tunable keys accepted in updates, for error messages.
pub fn tunable_keys() -> Vec<&'static str> {
    tags::TUNABLE.iter().map(|tag| tag.key).collect()
}

/// A parsed set of `key = number` assignments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub fields: Vec<(String, f64)>,
}

impl StateUpdate {
    /// Parse a request body by content type. A missing content type is treated as
    /// form-encoded, which is what HTML forms send.
    pub fn parse(content_type: Option<&str>, body: &str) -> Result<Self, ProtocolError> {
        let media_type = content_type
            .map(|value| value.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
        match media_type.as_deref() {
            None | Some(FORM_CONTENT_TYPE) | Some("") => Self::from_form(body),
            Some(JSON_CONTENT_TYPE) => Self::from_json(body),
            Some(other) => Err(ProtocolError::UnsupportedContentType(other.to_string())),
        }
    }

    pub fn from_form(body: &str) -> Result<Self, ProtocolError> {
        let mut fields = Vec::new();
        for pair in body.trim().split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ProtocolError::MalformedPair(pair.to_string()))?;
            let key = percent_decode(key).ok_or_else(|| ProtocolError::MalformedPair(pair.to_string()))?;
            let value =
                percent_decode(value).ok_or_else(|| ProtocolError::MalformedPair(pair.to_string()))?;
            let number = value
                .trim()
                .parse::<f64>()
                .map_err(|_| ProtocolError::NotANumber {
                    key: key.clone(),
                    value: value.clone(),
                })?;
            fields.push((key, number));
        }
        Ok(Self { fields })
    }

    pub fn from_json(body: &str) -> Result<Self, ProtocolError> {
        let object: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(body).map_err(|err| ProtocolError::Json(err.to_string()))?;
        let mut fields = Vec::with_capacity(object.len());
        for (key, value) in object {
            let number = value.as_f64().ok_or_else(|| ProtocolError::NotANumber {
                key: key.clone(),
                value: value.to_string(),
            })?;
            fields.push((key, number));
        }
        Ok(Self { fields })
    }

    /// Assign every field to `state`, stopping at the first rejected one.
    pub fn apply(&self, state: &mut CookerState) -> ControlResult<()> {
        for (key, value) in &self.fields {
            state.set_field(key, *value)?;
        }
        Ok(())
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = from_hex_digit(*bytes.get(i + 1)?)?;
                let lo = from_hex_digit(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

fn from_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// JSON error body returned with 4xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorMsg {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accepted: Vec<&'static str>,
}

pub fn encode_state(state: &CookerState) -> String {
    serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string())
}

pub fn encode_history(history: &[CookerState]) -> String {
    serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string())
}

pub fn encode_error(error: impl ToString, accepted: Vec<&'static str>) -> String {
    let msg = ErrorMsg {
        error: error.to_string(),
        accepted,
    };
    serde_json::to_string(&msg).unwrap_or_else(|_| "{}".to_string())
}
