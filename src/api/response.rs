//! Response decoding
//!
//! Collection responses look like
//! `{ "Id": <sync token>, "Status": "OK", ..., "<PluralKey>": [ ... ] }`.
//! A success status with records flagged `HasErrors` is still a success:
//! each record carries its own [`Outcome`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::Entity;
use super::http::RawResponse;
use super::resource::ResourceDescriptor;
use crate::error::{ApiError, Result};

/// One business-rule failure reported for a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Per-record result inside a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected { errors: Vec<ValidationError> },
}

impl Outcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected { .. })
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Outcome::Accepted => &[],
            Outcome::Rejected { errors } => errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record<E = Entity> {
    pub entity: E,
    pub outcome: Outcome,
    pub warnings: Vec<ValidationError>,
}

impl<E> Record<E> {
    pub fn has_errors(&self) -> bool {
        self.outcome.is_rejected()
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        self.outcome.errors()
    }
}

/// Decoded collection envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<E = Entity> {
    /// Sync token accompanying the response
    pub id: Option<String>,
    pub status: Option<String>,
    pub provider_name: Option<String>,
    pub date_time_utc: Option<String>,
    pub records: Vec<Record<E>>,
}

impl<E> Collection<E> {
    pub fn empty() -> Self {
        Self {
            id: None,
            status: None,
            provider_name: None,
            date_time_utc: None,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record<E>> {
        self.records.iter()
    }

    pub fn entities(&self) -> impl Iterator<Item = &E> {
        self.records.iter().map(|record| &record.entity)
    }

    pub fn first(&self) -> Option<&Record<E>> {
        self.records.first()
    }

    /// Records the server rejected, with their batch positions
    pub fn rejected(&self) -> impl Iterator<Item = (usize, &Record<E>)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.has_errors())
    }

    pub fn has_rejections(&self) -> bool {
        self.records.iter().any(Record::has_errors)
    }

    pub fn into_entities(self) -> Vec<E> {
        self.records.into_iter().map(|record| record.entity).collect()
    }
}

impl<E> IntoIterator for Collection<E> {
    type Item = Record<E>;
    type IntoIter = std::vec::IntoIter<Record<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a Collection<E> {
    type Item = &'a Record<E>;
    type IntoIter = std::slice::Iter<'a, Record<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPayload {
    pub bytes: Bytes,
    pub content_type: String,
    pub declared_length: Option<u64>,
}

impl BinaryPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Shape the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// JSON collection, optionally with an exact record count
    Collection { expected_len: Option<usize> },
    /// Raw bytes of the given media type
    Binary { media_type: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<E = Entity> {
    Collection(Collection<E>),
    Binary(BinaryPayload),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder;

impl ResponseDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode<E: DeserializeOwned>(
        &self,
        response: RawResponse,
        resource: &ResourceDescriptor,
        shape: ExpectedShape,
    ) -> Result<Decoded<E>> {
        match shape {
            ExpectedShape::Collection { expected_len } => self
                .decode_collection(response, resource, expected_len)
                .map(Decoded::Collection),
            ExpectedShape::Binary { media_type } => {
                self.decode_binary(response, media_type).map(Decoded::Binary)
            }
        }
    }

    /// Non-success statuses become [`ApiError::Http`]
    pub fn check_status(&self, response: &RawResponse) -> Result<()> {
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::Http {
                status: response.status,
                body: response.body_text(),
            })
        }
    }

    pub fn decode_collection<E: DeserializeOwned>(
        &self,
        response: RawResponse,
        resource: &ResourceDescriptor,
        expected_len: Option<usize>,
    ) -> Result<Collection<E>> {
        self.check_status(&response)?;

        if response.status == 204 && response.body.is_empty() {
            return Ok(Collection::empty());
        }

        let value: Value = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::Decode(format!("invalid JSON body: {}", e)))?;
        let Value::Object(mut envelope) = value else {
            return Err(ApiError::Decode("expected a JSON object envelope".to_string()));
        };

        let items = match envelope.remove(resource.plural_key) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ApiError::Decode(format!(
                    "`{}` is not an array",
                    resource.plural_key
                )));
            }
            None => {
                return Err(ApiError::Decode(format!(
                    "response has no `{}` collection",
                    resource.plural_key
                )));
            }
        };

        if let Some(expected) = expected_len {
            if items.len() != expected {
                return Err(ApiError::Decode(format!(
                    "submitted {} {} but response holds {}",
                    expected,
                    resource.plural_key,
                    items.len()
                )));
            }
        }

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                decode_record(item, resource).map_err(|e| {
                    ApiError::Decode(format!("{}[{}]: {}", resource.plural_key, index, e))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Collection {
            id: string_field(&envelope, "Id"),
            status: string_field(&envelope, "Status"),
            provider_name: string_field(&envelope, "ProviderName"),
            date_time_utc: string_field(&envelope, "DateTimeUTC"),
            records,
        })
    }

    pub fn decode_binary(&self, response: RawResponse, media_type: &str) -> Result<BinaryPayload> {
        self.check_status(&response)?;

        let actual = response.content_type().unwrap_or_default().to_string();
        if !media_type_matches(&actual, media_type) {
            return Err(ApiError::UnexpectedContentType {
                expected: media_type.to_string(),
                actual,
            });
        }

        let declared_length = response.content_length();
        Ok(BinaryPayload {
            bytes: response.body,
            content_type: actual,
            declared_length,
        })
    }
}

fn decode_record<E: DeserializeOwned>(
    item: Value,
    resource: &ResourceDescriptor,
) -> std::result::Result<Record<E>, String> {
    let Value::Object(fields) = &item else {
        return Err("record is not a JSON object".to_string());
    };

    let flagged = fields
        .get(resource.has_errors_field)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let errors = messages(fields, resource.validation_errors_field)?;
    let warnings = messages(fields, resource.warnings_field)?;

    let outcome = if flagged || !errors.is_empty() {
        Outcome::Rejected { errors }
    } else {
        Outcome::Accepted
    };

    let entity = serde_json::from_value(item).map_err(|e| e.to_string())?;
    Ok(Record {
        entity,
        outcome,
        warnings,
    })
}

fn messages(
    fields: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Vec<ValidationError>, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| format!("malformed `{}`: {}", key, e)),
    }
}

fn string_field(envelope: &Map<String, Value>, key: &str) -> Option<String> {
    envelope.get(key).and_then(Value::as_str).map(str::to_string)
}

fn media_type_matches(actual: &str, expected: &str) -> bool {
    actual
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|media_type| media_type.eq_ignore_ascii_case(expected))
}
