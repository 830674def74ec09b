use crate::domain::{
    decode, encode, AttributeType, AttributeValue, CodecError, DomainError, DomainResult,
};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Payload key carrying the reporting application
pub const APPLICATION_KEY: &str = "application";

/// Payload key carrying the reporting device
pub const DEVICE_ID_KEY: &str = "device_id";

/// One named statistic, stored as tag + canonical text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    key: String,
    attribute_type: AttributeType,
    value: String,
}

impl Attribute {
    /// Encode a typed value into a new attribute
    pub fn new(key: impl Into<String>, value: &AttributeValue) -> Self {
        let (attribute_type, value) = encode(value);
        Self {
            key: key.into(),
            attribute_type,
            value,
        }
    }

    /// Rebuild an attribute from its stored columns without decoding it
    pub fn from_stored(
        key: impl Into<String>,
        attribute_type: AttributeType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            attribute_type,
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Canonical stored text
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn decoded_value(&self) -> Result<AttributeValue, CodecError> {
        decode(self.attribute_type, &self.value)
    }
}

/// Input for assembling an attribute record from an ingestion payload
#[derive(Debug, Clone, Validate)]
pub struct NewAttributeRecord {
    #[garde(length(min = 1))]
    pub application: String,
    #[garde(length(min = 1))]
    pub device_id: String,
    /// Remaining payload fields in arrival order; later duplicates win
    #[garde(skip)]
    pub fields: Vec<(String, Value)>,
}

impl NewAttributeRecord {
    /// Split a raw payload object into identity and statistic fields.
    ///
    /// Absent or non-string identity values become empty strings so that
    /// validation rejects them.
    pub fn from_payload(mut payload: Map<String, Value>) -> Self {
        let application = take_identity(&mut payload, APPLICATION_KEY);
        let device_id = take_identity(&mut payload, DEVICE_ID_KEY);

        Self {
            application,
            device_id,
            fields: payload.into_iter().collect(),
        }
    }
}

fn take_identity(payload: &mut Map<String, Value>, key: &str) -> String {
    match payload.remove(key) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

/// Aggregate for a single ingestion event.
///
/// Built once per request and never mutated afterwards; attributes are keyed
/// by name so a record never holds two attributes with the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRecord {
    application: String,
    device_id: String,
    created_at: DateTime<Utc>,
    attributes: BTreeMap<String, Attribute>,
}

impl AttributeRecord {
    /// Validate identity and encode every field into an attribute.
    ///
    /// Identity is checked before any field is classified. The first field
    /// without an encoding aborts the whole record.
    pub fn build(input: NewAttributeRecord) -> DomainResult<Self> {
        crate::garde::validate_struct(&input)?;

        let mut attributes = BTreeMap::new();
        for (key, raw) in input.fields {
            let value = AttributeValue::classify(&raw).map_err(|e| match e {
                CodecError::UnsupportedType(kind) => DomainError::UnsupportedType {
                    key: key.clone(),
                    kind: kind.to_string(),
                },
                other => DomainError::DecodeError(other),
            })?;
            let attribute = Attribute::new(key.clone(), &value);
            attributes.insert(key, attribute);
        }

        debug!(
            application = %input.application,
            device_id = %input.device_id,
            attribute_count = attributes.len(),
            "assembled attribute record"
        );

        Ok(Self {
            application: input.application,
            device_id: input.device_id,
            created_at: Utc::now(),
            attributes,
        })
    }

    /// Rebuild a record from persisted rows
    pub fn restore(
        application: String,
        device_id: String,
        created_at: DateTime<Utc>,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Self {
        Self {
            application,
            device_id,
            created_at,
            attributes: attributes
                .into_iter()
                .map(|attribute| (attribute.key.clone(), attribute))
                .collect(),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// Attributes ordered by key
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Decoded name → value view of the record
    pub fn data(&self) -> Result<BTreeMap<String, AttributeValue>, CodecError> {
        self.attributes
            .iter()
            .map(|(key, attribute)| Ok((key.clone(), attribute.decoded_value()?)))
            .collect()
    }
}
