use super::error::{CodecError, Result};
use super::keyed::FieldValue;
use super::schema::{KeyedRecord, Schema};
use serde::Deserialize;
use tracing::{debug, instrument, trace, warn};

/// Default upper bound for an encoded record (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Binary codec for one registered record type.
///
/// Encoded records are MessagePack maps from field key to value. Decoding
/// starts from `T::default()`, so keys missing from the payload keep their
/// declared defaults, and keys the schema does not know are skipped.
#[derive(Debug)]
pub struct MessageCodec<T> {
    schema: Schema<T>,
    max_message_size: usize,
}

impl<T: KeyedRecord> MessageCodec<T> {
    /// Validate `T`'s schema and build a codec for it
    pub fn register() -> Result<Self> {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Result<Self> {
        let schema = Schema::<T>::of()?;
        debug!(
            record = T::TYPE_NAME,
            fields = schema.len(),
            "Registered keyed record codec"
        );
        Ok(Self {
            schema,
            max_message_size,
        })
    }

    pub fn schema(&self) -> &Schema<T> {
        &self.schema
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Keyed map form of a record, in schema order
    pub fn to_value(&self, record: &T) -> FieldValue {
        FieldValue::Map(
            self.schema
                .fields()
                .iter()
                .map(|field| (FieldValue::UInt(u64::from(field.key)), (field.get)(record)))
                .collect(),
        )
    }

    /// Build a record from its keyed map form
    pub fn from_value(&self, value: FieldValue) -> Result<T> {
        let entries = match value {
            FieldValue::Map(entries) => entries,
            other => return Err(CodecError::NotAMap { found: other.kind() }),
        };

        let mut record = T::default();
        for (key, value) in entries {
            let Some(field) = key.as_field_key().and_then(|key| self.schema.field(key)) else {
                trace!(record = T::TYPE_NAME, key = ?key, "Skipping unknown field key");
                continue;
            };
            (field.set)(&mut record, value).map_err(|e| CodecError::InvalidField {
                type_name: T::TYPE_NAME,
                field: field.name,
                key: field.key,
                source: Box::new(e),
            })?;
        }
        Ok(record)
    }

    #[instrument(level = "trace", skip(self, record), fields(record = T::TYPE_NAME))]
    pub fn encode(&self, record: &T) -> Result<Vec<u8>> {
        let bytes = rmp_serde::to_vec(&self.to_value(record))?;
        self.validate_size(bytes.len())?;
        trace!(size = bytes.len(), "Encoded keyed record");
        Ok(bytes)
    }

    #[instrument(level = "trace", skip(self, payload), fields(record = T::TYPE_NAME, size = payload.len()))]
    pub fn decode(&self, payload: &[u8]) -> Result<T> {
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }
        self.validate_size(payload.len())?;
        let mut deserializer = rmp_serde::Deserializer::new(std::io::Cursor::new(payload));
        let value = FieldValue::deserialize(&mut deserializer)?;
        let consumed = usize::try_from(deserializer.position()).unwrap_or(usize::MAX);
        if consumed < payload.len() {
            return Err(CodecError::TrailingBytes {
                count: payload.len() - consumed,
            });
        }
        self.from_value(value)
    }

    fn validate_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            warn!(
                size = size,
                max_size = self.max_message_size,
                "Keyed record exceeds maximum message size"
            );
            return Err(CodecError::TooLarge {
                size,
                max_size: self.max_message_size,
            });
        }
        Ok(())
    }
}
