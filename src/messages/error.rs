use thiserror::Error;

/// Errors raised while registering a schema or encoding/decoding a keyed record
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Duplicate field key {key} in {type_name} (fields '{first}' and '{second}')")]
    DuplicateKey {
        type_name: &'static str,
        key: u32,
        first: &'static str,
        second: &'static str,
    },

    #[error("Field key {key} of {type_name}.{field} exceeds maximum key {max}")]
    KeyOutOfRange {
        type_name: &'static str,
        field: &'static str,
        key: u32,
        max: u32,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value {value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("Invalid value for {type_name}.{field} (key {key}): {source}")]
    InvalidField {
        type_name: &'static str,
        field: &'static str,
        key: u32,
        #[source]
        source: Box<CodecError>,
    },

    #[error("Payload is not a keyed map (found {found})")]
    NotAMap { found: &'static str },

    #[error("Payload of {size} bytes exceeds maximum of {max_size} bytes")]
    TooLarge { size: usize, max_size: usize },

    #[error("Payload has {count} unread bytes after the record")]
    TrailingBytes { count: usize },

    #[error("Empty payload")]
    Empty,

    #[error("Malformed payload: {0}")]
    Malformed(#[from] rmp_serde::decode::Error),

    #[error("Encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
