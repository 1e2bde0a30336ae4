pub mod codec;
pub mod error;
pub mod keyed;
pub mod schema;
pub mod types;

pub use codec::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::CodecError;
pub use keyed::{Bytes, FieldValue, FromField, ToField};
pub use schema::{Field, KeyedRecord, Schema, MAX_FIELD_KEY};
pub use types::{ChatLine, Profile};
