//! Explicit per-type schemas for keyed records.
//!
//! Each record type lists its wire fields as `(key, name, getter, setter)`
//! entries. The list is validated once when a codec is registered; nothing
//! is looked up by reflection at encode/decode time.

use super::error::{CodecError, Result};
use super::keyed::FieldValue;
use std::collections::HashMap;

/// Largest key accepted in a schema.
pub const MAX_FIELD_KEY: u32 = u16::MAX as u32;

pub type Getter<T> = fn(&T) -> FieldValue;
pub type Setter<T> = fn(&mut T, FieldValue) -> Result<()>;

/// One persisted field of a keyed record
pub struct Field<T> {
    pub key: u32,
    pub name: &'static str,
    pub get: Getter<T>,
    pub set: Setter<T>,
}

impl<T> Field<T> {
    pub fn new(key: u32, name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        Self { key, name, get, set }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish()
    }
}

/// A record type that can travel over the session as a binary frame.
///
/// Keys are part of the wire format: they must be unique within the type and
/// must never be reassigned to a different field across protocol versions.
/// Renaming a Rust field is safe. Fields that are derived from other fields
/// are left out of [`KeyedRecord::fields`] and never reach the wire.
pub trait KeyedRecord: Default + Send + 'static {
    const TYPE_NAME: &'static str;

    fn fields() -> Vec<Field<Self>>;
}

/// Validated, ordered field list for a record type
#[derive(Debug)]
pub struct Schema<T> {
    fields: Vec<Field<T>>,
    by_key: HashMap<u32, usize>,
}

impl<T: KeyedRecord> Schema<T> {
    pub fn of() -> Result<Self> {
        Self::from_fields(T::TYPE_NAME, T::fields())
    }
}

impl<T> Schema<T> {
    pub fn from_fields(type_name: &'static str, fields: Vec<Field<T>>) -> Result<Self> {
        let mut by_key: HashMap<u32, usize> = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if field.key > MAX_FIELD_KEY {
                return Err(CodecError::KeyOutOfRange {
                    type_name,
                    field: field.name,
                    key: field.key,
                    max: MAX_FIELD_KEY,
                });
            }
            if let Some(&existing) = by_key.get(&field.key) {
                return Err(CodecError::DuplicateKey {
                    type_name,
                    key: field.key,
                    first: fields[existing].name,
                    second: field.name,
                });
            }
            by_key.insert(field.key, index);
        }
        Ok(Self { fields, by_key })
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn field(&self, key: u32) -> Option<&Field<T>> {
        self.by_key.get(&key).map(|&index| &self.fields[index])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Declare the keyed fields of a record.
///
/// ```rust,ignore
/// impl KeyedRecord for Profile {
///     const TYPE_NAME: &'static str = "Profile";
///     fn fields() -> Vec<Field<Self>> {
///         keyed_fields![Profile {
///             0 => age,
///             1 => first_name,
///         }]
///     }
/// }
/// ```
#[macro_export]
macro_rules! keyed_fields {
    ($ty:ident { $($key:literal => $field:ident),* $(,)? }) => {
        vec![$(
            $crate::messages::schema::Field::<$ty>::new(
                $key,
                stringify!($field),
                |record: &$ty| $crate::messages::keyed::ToField::to_field(&record.$field),
                |record: &mut $ty, value| {
                    record.$field = $crate::messages::keyed::FromField::from_field(value)?;
                    Ok(())
                },
            )
        ),*]
    };
}
