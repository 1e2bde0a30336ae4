use super::schema::{Field, KeyedRecord};
use crate::keyed_fields;

/// Player profile exchanged when joining a room
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub age: i32,
    pub first_name: String,
    pub last_name: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            age: 100,
            first_name: "dark".to_string(),
            last_name: "compet".to_string(),
        }
    }
}

impl Profile {
    /// Derived from the name fields; never sent on the wire
    pub fn full_name(&self) -> String {
        format!("{}{}", self.first_name, self.last_name)
    }
}

impl KeyedRecord for Profile {
    const TYPE_NAME: &'static str = "Profile";

    fn fields() -> Vec<Field<Self>> {
        keyed_fields![Profile {
            0 => age,
            1 => first_name,
            2 => last_name,
        }]
    }
}

/// A line of chat text broadcast within a room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatLine {
    pub sender: String,
    pub body: String,
    pub sent_at_ms: u64,
}

impl ChatLine {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        let sent_at_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            sender: sender.into(),
            body: body.into(),
            sent_at_ms,
        }
    }
}

impl KeyedRecord for ChatLine {
    const TYPE_NAME: &'static str = "ChatLine";

    fn fields() -> Vec<Field<Self>> {
        keyed_fields![ChatLine {
            0 => sender,
            1 => body,
            2 => sent_at_ms,
        }]
    }
}
