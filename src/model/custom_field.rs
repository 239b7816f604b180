//! User-defined custom field values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value for a user-defined field on an item.
///
/// This is a closed set: every variant must be handled exhaustively at
/// serialization boundaries. The wire format is a tagged object, e.g.
/// `{"type": "number", "value": 4.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CustomFieldValue {
    /// Free-form text.
    Text(String),
    /// A numeric value.
    Number(f64),
    /// A boolean flag.
    Boolean(bool),
    /// A point in time.
    Date(DateTime<Utc>),
}

impl CustomFieldValue {
    /// The kind of this value.
    pub fn kind(&self) -> CustomFieldKind {
        match self {
            CustomFieldValue::Text(_) => CustomFieldKind::Text,
            CustomFieldValue::Number(_) => CustomFieldKind::Number,
            CustomFieldValue::Boolean(_) => CustomFieldKind::Boolean,
            CustomFieldValue::Date(_) => CustomFieldKind::Date,
        }
    }
}

/// The kind of a custom field, used in template component definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldKind {
    Text,
    Number,
    Boolean,
    Date,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_wire_format() {
        let value = CustomFieldValue::Number(4.5);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 4.5}));

        let back: CustomFieldValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_date_roundtrip() {
        let value = CustomFieldValue::Date(Utc::now());
        let json = serde_json::to_string(&value).unwrap();
        let back: CustomFieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            CustomFieldValue::Text("x".into()).kind(),
            CustomFieldKind::Text
        );
        assert_eq!(CustomFieldValue::Boolean(true).kind(), CustomFieldKind::Boolean);
    }
}
