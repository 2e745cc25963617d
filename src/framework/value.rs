//! Tri-state attribute values.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Wire encoding of a value that is not known until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// An attribute value as seen in configuration, plan, or state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AttrValue<T> {
    /// Not set.
    #[default]
    Null,
    /// Set, but only known after apply.
    Unknown,
    /// Set to a concrete value.
    Known(T),
}

impl<T> AttrValue<T> {
    /// Returns `true` for [`AttrValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for [`AttrValue::Unknown`].
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Borrows the concrete value, if any.
    #[must_use]
    pub const fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Null | Self::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

impl AttrValue<String> {
    /// Returns the string, or an empty string when null or unknown.
    #[must_use]
    pub fn value_str(&self) -> &str {
        self.known().map_or("", String::as_str)
    }
}

impl<T: Serialize> Serialize for AttrValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN_VALUE),
            Self::Known(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for AttrValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::String(ref text) if text == UNKNOWN_VALUE => Ok(Self::Unknown),
            other => serde_json::from_value(other)
                .map(Self::Known)
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!(null), AttrValue::Null)]
    #[case(json!(UNKNOWN_VALUE), AttrValue::Unknown)]
    #[case(json!("fr"), AttrValue::Known(String::from("fr")))]
    fn decodes_each_state(#[case] raw: serde_json::Value, #[case] expected: AttrValue<String>) {
        let decoded: AttrValue<String> =
            serde_json::from_value(raw).unwrap_or_else(|err| panic!("decode: {err}"));
        assert_eq!(decoded, expected);
    }

    #[test]
    fn unknown_lists_use_the_sentinel() {
        let value: AttrValue<Vec<String>> = AttrValue::Unknown;
        let encoded = serde_json::to_value(&value).unwrap_or_else(|err| panic!("encode: {err}"));
        assert_eq!(encoded, json!(UNKNOWN_VALUE));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let result = serde_json::from_value::<AttrValue<i64>>(json!("seven"));
        assert!(result.is_err());
    }

    #[test]
    fn value_str_is_empty_for_unknown() {
        assert_eq!(AttrValue::<String>::Unknown.value_str(), "");
    }
}
