//! Conversion between `DynamicValue` payloads and JSON attribute objects.
//!
//! Terraform sends objects as MessagePack. Unknown values travel as an
//! extension value and surface here as the [`UNKNOWN_VALUE`] sentinel string.
//! Encoding is driven by the schema so every attribute is present and carries
//! the type Terraform expects.

use rmpv::Value as Msgpack;
use serde_json::{Number, Value};
use thiserror::Error;

use super::proto::tfplugin6::DynamicValue;
use crate::framework::{Attribute, AttributeKind, Diagnostic, Diagnostics, Schema, UNKNOWN_VALUE};

const UNKNOWN_EXT: i8 = 0;

/// Errors raised while converting dynamic values.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DynamicValueError {
    /// The MessagePack payload could not be read.
    #[error("invalid MessagePack payload: {0}")]
    Msgpack(String),
    /// The JSON payload could not be parsed.
    #[error("invalid JSON payload: {0}")]
    Json(String),
    /// A value does not fit the type its schema declares.
    #[error("attribute \"{attribute}\" must be {expected}")]
    Mismatch {
        /// Dotted path of the attribute.
        attribute: String,
        /// Expected type.
        expected: &'static str,
    },
    /// The MessagePack payload could not be written.
    #[error("unable to write MessagePack payload: {0}")]
    Write(String),
}

impl From<DynamicValueError> for Diagnostics {
    fn from(err: DynamicValueError) -> Self {
        let summary = match err {
            DynamicValueError::Msgpack(_) | DynamicValueError::Json(_) => "Invalid Dynamic Value",
            DynamicValueError::Mismatch { .. } | DynamicValueError::Write(_) => {
                "Unable to Encode State"
            }
        };
        Self::from(Diagnostic::error(summary, err.to_string()))
    }
}

/// Decodes a dynamic value into JSON; a missing or empty value is `null`.
///
/// # Errors
///
/// Returns [`DynamicValueError`] when the payload cannot be parsed.
pub fn decode(value: Option<&DynamicValue>) -> Result<Value, DynamicValueError> {
    let Some(value) = value else {
        return Ok(Value::Null);
    };
    if !value.msgpack.is_empty() {
        let decoded = rmpv::decode::read_value(&mut value.msgpack.as_slice())
            .map_err(|err| DynamicValueError::Msgpack(err.to_string()))?;
        return Ok(to_json(decoded));
    }
    if !value.json.is_empty() {
        return serde_json::from_slice(&value.json)
            .map_err(|err| DynamicValueError::Json(err.to_string()));
    }
    Ok(Value::Null)
}

/// Encodes a JSON object as a MessagePack dynamic value shaped by `schema`.
///
/// # Errors
///
/// Returns [`DynamicValueError`] when a value does not match its attribute.
pub fn encode(schema: &Schema, value: &Value) -> Result<DynamicValue, DynamicValueError> {
    let encoded = encode_object(&schema.attributes, value, "")?;
    let mut msgpack = Vec::new();
    rmpv::encode::write_value(&mut msgpack, &encoded)
        .map_err(|err| DynamicValueError::Write(err.to_string()))?;
    Ok(DynamicValue {
        msgpack,
        json: Vec::new(),
    })
}

fn to_json(value: Msgpack) -> Value {
    match value {
        Msgpack::Nil | Msgpack::Binary(_) => Value::Null,
        Msgpack::Boolean(flag) => Value::Bool(flag),
        Msgpack::Integer(int) => int
            .as_i64()
            .map(Value::from)
            .or_else(|| int.as_u64().map(Value::from))
            .unwrap_or(Value::Null),
        Msgpack::F32(float) => float_to_json(f64::from(float)),
        Msgpack::F64(float) => float_to_json(float),
        Msgpack::String(text) => text.into_str().map_or(Value::Null, Value::String),
        Msgpack::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        Msgpack::Map(entries) => Value::Object(
            entries
                .into_iter()
                .filter_map(|(key, value)| key.as_str().map(|key| (key.to_owned(), to_json(value))))
                .collect(),
        ),
        Msgpack::Ext(_, _) => Value::String(UNKNOWN_VALUE.to_owned()),
    }
}

fn float_to_json(float: f64) -> Value {
    Number::from_f64(float).map_or(Value::Null, Value::Number)
}

fn unknown() -> Msgpack {
    Msgpack::Ext(UNKNOWN_EXT, vec![0])
}

fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

fn mismatch(attribute: &str, expected: &'static str) -> DynamicValueError {
    DynamicValueError::Mismatch {
        attribute: attribute.to_owned(),
        expected,
    }
}

fn encode_object(
    attributes: &[Attribute],
    value: &Value,
    path: &str,
) -> Result<Msgpack, DynamicValueError> {
    if value.is_null() {
        return Ok(Msgpack::Nil);
    }
    if is_unknown(value) {
        return Ok(unknown());
    }
    let Value::Object(fields) = value else {
        return Err(mismatch(path, "an object"));
    };
    attributes
        .iter()
        .map(|attribute| {
            let field = fields.get(attribute.name).unwrap_or(&Value::Null);
            let encoded =
                encode_attribute(&attribute.kind, field, &child_path(path, attribute.name))?;
            Ok((Msgpack::from(attribute.name), encoded))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Msgpack::Map)
}

fn encode_attribute(
    kind: &AttributeKind,
    value: &Value,
    path: &str,
) -> Result<Msgpack, DynamicValueError> {
    if value.is_null() {
        return Ok(Msgpack::Nil);
    }
    if is_unknown(value) {
        return Ok(unknown());
    }
    match kind {
        AttributeKind::String => match value {
            Value::String(text) => Ok(Msgpack::from(text.as_str())),
            Value::Number(number) => Ok(Msgpack::from(number.to_string())),
            Value::Bool(flag) => Ok(Msgpack::from(flag.to_string())),
            _ => Err(mismatch(path, "a string")),
        },
        AttributeKind::Int64 => encode_number(value, path),
        AttributeKind::Bool => value
            .as_bool()
            .map(Msgpack::Boolean)
            .ok_or_else(|| mismatch(path, "a bool")),
        AttributeKind::StringList => encode_list(value, path, |item, item_path| {
            encode_attribute(&AttributeKind::String, item, item_path)
        }),
        AttributeKind::ListNested(attributes) => encode_list(value, path, |item, item_path| {
            encode_object(attributes, item, item_path)
        }),
        AttributeKind::SingleNested(attributes) => encode_object(attributes, value, path),
    }
}

fn encode_number(value: &Value, path: &str) -> Result<Msgpack, DynamicValueError> {
    let number = match value {
        Value::Number(number) => number.clone(),
        Value::String(text) => text
            .parse::<i64>()
            .map(Number::from)
            .map_err(|_| mismatch(path, "a number"))?,
        _ => return Err(mismatch(path, "a number")),
    };
    if let Some(int) = number.as_i64() {
        return Ok(Msgpack::from(int));
    }
    if let Some(int) = number.as_u64() {
        return Ok(Msgpack::from(int));
    }
    number
        .as_f64()
        .map(Msgpack::F64)
        .ok_or_else(|| mismatch(path, "a number"))
}

fn encode_list(
    value: &Value,
    path: &str,
    encode_item: impl Fn(&Value, &str) -> Result<Msgpack, DynamicValueError>,
) -> Result<Msgpack, DynamicValueError> {
    let Value::Array(items) = value else {
        return Err(mismatch(path, "a list"));
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| encode_item(item, &format!("{path}.{index}")))
        .collect::<Result<Vec<_>, _>>()
        .map(Msgpack::Array)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn schema() -> Schema {
        Schema::new(
            "test",
            vec![
                Attribute::computed("id", AttributeKind::String),
                Attribute::optional("instances", AttributeKind::Int64),
                Attribute::optional("active", AttributeKind::Bool),
                Attribute::optional("ssh_keys", AttributeKind::StringList),
                Attribute::optional(
                    "open_ports",
                    AttributeKind::ListNested(vec![
                        Attribute::required("port", AttributeKind::Int64),
                        Attribute::required("protocol", AttributeKind::String),
                    ]),
                ),
            ],
        )
    }

    fn round_trip(schema: &Schema, value: &Value) -> Value {
        let encoded = encode(schema, value).unwrap_or_else(|err| panic!("encode: {err}"));
        decode(Some(&encoded)).unwrap_or_else(|err| panic!("decode: {err}"))
    }

    #[rstest]
    fn unknown_values_use_the_extension_encoding(schema: Schema) {
        let encoded = encode(&schema, &json!({"id": UNKNOWN_VALUE}))
            .unwrap_or_else(|err| panic!("encode: {err}"));

        let raw = rmpv::decode::read_value(&mut encoded.msgpack.as_slice())
            .unwrap_or_else(|err| panic!("msgpack: {err}"));
        let Msgpack::Map(entries) = raw else {
            panic!("expected a map, got {raw}");
        };
        let id = entries
            .iter()
            .find(|(key, _)| key.as_str() == Some("id"))
            .map(|(_, value)| value.clone());
        assert_eq!(id, Some(Msgpack::Ext(0, vec![0])));
        assert!(encoded.json.is_empty());
    }

    #[rstest]
    fn missing_attributes_are_sent_as_null(schema: Schema) {
        let decoded = round_trip(&schema, &json!({"id": "vm-1", "extra": true}));

        assert_eq!(
            decoded,
            json!({
                "id": "vm-1",
                "instances": null,
                "active": null,
                "ssh_keys": null,
                "open_ports": null,
            })
        );
    }

    #[rstest]
    fn nested_lists_keep_their_shape(schema: Schema) {
        let value = json!({
            "id": "vm-1",
            "instances": 2,
            "active": true,
            "ssh_keys": ["SHA256:abc"],
            "open_ports": [{"port": 22, "protocol": "tcp"}],
        });

        assert_eq!(round_trip(&schema, &value), value);
    }

    #[rstest]
    fn mismatched_types_name_the_attribute(schema: Schema) {
        let err = encode(&schema, &json!({"open_ports": [{"port": "ssh"}]}))
            .expect_err("port must be numeric");

        assert_eq!(
            err,
            DynamicValueError::Mismatch {
                attribute: String::from("open_ports.0.port"),
                expected: "a number",
            }
        );
    }

    #[test]
    fn json_payloads_are_accepted() {
        let value = DynamicValue {
            msgpack: Vec::new(),
            json: br#"{"id":"vm-1"}"#.to_vec(),
        };

        let decoded = decode(Some(&value)).unwrap_or_else(|err| panic!("decode: {err}"));

        assert_eq!(decoded, json!({"id": "vm-1"}));
    }

    #[test]
    fn absent_values_decode_to_null() {
        assert_eq!(decode(None), Ok(Value::Null));
    }

    #[test]
    fn null_objects_encode_to_nil() {
        let encoded = encode(&Schema::default(), &Value::Null)
            .unwrap_or_else(|err| panic!("encode: {err}"));

        assert_eq!(encoded.msgpack, vec![0xc0]);
    }
}
