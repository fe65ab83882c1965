//! Value codec for everything that crosses the wallet channel.
//!
//! The channel only carries text, so values are JSON documents. Types plain
//! JSON cannot represent are wrapped in a reserved tag object:
//!
//! ```text
//! {"dataType": "Error",  "value": {"message": ..., "name": ..., "stack": ...}}
//! {"dataType": "Map",    "value": [[key, value], ...]}
//! {"dataType": "Set",    "value": [member, ...]}
//! {"dataType": "BigInt", "value": "-123456789"}
//! ```
//!
//! Object keys are always emitted in sorted order, so two equal values encode
//! to byte-identical text (see [`fingerprint`]).

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::I256;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value as Json};
use sha2::{Digest, Sha256};

use crate::WalletError;

const TAG_FIELD: &str = "dataType";
const VALUE_FIELD: &str = "value";

/// A serialized error: what survives of an exception once it crosses the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Rebuild an error from a failed response's decoded `result`.
    ///
    /// Anything that is not a tagged `Error` is kept as the message so the
    /// caller still sees what the remote sent.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Error(err) => err,
            Value::String(message) => ErrorValue::new("Error", message),
            other => ErrorValue::new("Error", encode(&other)),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ErrorValue {}

/// A value that can cross the channel.
///
/// The first six variants are plain JSON. The last four are the extension
/// types carried as tagged wrappers on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Error(ErrorValue),
    /// Entries in insertion order.
    Map(Vec<(Value, Value)>),
    /// Members in insertion order.
    Set(Vec<Value>),
    BigInt(I256),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Error,
    Map,
    Set,
    BigInt,
}

impl Tag {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Error" => Some(Tag::Error),
            "Map" => Some(Tag::Map),
            "Set" => Some(Tag::Set),
            "BigInt" => Some(Tag::BigInt),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Tag::Error => "Error",
            Tag::Map => "Map",
            Tag::Set => "Set",
            Tag::BigInt => "BigInt",
        }
    }
}

impl Value {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Convert any serializable type into a plain (untagged) value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, WalletError> {
        Ok(Value::from(serde_json::to_value(value)?))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Tagged wire form of this value.
    pub fn to_wire(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_wire).collect()),
            Value::Object(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect(),
            ),
            Value::Error(err) => tagged(Tag::Error, error_fields(err)),
            Value::Map(entries) => tagged(
                Tag::Map,
                Json::Array(
                    entries
                        .iter()
                        .map(|(k, v)| Json::Array(vec![k.to_wire(), v.to_wire()]))
                        .collect(),
                ),
            ),
            Value::Set(members) => tagged(
                Tag::Set,
                Json::Array(members.iter().map(Value::to_wire).collect()),
            ),
            Value::BigInt(n) => tagged(Tag::BigInt, Json::String(n.to_string())),
        }
    }

    /// Lower extension types into plain JSON for typed deserialization.
    ///
    /// BigInt becomes a decimal string, Set an array, Error an object, and Map
    /// an object when every key is a string (an array of pairs otherwise).
    pub fn into_json(self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Number(n) => Json::Number(n),
            Value::String(s) => Json::String(s),
            Value::Array(items) => Json::Array(items.into_iter().map(Value::into_json).collect()),
            Value::Object(fields) => Json::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
            Value::Error(err) => error_fields(&err),
            Value::Map(entries) => {
                if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                    let mut object = JsonMap::new();
                    for (k, v) in entries {
                        if let Value::String(key) = k {
                            object.insert(key, v.into_json());
                        }
                    }
                    Json::Object(object)
                } else {
                    Json::Array(
                        entries
                            .into_iter()
                            .map(|(k, v)| Json::Array(vec![k.into_json(), v.into_json()]))
                            .collect(),
                    )
                }
            }
            Value::Set(members) => {
                Json::Array(members.into_iter().map(Value::into_json).collect())
            }
            Value::BigInt(n) => Json::String(n.to_string()),
        }
    }

    /// Deserialize into a concrete type via [`Value::into_json`].
    pub fn deserialize_into<T: DeserializeOwned>(self) -> Result<T, WalletError> {
        serde_json::from_value(self.into_json())
            .map_err(|e| WalletError::Validation(format!("unexpected value shape: {e}")))
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<I256> for Value {
    fn from(n: I256) -> Self {
        Value::BigInt(n)
    }
}

impl From<ErrorValue> for Value {
    fn from(err: ErrorValue) -> Self {
        Value::Error(err)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

fn tagged(tag: Tag, value: Json) -> Json {
    let mut wrapper = JsonMap::new();
    wrapper.insert(TAG_FIELD.to_string(), Json::String(tag.as_str().to_string()));
    wrapper.insert(VALUE_FIELD.to_string(), value);
    Json::Object(wrapper)
}

fn error_fields(err: &ErrorValue) -> Json {
    let mut fields = JsonMap::new();
    fields.insert("message".to_string(), Json::String(err.message.clone()));
    fields.insert("name".to_string(), Json::String(err.name.clone()));
    if let Some(stack) = &err.stack {
        fields.insert("stack".to_string(), Json::String(stack.clone()));
    }
    Json::Object(fields)
}

// --- Decoding ---

/// Rebuild tagged wrappers, children first.
fn revive(json: Json) -> Result<Value, String> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(revive)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Json::Object(fields) => {
            let mut revived = BTreeMap::new();
            for (key, value) in fields {
                revived.insert(key, revive(value)?);
            }
            match tag_of(&revived) {
                Some(tag) => {
                    let inner = revived.remove(VALUE_FIELD).unwrap_or(Value::Null);
                    unwrap_tag(tag, inner)?
                }
                None => Value::Object(revived),
            }
        }
    })
}

fn tag_of(fields: &BTreeMap<String, Value>) -> Option<Tag> {
    if !fields.contains_key(VALUE_FIELD) {
        return None;
    }
    fields.get(TAG_FIELD)?.as_str().and_then(Tag::parse)
}

fn unwrap_tag(tag: Tag, inner: Value) -> Result<Value, String> {
    match tag {
        Tag::Error => {
            let Value::Object(mut fields) = inner else {
                return Err("tagged Error must wrap an object".to_string());
            };
            let mut text = |key: &str| match fields.remove(key) {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            let name = text("name").unwrap_or_else(|| "Error".to_string());
            let message = text("message").unwrap_or_default();
            let stack = text("stack");
            Ok(Value::Error(ErrorValue {
                name,
                message,
                stack,
            }))
        }
        Tag::Map => {
            let Value::Array(entries) = inner else {
                return Err("tagged Map must wrap a list of entries".to_string());
            };
            let mut pairs = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    Value::Array(mut kv) if kv.len() == 2 => {
                        let v = kv.pop().unwrap_or(Value::Null);
                        let k = kv.pop().unwrap_or(Value::Null);
                        pairs.push((k, v));
                    }
                    _ => return Err("tagged Map entry must be a [key, value] pair".to_string()),
                }
            }
            Ok(Value::Map(pairs))
        }
        Tag::Set => match inner {
            Value::Array(members) => Ok(Value::Set(members)),
            _ => Err("tagged Set must wrap a list".to_string()),
        },
        Tag::BigInt => {
            let digits = match &inner {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err("tagged BigInt must wrap a string".to_string()),
            };
            I256::from_dec_str(&digits)
                .map(Value::BigInt)
                .map_err(|e| format!("invalid BigInt '{digits}': {e}"))
        }
    }
}

// --- Public API ---

/// Encode a value. Deterministic: equal values always give equal text.
pub fn encode(value: &Value) -> String {
    value.to_wire().to_string()
}

/// Encode any serializable type through [`Value`].
pub fn encode_serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, WalletError> {
    Ok(encode(&Value::from_serialize(value)?))
}

/// Decode text produced by [`encode`] (or any JSON document).
///
/// Malformed input fails with [`WalletError::Validation`].
pub fn decode(text: &str) -> Result<Value, WalletError> {
    decode_unchecked(text)
        .map_err(|e| WalletError::Validation(format!("malformed encoded value: {e}")))
}

/// Same decoding as [`decode`], surfacing the raw parser error.
///
/// Only for paths that already own a surrounding error boundary (the RPC
/// response handler); everything else should use [`decode`].
pub fn decode_unchecked(text: &str) -> Result<Value, serde_json::Error> {
    let json: Json = serde_json::from_str(text)?;
    revive(json).map_err(<serde_json::Error as serde::de::Error>::custom)
}

/// Decode and deserialize into a concrete type.
pub fn decode_as<T: DeserializeOwned>(text: &str) -> Result<T, WalletError> {
    decode(text)?.deserialize_into()
}

/// Hex SHA-256 of the encoded value. Stable across key insertion order.
pub fn fingerprint(value: &Value) -> String {
    let digest = Sha256::digest(encode(value).as_bytes());
    alloy::primitives::hex::encode(digest)
}
