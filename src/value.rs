//! The serialization-neutral value model.
//!
//! Every recorded argument and return value is reduced to a [`Value`] before
//! it is written to a sample document, and rebuilt from a [`Value`] when a
//! document is loaded. Non-primitive objects become a [`PersistentBean`], an
//! ordered field map with ordinal-prefixed keys.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A type-erased, serializable value.
///
/// Numbers, strings and booleans map to the matching document literal;
/// sequences map to arrays; everything else is a [`PersistentBean`]. The
/// interpretation of a literal (for example an epoch-millisecond integer that
/// is really a date) is decided by the codec of the target type when the
/// value is reverted, never by the value itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Bean(PersistentBean),
}

impl Value {
    /// Short name of the variant, used in conversion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Bean(_) => "bean",
        }
    }
}

/// The generic persistent form of a non-primitive object.
///
/// Fields keep their insertion order. Keys carry an ordinal prefix joined
/// with `$` (`0$birthday`); the ordinal starts at `0` and increments only
/// when the same logical field name is inserted again, so same-named fields
/// from different sources can coexist in one bean.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistentBean {
    fields: Vec<(String, Value)>,
}

impl PersistentBean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field under the next free ordinal for `name`.
    pub fn put(&mut self, name: &str, value: Value) {
        let ordinal = self
            .fields
            .iter()
            .filter(|(key, _)| logical_name(key) == name)
            .count();
        self.fields.push((format!("{ordinal}${name}"), value));
    }

    /// Insert a field under an already disambiguated key (used when parsing
    /// documents, where keys arrive fully formed).
    pub fn put_raw(&mut self, key: impl Into<String>, value: Value) {
        self.fields.push((key.into(), value));
    }

    /// Look up the first field with the given logical name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| logical_name(key) == name)
            .map(|(_, value)| value)
    }

    /// Look up a field by logical name and ordinal.
    pub fn get_at(&self, ordinal: usize, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == &format!("{ordinal}${name}"))
            .map(|(_, value)| value)
    }

    /// Iterate fields in insertion order, keys as stored.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Strip the ordinal prefix from a stored key: `0$birthday` -> `birthday`.
/// Keys without a prefix are returned unchanged.
pub fn logical_name(key: &str) -> &str {
    match key.split_once('$') {
        Some((ordinal, name)) if ordinal.chars().all(|c| c.is_ascii_digit()) => name,
        _ => key,
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Bean(bean) => bean.serialize(serializer),
        }
    }
}

impl Serialize for PersistentBean {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sample document value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut bean = PersistentBean::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            bean.put_raw(key, value);
        }
        Ok(Value::Bean(bean))
    }
}

impl<'de> Deserialize<'de> for PersistentBean {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bean(bean) => Ok(bean),
            other => Err(de::Error::custom(format!(
                "expected a field map, found {}",
                other.kind()
            ))),
        }
    }
}
