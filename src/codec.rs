//! The bean converter: per-type codecs between live values and the
//! serialization-neutral [`Value`] model.
//!
//! There is no runtime reflection; every type that crosses the persistence
//! boundary is registered explicitly. Primitives ship with the registry,
//! structs implement [`Bean`], and an ordered list of
//! [`ConverterExtension`]s is consulted before the default path so callers
//! can replace the encoding of any type without touching its codec.

use crate::error::{Error, Result};
use crate::value::{PersistentBean, Value};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// A value captured at an interception point, together with enough type
/// machinery to clone and compare it later without knowing its type.
pub struct CapturedValue {
    value: Box<dyn Any>,
    type_name: &'static str,
    clone_fn: fn(&dyn Any) -> Box<dyn Any>,
}

impl CapturedValue {
    pub fn new<T: Clone + Any>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
            clone_fn: clone_impl::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.value.as_ref().type_id()
    }

    /// Full path of the captured type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Path-stripped name, as used in documents and error messages.
    pub fn short_name(&self) -> String {
        short_type_name(self.type_name)
    }

    pub fn as_any(&self) -> &dyn Any {
        self.value.as_ref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Clone the captured value out as a concrete type.
    pub fn extract<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl Clone for CapturedValue {
    fn clone(&self) -> Self {
        Self {
            value: (self.clone_fn)(self.value.as_ref()),
            type_name: self.type_name,
            clone_fn: self.clone_fn,
        }
    }
}

impl fmt::Debug for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CapturedValue<{}>", self.short_name())
    }
}

fn clone_impl<T: Clone + Any>(value: &dyn Any) -> Box<dyn Any> {
    match value.downcast_ref::<T>() {
        Some(v) => Box::new(v.clone()),
        // Unreachable by construction: clone_fn is only paired with values
        // of the same T.
        None => Box::new(()),
    }
}

/// Identity of a type at the conversion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: TypeId,
    /// Full path as produced by `std::any::type_name`.
    pub name: &'static str,
}

impl TypeInfo {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

/// Strip module paths from a type name, keeping generic structure:
/// `alloc::vec::Vec<my::mod::Person>` -> `Vec<Person>`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::new();
    let mut segment = String::new();
    for c in full.chars() {
        if matches!(c, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';') {
            out.push_str(last_path_component(&segment));
            segment.clear();
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    out.push_str(last_path_component(&segment));
    out
}

fn last_path_component(segment: &str) -> &str {
    segment.rsplit("::").next().unwrap_or(segment)
}

/// A value with a canonical literal form in sample documents.
pub trait Primitive: Any + Clone + PartialEq {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(found: &Value) -> Error {
    Error::Serialization {
        type_name: short_type_name(std::any::type_name::<T>()),
        reason: format!("unexpected document value of kind {}", found.kind()),
    }
}

macro_rules! int_primitive {
    ($($ty:ty),*) => {
        $(impl Primitive for $ty {
            fn to_value(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Int(i) => <$ty>::try_from(*i).map_err(|_| Error::Serialization {
                        type_name: short_type_name(std::any::type_name::<$ty>()),
                        reason: format!("integer {i} out of range"),
                    }),
                    other => Err(mismatch::<$ty>(other)),
                }
            }
        })*
    };
}

int_primitive!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! float_primitive {
    ($($ty:ty),*) => {
        $(impl Primitive for $ty {
            fn to_value(&self) -> Value {
                Value::Float(f64::from(*self))
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Float(f) => Ok(*f as $ty),
                    Value::Int(i) => Ok(*i as $ty),
                    other => Err(mismatch::<$ty>(other)),
                }
            }
        })*
    };
}

float_primitive!(f32, f64);

impl Primitive for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch::<bool>(other)),
        }
    }
}

impl Primitive for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch::<String>(other)),
        }
    }
}

/// Byte arrays are stored as base64 strings.
impl Primitive for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::String(base64::engine::general_purpose::STANDARD.encode(self))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(|e| Error::Serialization {
                    type_name: "Vec<u8>".to_string(),
                    reason: format!("invalid base64: {e}"),
                }),
            other => Err(mismatch::<Vec<u8>>(other)),
        }
    }
}

/// Date-times default to a single epoch-millisecond literal. Register a
/// [`ConverterExtension`] or a persistence serializer override for a
/// human-readable encoding.
impl Primitive for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Int(self.and_utc().timestamp_millis())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(ms) => DateTime::from_timestamp_millis(*ms)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| Error::Serialization {
                    type_name: "NaiveDateTime".to_string(),
                    reason: format!("epoch milliseconds {ms} out of range"),
                }),
            other => Err(mismatch::<NaiveDateTime>(other)),
        }
    }
}

impl Primitive for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Int(self.timestamp_millis())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(ms) => {
                DateTime::from_timestamp_millis(*ms).ok_or_else(|| Error::Serialization {
                    type_name: "DateTime<Utc>".to_string(),
                    reason: format!("epoch milliseconds {ms} out of range"),
                })
            }
            other => Err(mismatch::<DateTime<Utc>>(other)),
        }
    }
}

/// A struct that converts field-by-field into a [`PersistentBean`], recursing
/// through the registry for nested fields.
pub trait Bean: Any + Clone + Sized {
    fn to_fields(&self, codecs: &CodecRegistry) -> Result<PersistentBean>;
    fn from_fields(bean: &PersistentBean, codecs: &CodecRegistry) -> Result<Self>;
}

/// Custom conversion logic consulted before the default codec path.
///
/// Extensions are tried in registration order; the first one whose
/// `is_applicable` accepts the type wins both directions.
pub trait ConverterExtension {
    fn is_applicable(&self, ty: &TypeInfo) -> bool;
    fn to_persistent(&self, value: &dyn Any, codecs: &CodecRegistry) -> Result<Value>;
    fn from_persistent(&self, value: &Value, codecs: &CodecRegistry) -> Result<CapturedValue>;
}

type SerializeFn = Box<dyn Fn(&dyn Any) -> Result<Value>>;
type DeserializeFn = Box<dyn Fn(&Value) -> Result<CapturedValue>>;

/// A document-level encode/decode override for one type. Overrides bypass
/// both the default codec and every converter extension, at any nesting
/// depth.
struct OverrideCodec {
    type_name: &'static str,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

/// Type-erased equality, as stored with a codec.
pub type EqFn = fn(&dyn Any, &dyn Any) -> bool;

type ToValueFn = fn(&dyn Any, &CodecRegistry) -> Result<Value>;
type FromValueFn = fn(&Value, &CodecRegistry) -> Result<CapturedValue>;

struct Codec {
    type_name: &'static str,
    eq: Option<EqFn>,
    to_value: ToValueFn,
    from_value: FromValueFn,
}

/// The process-wide codec registry.
///
/// Created with all built-in primitives; domain types are added with
/// [`CodecRegistry::register_bean`] (or `register_bean_opaque` for types
/// without a usable equality).
pub struct CodecRegistry {
    codecs: HashMap<TypeId, Codec>,
    by_name: HashMap<String, TypeId>,
    extensions: Vec<Box<dyn ConverterExtension>>,
    overrides: HashMap<TypeId, OverrideCodec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Registry with all built-in primitive codecs.
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
            by_name: HashMap::new(),
            extensions: Vec::new(),
            overrides: HashMap::new(),
        };
        registry.register_primitive::<i8>();
        registry.register_primitive::<i16>();
        registry.register_primitive::<i32>();
        registry.register_primitive::<i64>();
        registry.register_primitive::<u8>();
        registry.register_primitive::<u16>();
        registry.register_primitive::<u32>();
        registry.register_primitive::<f32>();
        registry.register_primitive::<f64>();
        registry.register_primitive::<bool>();
        registry.register_primitive::<String>();
        registry.register_primitive::<Vec<u8>>();
        registry.register_primitive::<NaiveDateTime>();
        registry.register_primitive::<DateTime<Utc>>();
        registry
    }

    pub fn register_primitive<T: Primitive>(&mut self) {
        self.insert::<T>(Codec {
            type_name: std::any::type_name::<T>(),
            eq: Some(eq_impl::<T>),
            to_value: primitive_to_value::<T>,
            from_value: primitive_from_value::<T>,
        });
    }

    /// Register a bean type with value equality.
    pub fn register_bean<T: Bean + PartialEq>(&mut self) {
        self.insert::<T>(Codec {
            type_name: std::any::type_name::<T>(),
            eq: Some(eq_impl::<T>),
            to_value: bean_to_value::<T>,
            from_value: bean_from_value::<T>,
        });
    }

    /// Register a bean type that has no usable equality. An equality matcher
    /// over such a type raises [`Error::InvalidConfig`] at first match
    /// attempt; pair a combo matcher with a custom comparator instead.
    pub fn register_bean_opaque<T: Bean>(&mut self) {
        self.insert::<T>(Codec {
            type_name: std::any::type_name::<T>(),
            eq: None,
            to_value: bean_to_value::<T>,
            from_value: bean_from_value::<T>,
        });
    }

    /// Register `Vec<T>` in terms of the element codec.
    pub fn register_seq<T: Any + Clone + PartialEq>(&mut self) {
        self.insert::<Vec<T>>(Codec {
            type_name: std::any::type_name::<Vec<T>>(),
            eq: Some(eq_impl::<Vec<T>>),
            to_value: seq_to_value::<T>,
            from_value: seq_from_value::<T>,
        });
    }

    fn insert<T: Any>(&mut self, codec: Codec) {
        let short = short_type_name(codec.type_name);
        self.by_name.insert(short, TypeId::of::<T>());
        self.codecs.insert(TypeId::of::<T>(), codec);
    }

    /// Append a converter extension. Extensions are consulted in
    /// registration order, before the default codec path.
    pub fn push_extension(&mut self, extension: Box<dyn ConverterExtension>) {
        self.extensions.push(extension);
    }

    /// Register a serializer override for one type. Overrides take
    /// precedence over converter extensions and the default codec, used for
    /// custom document encodings such as human-readable dates.
    pub fn register_override<T, S, D>(&mut self, serialize: S, deserialize: D)
    where
        T: Any + Clone,
        S: Fn(&T) -> Result<Value> + 'static,
        D: Fn(&Value) -> Result<T> + 'static,
    {
        let codec = OverrideCodec {
            type_name: std::any::type_name::<T>(),
            serialize: Box::new(move |value| match value.downcast_ref::<T>() {
                Some(v) => serialize(v),
                None => Err(Error::Serialization {
                    type_name: short_type_name(std::any::type_name::<T>()),
                    reason: "value does not have the overridden type".to_string(),
                }),
            }),
            deserialize: Box::new(move |value| deserialize(value).map(CapturedValue::new)),
        };
        self.by_name
            .insert(short_type_name(std::any::type_name::<T>()), TypeId::of::<T>());
        self.overrides.insert(TypeId::of::<T>(), codec);
    }

    /// Equality function for a type, if its codec carries one.
    pub fn equality(&self, type_id: TypeId) -> Option<EqFn> {
        self.codecs.get(&type_id).and_then(|codec| codec.eq)
    }

    pub fn has_codec(&self, type_id: TypeId) -> bool {
        self.codecs.contains_key(&type_id)
    }

    /// Convert a captured value to its persistent form.
    pub fn convert(&self, value: &CapturedValue) -> Result<Value> {
        let ty = TypeInfo {
            id: value.type_id(),
            name: value.type_name(),
        };
        if let Some(override_codec) = self.overrides.get(&ty.id) {
            return (override_codec.serialize)(value.as_any());
        }
        for extension in &self.extensions {
            if extension.is_applicable(&ty) {
                return extension.to_persistent(value.as_any(), self);
            }
        }
        match self.codecs.get(&ty.id) {
            Some(codec) => (codec.to_value)(value.as_any(), self),
            None => Err(Error::Serialization {
                type_name: ty.short_name(),
                reason: "no codec or converter extension registered".to_string(),
            }),
        }
    }

    /// Convert a plain reference; the value must be `Clone` so a capture can
    /// be formed for extension dispatch.
    pub fn convert_of<T: Any + Clone>(&self, value: &T) -> Result<Value> {
        self.convert(&CapturedValue::new(value.clone()))
    }

    /// Rebuild a live value from its persistent form, directed by the target
    /// type.
    pub fn revert(&self, value: &Value, ty: &TypeInfo) -> Result<CapturedValue> {
        if let Some(override_codec) = self.overrides.get(&ty.id) {
            return (override_codec.deserialize)(value);
        }
        for extension in &self.extensions {
            if extension.is_applicable(ty) {
                return extension.from_persistent(value, self);
            }
        }
        match self.codecs.get(&ty.id) {
            Some(codec) => (codec.from_value)(value, self),
            None => Err(Error::Serialization {
                type_name: ty.short_name(),
                reason: "no codec or converter extension registered".to_string(),
            }),
        }
    }

    /// Typed revert convenience.
    pub fn revert_as<T: Any + Clone>(&self, value: &Value) -> Result<T> {
        let reverted = self.revert(value, &TypeInfo::of::<T>())?;
        reverted.extract::<T>().ok_or_else(|| Error::Serialization {
            type_name: short_type_name(std::any::type_name::<T>()),
            reason: "reverted value has a different type".to_string(),
        })
    }

    /// Revert by path-stripped type name, as stored in method signatures.
    pub fn revert_named(&self, value: &Value, short_name: &str) -> Result<CapturedValue> {
        let type_id = self
            .by_name
            .get(short_name)
            .copied()
            .ok_or_else(|| Error::Serialization {
                type_name: short_name.to_string(),
                reason: "no codec registered under this type name".to_string(),
            })?;
        let type_name = self
            .codecs
            .get(&type_id)
            .map(|codec| codec.type_name)
            .or_else(|| {
                self.overrides
                    .get(&type_id)
                    .map(|override_codec| override_codec.type_name)
            })
            .ok_or_else(|| Error::Serialization {
                type_name: short_name.to_string(),
                reason: "no codec registered under this type name".to_string(),
            })?;
        self.revert(
            value,
            &TypeInfo {
                id: type_id,
                name: type_name,
            },
        )
    }
}

fn eq_impl<T: Any + PartialEq>(left: &dyn Any, right: &dyn Any) -> bool {
    match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

fn primitive_to_value<T: Primitive>(value: &dyn Any, _codecs: &CodecRegistry) -> Result<Value> {
    match value.downcast_ref::<T>() {
        Some(v) => Ok(v.to_value()),
        None => Err(Error::Serialization {
            type_name: short_type_name(std::any::type_name::<T>()),
            reason: "value does not have the registered type".to_string(),
        }),
    }
}

fn primitive_from_value<T: Primitive>(
    value: &Value,
    _codecs: &CodecRegistry,
) -> Result<CapturedValue> {
    T::from_value(value).map(CapturedValue::new)
}

fn bean_to_value<T: Bean>(value: &dyn Any, codecs: &CodecRegistry) -> Result<Value> {
    match value.downcast_ref::<T>() {
        Some(v) => Ok(Value::Bean(v.to_fields(codecs)?)),
        None => Err(Error::Serialization {
            type_name: short_type_name(std::any::type_name::<T>()),
            reason: "value does not have the registered type".to_string(),
        }),
    }
}

fn bean_from_value<T: Bean>(value: &Value, codecs: &CodecRegistry) -> Result<CapturedValue> {
    match value {
        Value::Bean(bean) => Ok(CapturedValue::new(T::from_fields(bean, codecs)?)),
        other => Err(Error::Serialization {
            type_name: short_type_name(std::any::type_name::<T>()),
            reason: format!("unexpected document value of kind {}", other.kind()),
        }),
    }
}

fn seq_to_value<T: Any + Clone>(value: &dyn Any, codecs: &CodecRegistry) -> Result<Value> {
    match value.downcast_ref::<Vec<T>>() {
        Some(items) => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                converted.push(codecs.convert_of(item)?);
            }
            Ok(Value::Seq(converted))
        }
        None => Err(Error::Serialization {
            type_name: short_type_name(std::any::type_name::<Vec<T>>()),
            reason: "value does not have the registered type".to_string(),
        }),
    }
}

fn seq_from_value<T: Any + Clone>(value: &Value, codecs: &CodecRegistry) -> Result<CapturedValue> {
    match value {
        Value::Seq(items) => {
            let mut reverted = Vec::with_capacity(items.len());
            for item in items {
                reverted.push(codecs.revert_as::<T>(item)?);
            }
            Ok(CapturedValue::new(reverted))
        }
        other => Err(Error::Serialization {
            type_name: short_type_name(std::any::type_name::<Vec<T>>()),
            reason: format!("unexpected document value of kind {}", other.kind()),
        }),
    }
}
