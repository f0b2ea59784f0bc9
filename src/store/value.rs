//! Stored Values
//!
//! Type-erased values passed through the object store, and the type
//! descriptors used to ask a store for a particular shape.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::Error as _;
use serde::Serialize;

use crate::error::{Result, StoreError};

type AnyObject = Arc<dyn Any + Send + Sync>;

/// Anything the store can persist.
pub trait StoreValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

// == Value Type ==
/// Runtime descriptor of a [`StoreValue`] type.
///
/// Carries the conversions to and from a self-describing document so that
/// a serializer can handle any registered type without knowing it
/// statically.
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
    to_document: fn(&(dyn Any + Send + Sync)) -> serde_json::Result<serde_json::Value>,
    from_document: fn(serde_json::Value) -> serde_json::Result<AnyObject>,
}

impl ValueType {
    pub fn of<T: StoreValue>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            to_document: to_document_of::<T>,
            from_document: from_document_of::<T>,
        }
    }

    pub fn string() -> Self {
        Self::of::<String>()
    }

    pub fn is_string(&self) -> bool {
        self.id == TypeId::of::<String>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Builds a value of this type from a document.
    pub fn from_document(&self, document: serde_json::Value) -> Result<Value> {
        let object = (self.from_document)(document).map_err(|e| {
            StoreError::Serialization(format!("cannot read {}: {}", self.name, e))
        })?;
        Ok(Value { object, ty: *self })
    }
}

fn to_document_of<T: StoreValue>(
    object: &(dyn Any + Send + Sync),
) -> serde_json::Result<serde_json::Value> {
    match object.downcast_ref::<T>() {
        Some(value) => serde_json::to_value(value),
        None => Err(serde_json::Error::custom("value does not match its type")),
    }
}

fn from_document_of<T: StoreValue>(document: serde_json::Value) -> serde_json::Result<AnyObject> {
    let value: T = serde_json::from_value(document)?;
    Ok(Arc::new(value))
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueType").field(&self.name).finish()
    }
}

// == Value ==
/// A shared, immutable, type-erased value.
///
/// Cloning is cheap; clones share the same allocation.
#[derive(Clone)]
pub struct Value {
    object: AnyObject,
    ty: ValueType,
}

impl Value {
    pub fn new<T: StoreValue>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: StoreValue>(value: Arc<T>) -> Self {
        Self {
            object: value,
            ty: ValueType::of::<T>(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast<T: StoreValue>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Converts the value to a self-describing document.
    pub fn to_document(&self) -> Result<serde_json::Value> {
        (self.ty.to_document)(self.object.as_ref()).map_err(|e| {
            StoreError::Serialization(format!("cannot write {}: {}", self.ty.name, e))
        })
    }

    /// Returns true if both handles share one allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("type", &self.ty.name).finish()
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value.to_string())
    }
}
