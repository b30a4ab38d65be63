// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine-facing value representation
//!
//! Values cross the boundary between the loader and the evaluator: a
//! CommonJS exports object, a parsed JSON module, a namespace pulled
//! out of an ES module. Objects are shared and mutable so the exports
//! object aliased by a module record and by the executing body
//! observes writes from both sides.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A native callable invoked with engine values
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A shared, mutable property map with reference semantics
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<HashMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.read().get(name).cloned()
    }

    /// Set a property
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.0.write().insert(name.into(), value);
    }

    /// The names of all own properties
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    /// All own properties as `(name, value)` pairs
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of own properties
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Whether the object has no properties
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Whether two references name the same underlying object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(map) => f.debug_map().entries(map.iter()).finish(),
            None => f.write_str("{..}"),
        }
    }
}

impl FromIterator<(String, Value)> for ObjectRef {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

/// A callable value carrying its own property map, so hosts can hang
/// helpers off a function the way scripts expect (`require.resolve`,
/// `require.cache`).
#[derive(Clone)]
pub struct FunctionRef {
    callable: NativeFn,
    properties: ObjectRef,
}

impl FunctionRef {
    /// Wrap a native callable
    pub fn new(f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            callable: Arc::new(f),
            properties: ObjectRef::new(),
        }
    }

    /// Invoke the callable
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.callable)(args)
    }

    /// The function's own properties
    pub fn properties(&self) -> &ObjectRef {
        &self.properties
    }

    /// Whether two references name the same underlying callable
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRef")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// An engine value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The undefined value
    #[default]
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Bool(bool),
    /// A double-precision number
    Number(f64),
    /// A string
    String(String),
    /// A shared object
    Object(ObjectRef),
    /// A callable with properties
    Function(FunctionRef),
}

impl Value {
    /// Borrow the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object payload, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the function payload, if any
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The numeric payload, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is the undefined value
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Own enumerable `(name, value)` pairs: object entries, or a
    /// function's properties. Scalars have none.
    pub fn own_entries(&self) -> Vec<(String, Value)> {
        match self {
            Value::Object(obj) => obj.entries(),
            Value::Function(f) => f.properties().entries(),
            _ => Vec::new(),
        }
    }

    /// Convert a parsed JSON document into an engine value. Arrays
    /// become index-keyed objects with a `length` property, matching
    /// the engine's object model.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                let obj: ObjectRef = arr
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Value::from_json(v)))
                    .collect();
                obj.set("length", Value::Number(arr.len() as f64));
                Value::Object(obj)
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Objects and functions compare by identity, not contents.
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_aliasing() {
        let obj = ObjectRef::new();
        let alias = Value::Object(obj.clone());
        obj.set("a", Value::Number(1.0));
        assert_eq!(alias.as_object().unwrap().get("a"), Some(Value::Number(1.0)));
        assert!(alias.as_object().unwrap().ptr_eq(&obj));
    }

    #[test]
    fn test_from_json_array() {
        let json: serde_json::Value = serde_json::from_str(r#"["x", "y"]"#).unwrap();
        let value = Value::from_json(&json);
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("0"), Some(Value::String("x".to_string())));
        assert_eq!(obj.get("length"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_identity_equality() {
        let a = ObjectRef::new();
        let b = ObjectRef::new();
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
    }

    #[test]
    fn test_function_properties() {
        let f = FunctionRef::new(|_| Ok(Value::Number(7.0)));
        f.properties().set("tag", Value::String("x".to_string()));
        assert_eq!(f.call(&[]).unwrap(), Value::Number(7.0));
        assert_eq!(f.properties().get("tag"), Some(Value::String("x".to_string())));
    }
}
