//! Host-side values and the object trait reflected operations dispatch to.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use syncproxy_core::{OperationError, PropertyKey, RemoteKind, Value};

use super::promise::HostPromise;

/// Result of an operation against a host object.
pub type OpResult<T> = std::result::Result<T, OperationError>;

/// A live object on the host that the worker can reach by reference.
///
/// Every method has a default matching an inert object: properties read as
/// `null`, writes and calls fail with a `TypeError`. Implementors override
/// the verbs they support.
pub trait HostObject: Send + Sync {
    /// How a reference to this object is labelled on the wire.
    fn kind(&self) -> RemoteKind {
        RemoteKind::Object
    }

    fn get(&self, _key: &PropertyKey) -> OpResult<HostValue> {
        Ok(HostValue::null())
    }

    fn set(&self, key: &PropertyKey, _value: HostValue) -> OpResult<()> {
        Err(OperationError::type_error(format!(
            "cannot assign to read only property '{}'",
            key
        )))
    }

    fn has(&self, _key: &PropertyKey) -> OpResult<bool> {
        Ok(false)
    }

    fn delete_property(&self, _key: &PropertyKey) -> OpResult<bool> {
        Ok(false)
    }

    fn own_keys(&self) -> OpResult<Vec<PropertyKey>> {
        Ok(Vec::new())
    }

    /// Invoke this object as a function.
    fn apply(&self, _args: Vec<HostValue>) -> OpResult<HostValue> {
        Err(OperationError::type_error(format!(
            "{} is not a function",
            self.describe()
        )))
    }

    /// Invoke this object as a constructor.
    fn construct(&self, _args: Vec<HostValue>) -> OpResult<HostValue> {
        Err(OperationError::type_error(format!(
            "{} is not a constructor",
            self.describe()
        )))
    }

    /// Invoke a method with this object bound as the receiver.
    ///
    /// The default reads the property and applies it. Objects whose methods
    /// need their receiver override this instead of exposing function
    /// properties.
    fn call_method(&self, name: &PropertyKey, args: Vec<HostValue>) -> OpResult<HostValue> {
        match self.get(name)? {
            HostValue::Object(method) => method.apply(args),
            _ => Err(OperationError::type_error(format!(
                "{}.{} is not a function",
                self.describe(),
                name
            ))),
        }
    }

    /// Human readable rendering for `print_object`.
    fn describe(&self) -> String {
        "[object Object]".to_string()
    }
}

/// A plain data record shared by reference.
///
/// Data roots are stored this way so writes through a proxy are visible to
/// later reads and to the host itself.
#[derive(Clone, Debug, Default)]
pub struct SharedRecord(Arc<Mutex<Value>>);

impl SharedRecord {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Value {
        self.with(|value| value.clone())
    }

    /// Run `f` with exclusive access to the contents.
    pub fn with<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn ptr_eq(&self, other: &SharedRecord) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Any value the host can hand to, or receive from, the worker.
#[derive(Clone)]
pub enum HostValue {
    /// Plain data, copied across.
    Data(Value),
    /// Plain data with identity, copied across as a snapshot.
    Record(SharedRecord),
    /// An object or function, crossing by reference.
    Object(Arc<dyn HostObject>),
    /// An eventual value, crossing by reference.
    Promise(HostPromise),
}

impl HostValue {
    pub fn null() -> Self {
        HostValue::Data(Value::Null)
    }

    /// Wrap an object implementation.
    pub fn object(object: impl HostObject + 'static) -> Self {
        HostValue::Object(Arc::new(object))
    }

    /// Wrap a closure as a callable host function.
    pub fn function<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> OpResult<HostValue> + Send + Sync + 'static,
    {
        Self::object(HostFunction::new(name, f))
    }

    /// The plain data this value holds, or a `TypeError`.
    pub fn into_value(self) -> OpResult<Value> {
        match self {
            HostValue::Data(value) => Ok(value),
            HostValue::Record(record) => Ok(record.snapshot()),
            other => Err(OperationError::type_error(format!(
                "expected plain data, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            HostValue::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            HostValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Data(value) => value.type_name(),
            HostValue::Record(_) => "object",
            HostValue::Object(object) => match object.kind() {
                RemoteKind::Function => "function",
                _ => "object",
            },
            HostValue::Promise(_) => "promise",
        }
    }

    /// Address of the shared allocation behind a by-reference value.
    ///
    /// Two values with the same identity are the same host value.
    pub fn identity(&self) -> Option<usize> {
        match self {
            HostValue::Data(_) => None,
            HostValue::Record(record) => Some(record.address()),
            HostValue::Object(object) => Some(Arc::as_ptr(object) as *const () as usize),
            HostValue::Promise(promise) => Some(promise.address()),
        }
    }

    /// Whether both values are the same host value (or equal plain data).
    pub fn same_value(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Data(a), HostValue::Data(b)) => a == b,
            _ => self.identity().is_some() && self.identity() == other.identity(),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            HostValue::Record(record) => f.debug_tuple("Record").field(record).finish(),
            HostValue::Object(object) => f.debug_tuple("Object").field(&object.describe()).finish(),
            HostValue::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
        }
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        HostValue::Data(value)
    }
}

impl From<SharedRecord> for HostValue {
    fn from(record: SharedRecord) -> Self {
        HostValue::Record(record)
    }
}

impl From<Arc<dyn HostObject>> for HostValue {
    fn from(object: Arc<dyn HostObject>) -> Self {
        HostValue::Object(object)
    }
}

impl From<HostPromise> for HostValue {
    fn from(promise: HostPromise) -> Self {
        HostValue::Promise(promise)
    }
}

type Callable = dyn Fn(Vec<HostValue>) -> OpResult<HostValue> + Send + Sync;

/// A host function backed by a closure.
pub struct HostFunction {
    name: String,
    call: Box<Callable>,
    constructible: bool,
}

impl HostFunction {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> OpResult<HostValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            call: Box::new(f),
            constructible: false,
        }
    }

    /// Allow `construct`, which then runs the same closure.
    pub fn constructible(mut self) -> Self {
        self.constructible = true;
        self
    }
}

impl HostObject for HostFunction {
    fn kind(&self) -> RemoteKind {
        RemoteKind::Function
    }

    fn get(&self, key: &PropertyKey) -> OpResult<HostValue> {
        Ok(match key.as_name() {
            Some("name") => HostValue::Data(Value::from(self.name.as_str())),
            _ => HostValue::null(),
        })
    }

    fn has(&self, key: &PropertyKey) -> OpResult<bool> {
        Ok(key.as_name() == Some("name"))
    }

    fn apply(&self, args: Vec<HostValue>) -> OpResult<HostValue> {
        (self.call)(args)
    }

    fn construct(&self, args: Vec<HostValue>) -> OpResult<HostValue> {
        if !self.constructible {
            return Err(OperationError::type_error(format!(
                "{} is not a constructor",
                self.name
            )));
        }
        (self.call)(args)
    }

    fn describe(&self) -> String {
        format!("function {}() {{ [native code] }}", self.name)
    }
}

/// An object with an open set of properties, each any host value.
///
/// The general-purpose container for host roots: data fields, nested
/// objects and methods side by side.
#[derive(Default)]
pub struct DynamicObject {
    properties: Mutex<BTreeMap<String, HostValue>>,
}

impl DynamicObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property insertion.
    pub fn with(self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style method insertion.
    pub fn with_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> OpResult<HostValue> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = HostValue::function(name.clone(), f);
        self.with(name, method)
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.lock().insert(name.into(), value.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, HostValue>> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostObject for DynamicObject {
    fn get(&self, key: &PropertyKey) -> OpResult<HostValue> {
        let Some(name) = key.as_name() else {
            return Ok(HostValue::null());
        };
        Ok(self.lock().get(name).cloned().unwrap_or_else(HostValue::null))
    }

    fn set(&self, key: &PropertyKey, value: HostValue) -> OpResult<()> {
        let name = key.as_name().ok_or_else(|| {
            OperationError::type_error(format!("cannot assign symbol property {}", key))
        })?;
        self.insert(name, value);
        Ok(())
    }

    fn has(&self, key: &PropertyKey) -> OpResult<bool> {
        Ok(key.as_name().is_some_and(|name| self.lock().contains_key(name)))
    }

    fn delete_property(&self, key: &PropertyKey) -> OpResult<bool> {
        if let Some(name) = key.as_name() {
            self.lock().remove(name);
        }
        Ok(true)
    }

    fn own_keys(&self) -> OpResult<Vec<PropertyKey>> {
        Ok(self.lock().keys().map(|k| PropertyKey::name(k.as_str())).collect())
    }
}

impl From<DynamicObject> for HostValue {
    fn from(object: DynamicObject) -> Self {
        HostValue::object(object)
    }
}

impl From<HostFunction> for HostValue {
    fn from(function: HostFunction) -> Self {
        HostValue::object(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> HostValue {
        HostValue::function("add", |args| {
            let sum = args
                .into_iter()
                .map(|a| a.into_value().map(|v| v.as_i64().unwrap_or(0)))
                .sum::<OpResult<i64>>()?;
            Ok(Value::Integer(sum).into())
        })
    }

    #[test]
    fn function_applies_and_refuses_construct() {
        let HostValue::Object(f) = adder() else {
            panic!("expected object");
        };
        assert_eq!(f.kind(), RemoteKind::Function);
        let result = f
            .apply(vec![Value::Integer(2).into(), Value::Integer(3).into()])
            .unwrap();
        assert_eq!(result.as_data(), Some(&Value::Integer(5)));

        let err = f.construct(vec![]).unwrap_err();
        assert_eq!(err.name, "TypeError");
    }

    #[test]
    fn dynamic_object_properties() {
        let object = DynamicObject::new().with("answer", Value::Integer(42));
        let key = PropertyKey::from("answer");
        assert!(object.has(&key).unwrap());
        assert_eq!(
            object.get(&key).unwrap().as_data(),
            Some(&Value::Integer(42))
        );
        object.delete_property(&key).unwrap();
        assert!(!object.has(&key).unwrap());
        assert!(object.get(&key).unwrap().as_data().unwrap().is_null());
    }

    #[test]
    fn call_method_dispatches_through_properties() {
        let object = DynamicObject::new()
            .with("add", adder())
            .with("label", Value::from("x"));
        let sum = object
            .call_method(&"add".into(), vec![Value::Integer(1).into()])
            .unwrap();
        assert_eq!(sum.as_data(), Some(&Value::Integer(1)));

        let err = object.call_method(&"label".into(), vec![]).unwrap_err();
        assert!(err.message.contains("is not a function"));
    }

    #[test]
    fn identity_follows_the_allocation() {
        let record = SharedRecord::new(Value::map());
        let a = HostValue::Record(record.clone());
        let b = HostValue::Record(record);
        assert!(a.same_value(&b));
        assert!(!a.same_value(&HostValue::Record(SharedRecord::default())));
        assert_eq!(HostValue::null().identity(), None);
    }

    #[test]
    fn into_value_rejects_objects() {
        let err = adder().into_value().unwrap_err();
        assert_eq!(err.to_string(), "TypeError: expected plain data, found function");
    }
}
