//! Executes one reflected operation against host values.

use syncproxy_core::{
    display_path, value_to_json, OperationError, PropertyKey, ReflectOp, ReflectRequest, Value,
};

use super::object::{HostValue, OpResult, SharedRecord};

/// Where a path walk has arrived.
///
/// Paths into a shared record stay as a record plus a sub-path so writes
/// land in the record itself rather than in a copy.
enum Place {
    Value(HostValue),
    InRecord {
        record: SharedRecord,
        path: Vec<PropertyKey>,
    },
}

impl Place {
    fn step(self, key: &PropertyKey) -> OpResult<Place> {
        match self {
            Place::Value(HostValue::Record(record)) => Place::InRecord {
                record,
                path: Vec::new(),
            }
            .step(key),
            Place::Value(value) => read(&value, key).map(Place::Value),
            Place::InRecord { record, mut path } => {
                // Only existing children extend the sub-path; derived
                // properties such as `length` are read off the container.
                let derived = record.with(|root| match root.get(&path) {
                    Some(current) if is_child(current, key) => None,
                    Some(current) => Some(current.property(key)),
                    None => Some(Value::Null.property(key)),
                });
                match derived {
                    None => {
                        path.push(key.clone());
                        Ok(Place::InRecord { record, path })
                    }
                    Some(value) => value.map(|v| Place::Value(HostValue::Data(v))),
                }
            }
        }
    }

    fn into_value(self) -> HostValue {
        match self {
            Place::Value(value) => value,
            Place::InRecord { record, path } => {
                HostValue::Data(record.with(|root| root.get(&path).cloned().unwrap_or_default()))
            }
        }
    }
}

fn is_child(container: &Value, key: &PropertyKey) -> bool {
    match container {
        Value::Map(map) => key.as_name().is_some_and(|name| map.contains_key(name)),
        Value::Array(items) => key.as_index().is_some_and(|i| i < items.len()),
        _ => false,
    }
}

fn read(value: &HostValue, key: &PropertyKey) -> OpResult<HostValue> {
    match value {
        HostValue::Data(data) => data.property(key).map(HostValue::Data),
        HostValue::Record(record) => record.with(|root| root.property(key)).map(HostValue::Data),
        HostValue::Object(object) => object.get(key),
        HostValue::Promise(_) => Ok(HostValue::null()),
    }
}

fn walk(root: HostValue, path: &[PropertyKey]) -> OpResult<Place> {
    path.iter()
        .try_fold(Place::Value(root), |place, key| place.step(key))
}

/// Perform `request` starting from its resolved `root`.
///
/// `args` and `value` are the request's arguments already revived into host
/// values.
pub(crate) fn execute(
    root: HostValue,
    request: &ReflectRequest,
    args: Vec<HostValue>,
    value: Option<HostValue>,
) -> OpResult<HostValue> {
    let path = request.path.as_slice();
    match request.op {
        ReflectOp::Get => Ok(walk(root, path)?.into_value()),
        ReflectOp::Set => {
            let (last, parents) = split(path, request)?;
            let value = value.unwrap_or_else(HostValue::null);
            set(walk(root, parents)?, last, value)?;
            Ok(HostValue::Data(Value::Bool(true)))
        }
        ReflectOp::Has => {
            let (last, parents) = split(path, request)?;
            has(walk(root, parents)?, last).map(|b| HostValue::Data(Value::Bool(b)))
        }
        ReflectOp::DeleteProperty => {
            let (last, parents) = split(path, request)?;
            delete(walk(root, parents)?, last).map(|b| HostValue::Data(Value::Bool(b)))
        }
        ReflectOp::OwnKeys => {
            let keys = own_keys(walk(root, path)?)?;
            Ok(HostValue::Data(Value::Array(
                keys.into_iter()
                    .filter_map(|k| k.as_name().map(Value::from))
                    .collect(),
            )))
        }
        ReflectOp::Apply => match path.split_last() {
            None => apply(root, args, request),
            Some((last, parents)) => match walk(root, parents)? {
                Place::Value(HostValue::Object(receiver)) => receiver.call_method(last, args),
                place => apply(place.step(last)?.into_value(), args, request),
            },
        },
        ReflectOp::Construct => match walk(root, path)?.into_value() {
            HostValue::Object(target) => target.construct(args),
            _ => Err(OperationError::type_error(format!(
                "{} is not a constructor",
                display_path(path)
            ))),
        },
    }
}

/// Render the value at `path` for `print_object`.
pub(crate) fn render(root: HostValue, path: &[PropertyKey]) -> OpResult<String> {
    let text = match walk(root, path)?.into_value() {
        HostValue::Data(Value::String(s)) => s,
        HostValue::Data(data) => render_data(data)?,
        HostValue::Record(record) => render_data(record.snapshot())?,
        HostValue::Object(object) => object.describe(),
        HostValue::Promise(_) => "[object Promise]".to_string(),
    };
    Ok(text)
}

fn render_data(data: Value) -> OpResult<String> {
    serde_json::to_string(&value_to_json(data))
        .map_err(|e| OperationError::error(e.to_string()))
}

fn split<'a>(
    path: &'a [PropertyKey],
    request: &ReflectRequest,
) -> OpResult<(&'a PropertyKey, &'a [PropertyKey])> {
    path.split_last().ok_or_else(|| {
        OperationError::type_error(format!("{} needs a property name", request.op))
    })
}

fn apply(target: HostValue, args: Vec<HostValue>, request: &ReflectRequest) -> OpResult<HostValue> {
    match target {
        HostValue::Object(function) => function.apply(args),
        _ => Err(OperationError::type_error(format!(
            "{} is not a function",
            display_path(&request.path)
        ))),
    }
}

fn set(place: Place, key: &PropertyKey, value: HostValue) -> OpResult<()> {
    match place {
        Place::Value(HostValue::Object(object)) => object.set(key, value),
        Place::Value(HostValue::Record(record)) => {
            let data = value.into_value()?;
            record.with(|root| root.set(std::slice::from_ref(key), data))
        }
        Place::InRecord { record, mut path } => {
            let data = value.into_value()?;
            path.push(key.clone());
            record.with(|root| root.set(&path, data))
        }
        Place::Value(other) => Err(OperationError::type_error(format!(
            "cannot set property '{}' on a detached {}",
            key,
            other.type_name()
        ))),
    }
}

fn has(place: Place, key: &PropertyKey) -> OpResult<bool> {
    match place {
        Place::Value(HostValue::Object(object)) => object.has(key),
        Place::Value(HostValue::Promise(_)) => Ok(false),
        Place::Value(HostValue::Record(record)) => Ok(record.with(|root| root.has_property(key))),
        Place::Value(HostValue::Data(data)) => Ok(data.has_property(key)),
        Place::InRecord { record, path } => Ok(record.with(|root| {
            root.get(&path)
                .is_some_and(|target| target.has_property(key))
        })),
    }
}

fn delete(place: Place, key: &PropertyKey) -> OpResult<bool> {
    match place {
        Place::Value(HostValue::Object(object)) => object.delete_property(key),
        Place::Value(HostValue::Record(record)) => record
            .with(|root| root.remove(std::slice::from_ref(key)))
            .map(|_| true),
        Place::InRecord { record, mut path } => {
            path.push(key.clone());
            record.with(|root| root.remove(&path)).map(|_| true)
        }
        Place::Value(HostValue::Data(_)) | Place::Value(HostValue::Promise(_)) => Ok(false),
    }
}

fn own_keys(place: Place) -> OpResult<Vec<PropertyKey>> {
    match place.into_value() {
        HostValue::Object(object) => object.own_keys(),
        HostValue::Record(record) => Ok(record.snapshot().own_keys()),
        HostValue::Data(data) => Ok(data.own_keys()),
        HostValue::Promise(_) => Ok(Vec::new()),
    }
}
