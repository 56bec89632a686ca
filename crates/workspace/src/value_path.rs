//! Path-addressed reads and writes on owned JSON values.

use serde_json::{Map, Value};
use wsconf_jsonc::Segment;

pub(crate) fn get<'a>(value: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        Segment::Key(key) => current.as_object()?.get(key),
        Segment::Index(index) => current.as_array()?.get(*index),
    })
}

pub(crate) fn get_in<'a>(map: &'a Map<String, Value>, path: &[Segment]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let head = map.get(first.as_key()?)?;
    get(head, rest)
}

/// Writes `new` at `path`, replacing anything in the way with fresh containers.
pub(crate) fn set(value: &mut Value, path: &[Segment], new: Value) {
    let Some((last, parents)) = path.split_last() else {
        *value = new;
        return;
    };
    let mut current = value;
    for segment in parents {
        current = child_or_insert(current, segment);
    }
    match last {
        Segment::Key(key) => {
            ensure_object(current).insert(key.clone(), new);
        }
        Segment::Index(index) => {
            let items = ensure_array(current);
            if *index < items.len() {
                items[*index] = new;
            } else {
                items.push(new);
            }
        }
    }
}

pub(crate) fn set_in(map: &mut Map<String, Value>, path: &[Segment], new: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let Some(key) = first.as_key() else {
        return;
    };
    if rest.is_empty() {
        map.insert(key.to_string(), new);
        return;
    }
    let head = map.entry(key.to_string()).or_insert(Value::Null);
    set(head, rest, new);
}

/// Removes the value at `path`, returning it when something was there.
pub(crate) fn remove(value: &mut Value, path: &[Segment]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = value;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            Segment::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }
    match last {
        Segment::Key(key) => current.as_object_mut()?.shift_remove(key),
        Segment::Index(index) => {
            let items = current.as_array_mut()?;
            (*index < items.len()).then(|| items.remove(*index))
        }
    }
}

pub(crate) fn remove_in(map: &mut Map<String, Value>, path: &[Segment]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    let key = first.as_key()?;
    if rest.is_empty() {
        return map.shift_remove(key);
    }
    remove(map.get_mut(key)?, rest)
}

fn child_or_insert<'a>(value: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => ensure_object(value)
            .entry(key.clone())
            .or_insert(Value::Null),
        Segment::Index(index) => {
            let items = ensure_array(value);
            if *index >= items.len() {
                items.push(Value::Null);
                let last = items.len() - 1;
                &mut items[last]
            } else {
                &mut items[*index]
            }
        }
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(items) => items,
        _ => unreachable!("value was just replaced by an array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wsconf_jsonc::JsonPath;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut value = json!({"a": 1});
        let path = JsonPath::root().key("b").key("c");
        set(&mut value, path.segments(), json!(true));
        assert_eq!(value, json!({"a": 1, "b": {"c": true}}));
    }

    #[test]
    fn remove_keeps_sibling_order() {
        let mut value = json!({"x": 1, "y": 2, "z": 3});
        assert_eq!(remove(&mut value, JsonPath::root().key("x").segments()), Some(json!(1)));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["y", "z"]);
        assert_eq!(remove(&mut value, JsonPath::root().key("q").key("r").segments()), None);
    }

    #[test]
    fn get_walks_arrays() {
        let value = json!({"list": [{"id": 7}]});
        let path = JsonPath::root().key("list").index(0).key("id");
        assert_eq!(get(&value, path.segments()), Some(&json!(7)));
    }
}
