//! Query-string and form-pair decoding
//!
//! Values stay strings. Bracketed keys nest: `a[b]=1` gives `{"a": {"b": "1"}}`
//! and `a[]=1&a[]=2` gives `{"a": ["1", "2"]}`. A key given more than once
//! collects its values into an array, in order of appearance.

use serde_json::{Map, Value};

/// Decode `k=v&k2=v2` pairs into a JSON object
pub fn parse_pairs(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in form_urlencoded::parse(input) {
        let (base, path) = split_key(&key);
        let slot = map.entry(base).or_insert(Value::Null);
        assign(slot, &path, Value::String(value.into_owned()));
    }
    map
}

/// `a[b][]` into `("a", ["b", ""])`; keys that are not well-formed stay whole
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return (key, Vec::new());
    };
    let (base, mut rest) = key.split_at(open);
    let mut path = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return (key, Vec::new());
        };
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if rest.is_empty() {
        (base, path)
    } else {
        (key, Vec::new())
    }
}

fn assign(slot: &mut Value, path: &[&str], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        append(slot, value);
        return;
    };

    if segment.is_empty() {
        // `[]` always yields an array
        let mut item = Value::Null;
        assign(&mut item, rest, value);
        match slot {
            Value::Array(values) => values.push(item),
            Value::Null => *slot = Value::Array(vec![item]),
            existing => {
                let first = existing.take();
                *existing = Value::Array(vec![first, item]);
            }
        }
        return;
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(children) = slot {
        assign(children.entry(*segment).or_insert(Value::Null), rest, value);
    }
}

/// Set an empty slot, or turn it into an array of values
fn append(slot: &mut Value, value: Value) {
    match slot {
        Value::Null => *slot = value,
        Value::Array(values) => values.push(value),
        existing => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Decode an optional URI query component
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    query.map_or_else(Map::new, |q| parse_pairs(q.as_bytes()))
}
