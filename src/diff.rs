use serde_json::{Map, Value};

pub(crate) const REDACTED: &str = "**REDACTED**";

/// Keys scrubbed from anything that leaves the process (journal, diagnostics, debug dumps).
pub(crate) const REDACT_KEYS: &[&str] = &[
    "serial",
    "indoor_serial",
    "outdoor_serial",
    "router_mac",
    "pin",
];

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (Value::Array(prev_arr), Value::Array(curr_arr)) if prev_arr.len() == curr_arr.len() => {
            for (idx, (prev_val, curr_val)) in prev_arr.iter().zip(curr_arr).enumerate() {
                let path = if path_prefix.is_empty() {
                    idx.to_string()
                } else {
                    format!("{path_prefix}.{idx}")
                };
                diff_json(prev_val, curr_val, &path, changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Objects merge key by key; anything else (arrays included) is replaced.
pub(crate) fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (k, v) in s {
                deep_merge(t.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (t, s) => {
            *t = s.clone();
        }
    }
}

pub(crate) fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if REDACT_KEYS.contains(&k.as_str()) && !v.is_null() {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_detects_leaf_change() {
        let prev = json!({"status": {"outdoor_temperature": 41.0}});
        let curr = json!({"status": {"outdoor_temperature": 43.0}});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "status.outdoor_temperature");
        assert_eq!(changes[0].1, json!(41.0));
        assert_eq!(changes[0].2, json!(43.0));
    }

    #[test]
    fn diff_ignores_unchanged() {
        let val = json!({"status": {"outdoor_temperature": 41.0, "filter_used": 20}});
        let mut changes = vec![];
        diff_json(&val, &val, "", &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn diff_walks_same_length_arrays() {
        let prev = json!({"zones": [{"temperature": 68.0}, {"temperature": 70.0}]});
        let curr = json!({"zones": [{"temperature": 68.0}, {"temperature": 71.0}]});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "zones.1.temperature");
    }

    #[test]
    fn diff_replaces_resized_arrays() {
        let prev = json!({"zones": [1]});
        let curr = json!({"zones": [1, 2]});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "zones");
    }

    #[test]
    fn deep_merge_keeps_untouched_keys() {
        let mut target = json!({"status": {"filter_used": 20, "humidifier_on": false}});
        deep_merge(&mut target, &json!({"status": {"humidifier_on": true}}));
        assert_eq!(target, json!({"status": {"filter_used": 20, "humidifier_on": true}}));
    }

    #[test]
    fn redact_scrubs_nested_serials() {
        let value = json!({
            "profile": {"serial": "4321X", "indoor_serial": null, "name": "Home"},
            "systems": [{"serial": "S2"}]
        });
        let redacted = redact(&value);
        assert_eq!(redacted["profile"]["serial"], REDACTED);
        assert_eq!(redacted["profile"]["indoor_serial"], Value::Null);
        assert_eq!(redacted["profile"]["name"], "Home");
        assert_eq!(redacted["systems"][0]["serial"], REDACTED);
    }
}
