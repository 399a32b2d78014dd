use serde_json::{Map, Value};

/// Resolve a dot-notation path in a `serde_json::Value`.
///
/// - `"Identity"` → `value["Identity"]`
/// - `"properties.Identity"` → `value["properties"]["Identity"]`
///
/// Returns `None` if any segment is missing.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Mutable variant of [`resolve_path`].
pub fn resolve_path_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get_mut(segment)?;
    }
    Some(current)
}

/// Первый присутствующий ключ из списка: "key A, иначе key B, иначе None".
/// Пустое значение (см. [`is_empty_payload`]) считается отсутствием.
pub fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a str, &'a Value)> {
    keys.iter()
        .find_map(|k| map.get_key_value(*k).filter(|(_, v)| !is_empty_payload(v)))
        .map(|(k, v)| (k.as_str(), v))
}

/// Первый путь из списка, по которому лежит JSON-объект.
pub fn first_object_path<'a, S: AsRef<str>>(value: &'a Value, paths: &'a [S]) -> Option<&'a str> {
    paths
        .iter()
        .map(AsRef::as_ref)
        .find(|p| resolve_path(value, p).is_some_and(Value::is_object))
}

/// Пустой payload: `null`, `{}`, `[]`, `""`.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Скаляр как ключ таблицы подстановок: `1` и `"1"` дают `"1"`.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(|f| {
                if f.fract() == 0.0 { format!("{}", f as i64) } else { f.to_string() }
            }),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolve_path_walks_nested_objects() {
        let v = json!({"properties": {"Identity": {"Module": 1}}});
        assert_eq!(resolve_path(&v, "properties.Identity.Module"), Some(&json!(1)));
        assert_eq!(resolve_path(&v, "properties.Missing"), None);
    }

    #[test]
    fn first_present_prefers_earlier_key() {
        let v = json!({"elements": [1], "@elements": [2]});
        let map = v.as_object().unwrap();
        let (key, value) = first_present(map, &["@elements", "elements"]).unwrap();
        assert_eq!(key, "@elements");
        assert_eq!(value, &json!([2]));
        assert!(first_present(map, &["children"]).is_none());

        let v = json!({"@elements": null, "elements": [1]});
        let (key, _) = first_present(v.as_object().unwrap(), &["@elements", "elements"]).unwrap();
        assert_eq!(key, "elements");

        let v = json!({"@elements": [], "elements": [1]});
        let (key, _) = first_present(v.as_object().unwrap(), &["@elements", "elements"]).unwrap();
        assert_eq!(key, "elements");
        assert!(first_present(json!({"@elements": []}).as_object().unwrap(), &["@elements"]).is_none());
    }

    #[test]
    fn first_object_path_skips_non_objects() {
        let v = json!({"properties": {"Identity": "flat"}, "parameters": {"Identity": {}}});
        let paths = ["properties.Identity", "parameters.Identity"];
        assert_eq!(first_object_path(&v, &paths), Some("parameters.Identity"));
    }

    #[test]
    fn empty_payload_detection() {
        assert!(is_empty_payload(&json!(null)));
        assert!(is_empty_payload(&json!({})));
        assert!(is_empty_payload(&json!([])));
        assert!(is_empty_payload(&json!("")));
        assert!(!is_empty_payload(&json!({"foo": "bar"})));
        assert!(!is_empty_payload(&json!(0)));
    }

    #[test]
    fn scalar_key_normalizes_numbers_and_strings() {
        assert_eq!(scalar_key(&json!(1)), Some("1".to_string()));
        assert_eq!(scalar_key(&json!(1.0)), Some("1".to_string()));
        assert_eq!(scalar_key(&json!(" 1 ")), Some("1".to_string()));
        assert_eq!(scalar_key(&json!(null)), None);
    }
}
