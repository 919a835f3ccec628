//! Filter parameters for list and search requests.

use serde_json::Value;
use std::collections::BTreeMap;

/// Filters as the caller builds them. `None` is an unset value.
pub type Filters = BTreeMap<String, Option<Value>>;

/// Filters ready for transmission.
pub type CleanFilters = BTreeMap<String, Value>;

/// Drop unset and empty-string values.
///
/// Other falsy values (`0`, `false`, `null`) are meaningful and kept.
pub fn clean_filters(filters: &Filters) -> CleanFilters {
  filters
    .iter()
    .filter_map(|(key, value)| match value {
      None => None,
      Some(Value::String(s)) if s.is_empty() => None,
      Some(v) => Some((key.clone(), v.clone())),
    })
    .collect()
}

/// Render a cleaned value as a query-string value.
///
/// `null` has no query-string form and is left out of the request.
pub fn param_value(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s.clone()),
    other => Some(other.to_string()),
  }
}

/// Build filters from optional CLI-style string values.
pub fn filters_from<'a>(
  pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) -> Filters {
  pairs
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.map(|v| Value::String(v.to_string()))))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_clean_filters_keeps_falsy_values() {
    let mut filters = Filters::new();
    filters.insert("a".into(), Some(json!("value")));
    filters.insert("b".into(), Some(json!("")));
    filters.insert("c".into(), None);
    filters.insert("d".into(), Some(json!(0)));
    filters.insert("e".into(), Some(json!(false)));
    filters.insert("f".into(), Some(Value::Null));

    let cleaned = clean_filters(&filters);

    let expected: CleanFilters = [
      ("a".to_string(), json!("value")),
      ("d".to_string(), json!(0)),
      ("e".to_string(), json!(false)),
      ("f".to_string(), Value::Null),
    ]
    .into_iter()
    .collect();
    assert_eq!(cleaned, expected);
  }

  #[test]
  fn test_param_value() {
    assert_eq!(param_value(&json!("Prints")), Some("Prints".to_string()));
    assert_eq!(param_value(&json!(0)), Some("0".to_string()));
    assert_eq!(param_value(&json!(false)), Some("false".to_string()));
    assert_eq!(param_value(&Value::Null), None);
  }

  #[test]
  fn test_filters_from_cli_values() {
    let filters = filters_from([
      ("department_title", Some("Modern Art")),
      ("artwork_type_title", None),
    ]);
    let cleaned = clean_filters(&filters);
    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned["department_title"], json!("Modern Art"));
  }
}
