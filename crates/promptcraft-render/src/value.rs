//! Value coercion for substituted placeholders.

use std::collections::BTreeMap;

/// Variables supplied to a render call, keyed by placeholder name.
///
/// Values are JSON so that numbers, booleans, lists and maps can flow into
/// expression templates unchanged; the brace renderers coerce them with
/// [`value_to_string`].
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Formats a JSON value as the text substituted for a placeholder.
///
/// Strings are inserted verbatim, numbers and booleans use their JSON text,
/// `null` becomes the empty string, and lists and maps are rendered as
/// compact JSON.
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => value.to_string(),
    }
}

/// Builds a [`Variables`] map from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so anything serializable works.
///
/// ```rust
/// use promptcraft_render::vars;
///
/// let variables = vars! { "name" => "Alice", "age" => 30 };
/// assert_eq!(variables["age"], 30);
/// ```
#[macro_export]
macro_rules! vars {
    () => {
        $crate::Variables::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut variables = $crate::Variables::new();
        $(
            variables.insert(
                ::std::string::String::from($key),
                $crate::__private::serde_json::json!($value),
            );
        )+
        variables
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_verbatim() {
        assert_eq!(value_to_string(&json!("Alice")), "Alice");
    }

    #[test]
    fn test_number_and_bool() {
        assert_eq!(value_to_string(&json!(30)), "30");
        assert_eq!(value_to_string(&json!(19.5)), "19.5");
        assert_eq!(value_to_string(&json!(true)), "true");
    }

    #[test]
    fn test_null_is_empty() {
        assert_eq!(value_to_string(&json!(null)), "");
    }

    #[test]
    fn test_collections_are_json() {
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
        assert_eq!(value_to_string(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_vars_macro() {
        let variables = crate::vars! { "name" => "Bob", "items" => vec![1, 2] };
        assert_eq!(variables.len(), 2);
        assert_eq!(variables["name"], json!("Bob"));
        assert_eq!(variables["items"], json!([1, 2]));
        assert!(crate::vars! {}.is_empty());
    }
}
