//! Nested key-value documents returned by product metadata queries
//!
//! Keys compare case-insensitively. Leaf values are kept as strings; the
//! caller decides how to interpret them.

use serde_json::Value;

/// A node in a metadata document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyValue {
    name: String,
    value: Option<String>,
    children: Vec<KeyValue>,
}

impl KeyValue {
    /// Create a leaf node
    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Create an interior node
    pub fn node(name: impl Into<String>, children: Vec<KeyValue>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leaf value, if this node is a leaf
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn children(&self) -> &[KeyValue] {
        &self.children
    }

    /// First child whose name matches `key`, ignoring ASCII case
    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.children
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(key))
    }

    /// Walk a path of keys from this node
    pub fn path(&self, keys: &[&str]) -> Option<&KeyValue> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Convert a JSON document into a key-value tree rooted at `name`
    ///
    /// Objects become interior nodes, arrays become interior nodes keyed by
    /// index, scalars become leaves. `null` becomes an empty interior node.
    pub fn from_json(name: impl Into<String>, value: &Value) -> Self {
        let name = name.into();
        match value {
            Value::Object(map) => Self::node(
                name,
                map.iter()
                    .map(|(key, child)| Self::from_json(key.clone(), child))
                    .collect(),
            ),
            Value::Array(items) => Self::node(
                name,
                items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| Self::from_json(index.to_string(), child))
                    .collect(),
            ),
            Value::String(s) => Self::leaf(name, s.clone()),
            Value::Number(n) => Self::leaf(name, n.to_string()),
            Value::Bool(b) => Self::leaf(name, if *b { "1" } else { "0" }),
            Value::Null => Self::node(name, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_insensitive_lookup() {
        let doc = KeyValue::node(
            "appinfo",
            vec![KeyValue::node(
                "Depots",
                vec![KeyValue::leaf("baselanguages", "english")],
            )],
        );
        let leaf = doc.path(&["depots", "BaseLanguages"]).unwrap();
        assert_eq!(leaf.as_str(), Some("english"));
        assert!(doc.path(&["depots", "missing"]).is_none());
    }

    #[test]
    fn test_from_json() {
        let doc = KeyValue::from_json(
            "10",
            &json!({
                "depots": {
                    "1": { "manifests": { "public": { "gid": "555", "size": 10 } } }
                },
                "flags": [true, null]
            }),
        );

        let gid = doc.path(&["depots", "1", "manifests", "public", "gid"]);
        assert_eq!(gid.and_then(KeyValue::as_str), Some("555"));
        let size = doc.path(&["depots", "1", "manifests", "public", "size"]);
        assert_eq!(size.and_then(KeyValue::as_str), Some("10"));
        assert_eq!(doc.path(&["flags", "0"]).unwrap().as_str(), Some("1"));
        assert!(doc.path(&["flags", "1"]).unwrap().children().is_empty());
    }
}
