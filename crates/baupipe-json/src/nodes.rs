use baupipe::{AssemblyNode, BaseNode, ChildNode, Delimiters};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Quotes and escapes `key` as a JSON string.
pub fn quote(key: &str) -> String {
    Value::from(key).to_string()
}

/// Renders one `"key":value` member, the body of a JSON fragment.
///
/// ```
/// use baupipe_json::field;
/// use serde_json::json;
///
/// assert_eq!(field("elapsed", &json!(1.5)), r#""elapsed":1.5"#);
/// assert_eq!(field("say \"hi\"", &json!("x")), r#""say \"hi\"":"x""#);
/// ```
pub fn field(key: &str, value: &Value) -> String {
    format!("{}:{value}", quote(key))
}

/// `"key":{ ... }`
pub fn object(key: &str, unique_id: u64) -> Arc<dyn AssemblyNode> {
    node(key, unique_id, "", "{", "}", "")
}

/// `"key":[ ... ]` holding plain values.
pub fn array(key: &str, unique_id: u64) -> Arc<dyn AssemblyNode> {
    node(key, unique_id, "[", "", "", "]")
}

/// `"key":[{ ... },{ ... }]`. Consecutive fragments of the same conversion
/// become separate objects of the array.
pub fn object_array(key: &str, unique_id: u64) -> Arc<dyn AssemblyNode> {
    node(key, unique_id, "[", "{", "}", "]")
}

/// A level nested in `parent`'s already open slot, e.g. the objects inside an
/// array opened by an ancestor fragment.
pub fn child(parent: &Arc<dyn AssemblyNode>) -> Arc<dyn AssemblyNode> {
    Arc::new(ChildNode::new(Arc::clone(parent)))
}

fn node(
    key: &str,
    unique_id: u64,
    pre_open: &str,
    open: &str,
    close: &str,
    post_close: &str,
) -> Arc<dyn AssemblyNode> {
    Arc::new(BaseNode::new(
        quote(key),
        unique_id,
        Delimiters::new(":", pre_open, open, close, post_close),
    ))
}

/// Hands out one stable unique id per nesting path.
///
/// Two descriptors built from the same path share an id and therefore the
/// same open wrapper when their fragments are adjacent.
#[derive(Clone, Debug, Default)]
pub struct NodeKeys {
    ids: HashMap<String, u64>,
}

impl NodeKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, path: &str) -> u64 {
        let next = self.ids.len() as u64;
        *self.ids.entry(path.to_owned()).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn object(&mut self, key: &str) -> Arc<dyn AssemblyNode> {
        object(key, self.id(key))
    }

    pub fn array(&mut self, key: &str) -> Arc<dyn AssemblyNode> {
        array(key, self.id(key))
    }

    pub fn object_array(&mut self, key: &str) -> Arc<dyn AssemblyNode> {
        object_array(key, self.id(key))
    }
}
