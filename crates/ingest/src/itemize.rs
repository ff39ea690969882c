use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapper keys probed on object payloads, in priority order.
pub const WRAPPER_KEYS: &[&str] = &["data", "items", "results", "records", "rows", "entries", "list"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemizationMethod {
    /// Payload was already an array.
    Array,
    /// Null payload.
    Empty,
    /// Array found under one of [`WRAPPER_KEYS`].
    Wrapped,
    /// Object without a wrapper key, used as one item.
    SingleObject,
    /// Bare string/number/bool, used as one item.
    Scalar,
}

impl std::fmt::Display for ItemizationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Array => write!(f, "array"),
            Self::Empty => write!(f, "empty"),
            Self::Wrapped => write!(f, "wrapped"),
            Self::SingleObject => write!(f, "single_object"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemizeMeta {
    pub itemization_method: ItemizationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper_key: Option<String>,
    pub wrapper_keys_inspected: usize,
    pub item_count: usize,
}

/// Normalize any payload into a flat item list. Never fails.
///
/// Order: array as-is; null → empty; object → first array-valued wrapper key;
/// otherwise the value itself is the single item.
pub fn itemize(payload: &Value) -> (Vec<Value>, ItemizeMeta) {
    let meta = |method, wrapper_key: Option<&str>, inspected, count| ItemizeMeta {
        itemization_method: method,
        wrapper_key: wrapper_key.map(String::from),
        wrapper_keys_inspected: inspected,
        item_count: count,
    };

    match payload {
        Value::Array(items) => {
            let n = items.len();
            (items.clone(), meta(ItemizationMethod::Array, None, 0, n))
        }
        Value::Null => (Vec::new(), meta(ItemizationMethod::Empty, None, 0, 0)),
        Value::Object(obj) => {
            for (i, key) in WRAPPER_KEYS.iter().enumerate() {
                if let Some(Value::Array(items)) = obj.get(*key) {
                    let n = items.len();
                    return (
                        items.clone(),
                        meta(ItemizationMethod::Wrapped, Some(*key), i + 1, n),
                    );
                }
            }
            (
                vec![payload.clone()],
                meta(ItemizationMethod::SingleObject, None, WRAPPER_KEYS.len(), 1),
            )
        }
        _ => (vec![payload.clone()], meta(ItemizationMethod::Scalar, None, 0, 1)),
    }
}

/// One ingested payload and its itemization. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct RawEnvelope {
    source: String,
    payload: Value,
    items: Vec<Value>,
    meta: ItemizeMeta,
}

impl RawEnvelope {
    pub fn new(source: impl Into<String>, payload: Value) -> Self {
        let (items, meta) = itemize(&payload);
        let source = source.into();
        log::debug!(
            "itemized {} payload: method={} items={} wrapper_keys_inspected={}",
            source,
            meta.itemization_method,
            meta.item_count,
            meta.wrapper_keys_inspected
        );
        Self {
            source,
            payload,
            items,
            meta,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn meta(&self) -> &ItemizeMeta {
        &self.meta
    }
}
