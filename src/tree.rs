//! In-memory representation of the external parser's output.
//!
//! The parser returns heterogeneous JSON; normalization recovers static
//! discipline by promoting any object carrying an integer `kind` to a
//! [`TreeNode`]. Map children live in a `BTreeMap`, so every traversal
//! observes keys in lexical order and feature extraction stays
//! deterministic.

use serde_json::Value;
use std::collections::BTreeMap;

/// One value in a normalized parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Seq(Vec<TreeValue>),
    Map(BTreeMap<String, TreeValue>),
    Node(Box<TreeNode>),
}

/// A tagged parser node: opaque integer kind plus children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: i64,
    pub flags: i64,
    pub lineno: i64,
    pub children: TreeValue,
}

/// Outcome of decoding a parser response payload.
pub enum ParsePayload {
    /// The parser produced a tree.
    Tree(TreeValue),
    /// The parser reported a file-level parse error.
    Rejected(String),
}

/// Decode the parser's JSON payload: an object with either an `ast` root
/// or a `reason` string. Any other shape is a structural failure.
pub fn decode_payload(data: &[u8]) -> anyhow::Result<ParsePayload> {
    let raw: Value = serde_json::from_slice(data)?;
    let obj = match raw {
        Value::Object(map) => map,
        other => anyhow::bail!("unexpected payload type: {}", type_name(&other)),
    };

    if let Some(ast) = obj.get("ast") {
        return Ok(ParsePayload::Tree(normalize(ast)));
    }
    if let Some(reason) = obj.get("reason") {
        let text = reason.as_str().unwrap_or("unrecognized parser error").to_string();
        return Ok(ParsePayload::Rejected(text));
    }
    anyhow::bail!("payload object has neither 'ast' nor 'reason'")
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Recursively convert raw JSON into tree values, promoting node maps.
pub fn normalize(value: &Value) -> TreeValue {
    match value {
        Value::Null => TreeValue::Null,
        Value::Bool(b) => TreeValue::Bool(*b),
        Value::Number(n) => TreeValue::Num(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => TreeValue::Str(s.clone()),
        Value::Array(items) => TreeValue::Seq(items.iter().map(normalize).collect()),
        Value::Object(map) => {
            if let Some(kind) = map.get("kind").and_then(as_int) {
                let flags = map.get("flags").and_then(as_int).unwrap_or(0);
                let lineno = map.get("lineno").and_then(as_int).unwrap_or(0);
                let children = map
                    .get("children")
                    .map(normalize)
                    .unwrap_or(TreeValue::Null);
                return TreeValue::Node(Box::new(TreeNode {
                    kind,
                    flags,
                    lineno,
                    children,
                }));
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize(v));
            }
            TreeValue::Map(out)
        }
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().map(|f| f as i64)
            }
        }
        _ => None,
    }
}
