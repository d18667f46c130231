//! Turning a flat operation list into nested blocks, and the JSON shape
//! those blocks are published in.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value as Json};

use crate::error::{Error, Result};

use super::operation::{sort_operations, OpKind, Operation};

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub operation: Operation,
    /// Body of a block opener; `None` for plain operations.
    pub children: Option<Vec<Node>>,
}

impl Node {
    fn leaf(operation: Operation) -> Self {
        Node {
            operation,
            children: None,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.operation.kind
    }
}

fn closes(opener: OpKind, closer: OpKind) -> bool {
    match closer {
        OpKind::Else | OpKind::EndIf => matches!(opener, OpKind::If | OpKind::Else),
        OpKind::EndLoop => opener == OpKind::Loop,
        OpKind::EndSwitch => opener == OpKind::Switch,
        _ => false,
    }
}

/// Sorts `operations` by position and nests them into blocks.
///
/// Closing markers are consumed. A block whose body is empty is dropped along
/// with its opener.
pub fn nest(operations: &[Operation]) -> Result<Vec<Node>> {
    let mut sorted = operations.to_vec();
    sort_operations(&mut sorted);

    let mut root = Vec::new();
    let mut open: Vec<(Operation, Vec<Node>)> = Vec::new();

    for op in sorted {
        if op.kind.closes() {
            let (opener, body) = open.pop().ok_or_else(|| {
                Error::Nesting(format!("{} at {} closes no block", op.kind, op.position))
            })?;
            if !closes(opener.kind, op.kind) {
                return Err(Error::Nesting(format!(
                    "{} at {} cannot close {} at {}",
                    op.kind, op.position, opener.kind, opener.position
                )));
            }
            if !body.is_empty() {
                let parent = open.last_mut().map_or(&mut root, |(_, body)| body);
                parent.push(Node {
                    operation: opener,
                    children: Some(body),
                });
            }
        }

        if op.kind.opens() {
            open.push((op, Vec::new()));
        } else if !op.kind.closes() {
            let parent = open.last_mut().map_or(&mut root, |(_, body)| body);
            parent.push(Node::leaf(op));
        }
    }

    if let Some((opener, _)) = open.last() {
        return Err(Error::Nesting(format!(
            "{} at {} is never closed",
            opener.kind, opener.position
        )));
    }
    Ok(root)
}

fn cleanup_patterns() -> &'static [(Regex, &'static str); 2] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"^\((.*[^(])\)$").expect("valid pattern"), "$1"),
            (Regex::new(r"(^|[() ])this\.").expect("valid pattern"), "$1"),
        ]
    })
}

/// Drops the outer parentheses of a fully wrapped expression and `this.` qualifiers.
pub fn clean_field(field: &str) -> String {
    let mut field = field.to_string();
    for (pattern, replacement) in cleanup_patterns() {
        field = pattern.replace_all(&field, *replacement).into_owned();
    }
    field
}

fn node_json(node: &Node) -> Json {
    let mut object = Map::new();
    object.insert("operation".into(), Json::String(node.operation.kind.name().into()));
    for (&key, value) in &node.operation.attrs {
        let value = match key {
            "field" | "condition" => clean_field(value),
            _ => value.clone(),
        };
        object.insert(key.into(), Json::String(value));
    }
    if let Some(children) = &node.children {
        object.insert(
            "instructions".into(),
            Json::Array(children.iter().map(node_json).collect()),
        );
    }
    Json::Object(object)
}

/// Nested JSON form of `operations`: `{"instructions": [...]}`.
pub fn format(operations: &[Operation]) -> Result<Json> {
    let nodes = nest(operations)?;
    Ok(json!({ "instructions": nodes.iter().map(node_json).collect::<Vec<_>>() }))
}
