//! A tagged JSON tree with ordinal, depth-first addressing.
//!
//! `serde_json::Value` cannot hold non-finite floats, duplicate object keys or
//! a distinction between integers and floats that survives arithmetic, all of
//! which the JSON mutators produce on purpose. `JsonNode` keeps members in
//! document order as a plain list so all three are representable.

use serde_json::Value;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonNode {
    Null,
    Bool(bool),
    /// Wide enough for the exact product of two 64-bit integers.
    Int(i128),
    Float(f64),
    String(String),
    Array(Vec<JsonNode>),
    Object(Vec<(String, JsonNode)>),
}

/// The variant tag of a [`JsonNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

/// Mutable access to the entries of a container node.
pub enum Entries<'a> {
    Array(&'a mut Vec<JsonNode>),
    Object(&'a mut Vec<(String, JsonNode)>),
}

impl JsonNode {
    /// Parses a JSON document. Returns `None` for anything `serde_json` rejects.
    pub fn parse(bytes: &[u8]) -> Option<JsonNode> {
        serde_json::from_slice::<Value>(bytes)
            .ok()
            .map(JsonNode::from)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            JsonNode::Null => NodeKind::Null,
            JsonNode::Bool(_) => NodeKind::Bool,
            JsonNode::Int(_) => NodeKind::Int,
            JsonNode::Float(_) => NodeKind::Float,
            JsonNode::String(_) => NodeKind::String,
            JsonNode::Array(_) => NodeKind::Array,
            JsonNode::Object(_) => NodeKind::Object,
        }
    }

    /// Number of nodes of `kind` in the tree, the root included.
    pub fn count(&self, kind: NodeKind) -> usize {
        let own = usize::from(self.kind() == kind);
        own + self.children().map(|child| child.count(kind)).sum::<usize>()
    }

    /// Applies `f` to the `n`-th node of `kind` in pre-order. Returns whether a node was found.
    pub fn modify_nth<F>(&mut self, kind: NodeKind, n: usize, f: F) -> bool
    where
        F: FnOnce(&mut JsonNode),
    {
        let mut seen = 0;
        let mut f = Some(f);
        self.modify_nth_inner(kind, n, &mut seen, &mut f)
    }

    fn modify_nth_inner<F>(
        &mut self,
        kind: NodeKind,
        n: usize,
        seen: &mut usize,
        f: &mut Option<F>,
    ) -> bool
    where
        F: FnOnce(&mut JsonNode),
    {
        if self.kind() == kind {
            if *seen == n {
                if let Some(f) = f.take() {
                    f(self);
                }
                return true;
            }
            *seen += 1;
        }
        match self {
            JsonNode::Array(items) => items
                .iter_mut()
                .any(|item| item.modify_nth_inner(kind, n, seen, f)),
            JsonNode::Object(members) => members
                .iter_mut()
                .any(|(_, value)| value.modify_nth_inner(kind, n, seen, f)),
            _ => false,
        }
    }

    /// Number of container entries (array elements and object members) in the tree.
    pub fn count_entries(&self) -> usize {
        let own = match self {
            JsonNode::Array(items) => items.len(),
            JsonNode::Object(members) => members.len(),
            _ => 0,
        };
        own + self.children().map(JsonNode::count_entries).sum::<usize>()
    }

    /// Applies `f` to the container holding the `n`-th entry, together with the entry's position.
    ///
    /// Entries are numbered depth-first: each entry is counted before the entries nested in it.
    pub fn modify_nth_entry<F>(&mut self, n: usize, f: F) -> bool
    where
        F: FnOnce(Entries<'_>, usize),
    {
        let mut seen = 0;
        let mut f = Some(f);
        self.modify_nth_entry_inner(n, &mut seen, &mut f)
    }

    fn modify_nth_entry_inner<F>(&mut self, n: usize, seen: &mut usize, f: &mut Option<F>) -> bool
    where
        F: FnOnce(Entries<'_>, usize),
    {
        match self {
            JsonNode::Array(items) => {
                for i in 0..items.len() {
                    if *seen == n {
                        if let Some(f) = f.take() {
                            f(Entries::Array(&mut *items), i);
                        }
                        return true;
                    }
                    *seen += 1;
                    if items[i].modify_nth_entry_inner(n, seen, f) {
                        return true;
                    }
                }
                false
            }
            JsonNode::Object(members) => {
                for i in 0..members.len() {
                    if *seen == n {
                        if let Some(f) = f.take() {
                            f(Entries::Object(&mut *members), i);
                        }
                        return true;
                    }
                    *seen += 1;
                    if members[i].1.modify_nth_entry_inner(n, seen, f) {
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = &JsonNode> + '_> {
        match self {
            JsonNode::Array(items) => Box::new(items.iter()),
            JsonNode::Object(members) => Box::new(members.iter().map(|(_, v)| v)),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Serializes with `", "` and `": "` separators.
    ///
    /// Non-finite floats are written as the bare tokens `NaN`, `Infinity` and
    /// `-Infinity`, which strict parsers reject.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            JsonNode::Null => out.push_str("null"),
            JsonNode::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            JsonNode::Int(i) => {
                let _ = write!(out, "{i}");
            }
            JsonNode::Float(f) => out.push_str(&render_float(*f)),
            JsonNode::String(s) => render_string(s, out),
            JsonNode::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_into(out);
                }
                out.push(']');
            }
            JsonNode::Object(members) => {
                out.push('{');
                for (i, (key, value)) in members.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    render_string(key, out);
                    out.push_str(": ");
                    value.render_into(out);
                }
                out.push('}');
            }
        }
    }
}

impl From<Value> for JsonNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonNode::Null,
            Value::Bool(b) => JsonNode::Bool(b),
            // Integer literals beyond 64 bits keep their exact digits.
            Value::Number(n) => match n.to_string().parse::<i128>() {
                Ok(i) => JsonNode::Int(i),
                Err(_) => JsonNode::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => JsonNode::String(s),
            Value::Array(items) => JsonNode::Array(items.into_iter().map(JsonNode::from).collect()),
            Value::Object(map) => {
                JsonNode::Object(map.into_iter().map(|(k, v)| (k, JsonNode::from(v))).collect())
            }
        }
    }
}

pub(crate) fn render_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format!("{f:?}")
    }
}

fn render_string(s: &str, out: &mut String) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
    }
}
