//! Document-like node tree host.
//!
//! Nodes carry a tag, a set of class names, child nodes and per-event
//! listeners. `query`/`query-all` search descendants by class name; the
//! latter returns a collection, which the interception layer treats as one
//! target for capability calls.

use std::sync::Arc;

use crate::error::HostResult;
use crate::value::Value;

use super::listeners::ListenerSet;
use super::{callback_arg, string_arg, unknown_method, value_arg, Arg, HostObject, HostRef, Member};

const METHODS: &[&str] = &[
    "register-listener",
    "deregister-listener",
    "dispatch-event",
    "query",
    "query-all",
];

/// A node in a document-like tree.
#[derive(Debug)]
pub struct Node {
    tag: String,
    classes: Vec<String>,
    children: Vec<Arc<Node>>,
    listeners: ListenerSet,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            children: Vec::new(),
            listeners: ListenerSet::new(),
        }
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Arc<Node>) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[must_use]
    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    /// Fire `event` on this node. Returns how many listeners ran.
    pub fn fire(&self, event: &str, value: impl Into<Value>) -> usize {
        self.listeners.fire(event, &value.into())
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }

    /// Descendants carrying `class`, depth-first in document order.
    #[must_use]
    pub fn query_all(&self, class: &str) -> Vec<Arc<Node>> {
        let mut out = Vec::new();
        collect(&self.children, class, &mut out);
        out
    }
}

fn collect(nodes: &[Arc<Node>], class: &str, out: &mut Vec<Arc<Node>>) {
    for node in nodes {
        if node.has_class(class) {
            out.push(Arc::clone(node));
        }
        collect(&node.children, class, out);
    }
}

fn as_host(node: Arc<Node>) -> HostRef {
    node
}

impl HostObject for Node {
    fn shape(&self) -> &'static str {
        "node"
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    fn property(&self, name: &str) -> Member {
        match name {
            "tag" => Member::Value(Value::String(self.tag.clone())),
            "class-name" => Member::Value(Value::String(self.classes.join(" "))),
            "first-child" => self
                .children
                .first()
                .map_or(Member::Value(Value::Null), |child| Member::Object(as_host(Arc::clone(child)))),
            "children" => Member::Collection(self.children.iter().cloned().map(as_host).collect()),
            _ => Member::Absent,
        }
    }

    fn invoke(&self, method: &str, args: Vec<Arg>) -> HostResult<Member> {
        match method {
            "register-listener" => {
                let event = string_arg(method, &args, 0)?;
                self.listeners.add(event, callback_arg(method, &args, 1)?);
                Ok(Member::Value(Value::Null))
            }
            "deregister-listener" => {
                let event = string_arg(method, &args, 0)?;
                let callback = callback_arg(method, &args, 1)?;
                Ok(Member::Value(Value::Bool(self.listeners.remove(event, &callback))))
            }
            "dispatch-event" => {
                let event = string_arg(method, &args, 0)?;
                let delivered = self.listeners.fire(event, &value_arg(&args, 1));
                Ok(Member::Value(Value::Int(delivered as i64)))
            }
            "query" => {
                let class = string_arg(method, &args, 0)?;
                Ok(self
                    .query_all(class)
                    .into_iter()
                    .next()
                    .map_or(Member::Value(Value::Null), |node| Member::Object(as_host(node))))
            }
            "query-all" => {
                let class = string_arg(method, &args, 0)?;
                Ok(Member::Collection(
                    self.query_all(class).into_iter().map(as_host).collect(),
                ))
            }
            other => Err(unknown_method(self.shape(), other)),
        }
    }
}
