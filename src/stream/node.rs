//! Root and child stream nodes.
//!
//! A root owns the authoritative instance and listener lists. A child holds a
//! pipeline and an explicit reference to its root; it keeps no bookkeeping of
//! its own. Piping a child extends its pipeline instead of nesting a new node,
//! so fan-out only happens at the root.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, trace, warn};

use crate::error::StreamError;
use crate::value::Value;

use super::callback::{Callback, Listener, Transform};
use super::ids::StreamId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking listener must not wedge every later dispatch.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct ChildState {
    pipeline: Vec<Transform>,
    value: Value,
}

#[derive(Debug)]
struct ChildNode {
    id: StreamId,
    state: Mutex<ChildState>,
}

impl ChildNode {
    fn value(&self) -> Value {
        lock(&self.state).value.clone()
    }
}

#[derive(Debug, Clone)]
enum NodeRef {
    Root,
    Child(Arc<ChildNode>),
}

#[derive(Debug, Clone)]
struct ListenerEntry {
    listener: Listener,
    node: NodeRef,
}

impl ListenerEntry {
    fn is_on(&self, node: Option<StreamId>) -> bool {
        match (&self.node, node) {
            (NodeRef::Root, None) => true,
            (NodeRef::Child(child), Some(id)) => child.id == id,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct RootState {
    value: Value,
    instances: Vec<Arc<ChildNode>>,
    listeners: Vec<ListenerEntry>,
    registration_value: Option<Value>,
}

#[derive(Debug)]
struct RootStream {
    id: StreamId,
    state: Arc<Mutex<RootState>>,
    adapter: OnceLock<Callback>,
}

#[derive(Debug)]
struct ChildStream {
    root: Arc<RootStream>,
    node: Arc<ChildNode>,
    adapter: OnceLock<Callback>,
}

#[derive(Debug, Clone)]
enum Kind {
    Root(Arc<RootStream>),
    Child(Arc<ChildStream>),
}

/// A push-based value stream.
///
/// A root stream is created for every intercepted registration call and is
/// fed by its [`adapter`](Stream::adapter). Child streams are derived with
/// [`pipe`](Stream::pipe). Cloning a `Stream` clones the handle, not the node.
#[derive(Debug, Clone)]
pub struct Stream {
    kind: Kind,
}

impl Stream {
    /// Create a fresh root stream with no children and no listeners.
    #[must_use]
    pub fn new() -> Self {
        let id = StreamId::new();
        debug!(stream = %id, "created root stream");
        Self {
            kind: Kind::Root(Arc::new(RootStream {
                id,
                state: Arc::new(Mutex::new(RootState::default())),
                adapter: OnceLock::new(),
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> StreamId {
        match &self.kind {
            Kind::Root(root) => root.id,
            Kind::Child(child) => child.node.id,
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self.kind, Kind::Root(_))
    }

    /// The root this node belongs to (itself for a root).
    #[must_use]
    pub fn root(&self) -> Self {
        match &self.kind {
            Kind::Root(_) => self.clone(),
            Kind::Child(child) => Self {
                kind: Kind::Root(Arc::clone(&child.root)),
            },
        }
    }

    fn owning_root(&self) -> &Arc<RootStream> {
        match &self.kind {
            Kind::Root(root) => root,
            Kind::Child(child) => &child.root,
        }
    }

    fn node_id(&self) -> Option<StreamId> {
        match &self.kind {
            Kind::Root(_) => None,
            Kind::Child(child) => Some(child.node.id),
        }
    }

    /// The last value dispatched into (root) or computed for (child) this node.
    #[must_use]
    pub fn value(&self) -> Value {
        match &self.kind {
            Kind::Root(root) => lock(&root.state).value.clone(),
            Kind::Child(child) => child.node.value(),
        }
    }

    /// Number of children attached to the owning root.
    #[must_use]
    pub fn children_len(&self) -> usize {
        lock(&self.owning_root().state).instances.len()
    }

    /// Number of listener entries recorded on the owning root.
    #[must_use]
    pub fn listeners_len(&self) -> usize {
        lock(&self.owning_root().state).listeners.len()
    }

    /// Number of transforms in this node's pipeline (zero for a root).
    #[must_use]
    pub fn pipeline_len(&self) -> usize {
        match &self.kind {
            Kind::Root(_) => 0,
            Kind::Child(child) => lock(&child.node.state).pipeline.len(),
        }
    }

    /// Attach a transform.
    ///
    /// On a root this allocates a new child whose pipeline is `[transform]`,
    /// seeded with the root's current value. On a child the transform is
    /// appended and the same child is returned.
    pub fn pipe(&self, transform: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        let transform = Transform::new(transform);
        match &self.kind {
            Kind::Root(root) => {
                let node = {
                    let mut state = lock(&root.state);
                    let node = Arc::new(ChildNode {
                        id: StreamId::new(),
                        state: Mutex::new(ChildState {
                            pipeline: vec![transform],
                            value: state.value.clone(),
                        }),
                    });
                    state.instances.push(Arc::clone(&node));
                    node
                };
                debug!(root = %root.id, child = %node.id, "attached child stream");
                Self {
                    kind: Kind::Child(Arc::new(ChildStream {
                        root: Arc::clone(root),
                        node,
                        adapter: OnceLock::new(),
                    })),
                }
            }
            Kind::Child(child) => {
                lock(&child.node.state).pipeline.push(transform);
                self.clone()
            }
        }
    }

    /// Register a value listener on this node.
    ///
    /// The entry is stored on the root, tagged with this node, so it fires in
    /// global registration order with this node's current value.
    pub fn on_value(&self, listener: &Listener) {
        let node = match &self.kind {
            Kind::Root(_) => NodeRef::Root,
            Kind::Child(child) => NodeRef::Child(Arc::clone(&child.node)),
        };
        lock(&self.owning_root().state).listeners.push(ListenerEntry {
            listener: listener.clone(),
            node,
        });
    }

    /// Remove the first registration of `listener` on this node.
    ///
    /// Registrations of the same listener on other nodes are left alone.
    pub fn off_value(&self, listener: &Listener) -> bool {
        let node = self.node_id();
        let mut state = lock(&self.owning_root().state);
        let position = state
            .listeners
            .iter()
            .position(|entry| entry.listener == *listener && entry.is_on(node));
        match position {
            Some(index) => {
                state.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Detach `child` from this root and purge every listener tagged with it.
    ///
    /// Only valid on a root; on a child this logs a warning and returns false.
    pub fn remove(&self, child: &Self) -> bool {
        let Kind::Root(root) = &self.kind else {
            let err = StreamError::InvalidDispatchTarget {
                id: self.id(),
                operation: "remove children",
            };
            warn!(%err, "remove a child from its root stream instead");
            return false;
        };

        let Kind::Child(target) = &child.kind else {
            return false;
        };

        if target.root.id != root.id {
            let err = StreamError::NotAttached {
                root: root.id,
                child: target.node.id,
            };
            debug!(%err, "ignored remove");
            return false;
        }

        let child_id = target.node.id;
        let mut state = lock(&root.state);
        let before = state.instances.len();
        state.instances.retain(|node| node.id != child_id);
        if state.instances.len() == before {
            return false;
        }
        state.listeners.retain(|entry| !entry.is_on(Some(child_id)));
        debug!(root = %root.id, child = %child_id, "removed child stream");
        true
    }

    /// Deliver a value into this root.
    ///
    /// Returns false (after logging a warning) when called on a child.
    pub fn dispatch(&self, value: Value) -> bool {
        match &self.kind {
            Kind::Root(root) => {
                dispatch_root(root.id, &root.state, value);
                true
            }
            Kind::Child(child) => {
                reject_child_dispatch(child.node.id);
                false
            }
        }
    }

    /// The callback a host should invoke to feed this stream.
    ///
    /// Created on first use and memoized, so every call returns a callback
    /// with the same identity. A child's adapter only logs a warning.
    #[must_use]
    pub fn adapter(&self) -> Callback {
        match &self.kind {
            Kind::Root(root) => root
                .adapter
                .get_or_init(|| {
                    let id = root.id;
                    let state = Arc::clone(&root.state);
                    Callback::new(move |value| dispatch_root(id, &state, value))
                })
                .clone(),
            Kind::Child(child) => child
                .adapter
                .get_or_init(|| {
                    let id = child.node.id;
                    Callback::new(move |_| reject_child_dispatch(id))
                })
                .clone(),
        }
    }

    /// The non-null value the host returned when this root was registered
    /// (a timer handle, for instance).
    #[must_use]
    pub fn registration_value(&self) -> Option<Value> {
        match &self.kind {
            Kind::Root(root) => lock(&root.state).registration_value.clone(),
            Kind::Child(_) => None,
        }
    }

    pub(crate) fn capture_registration_value(&self, value: Value) {
        if value.is_null() {
            return;
        }
        if let Kind::Root(root) = &self.kind {
            lock(&root.state).registration_value = Some(value);
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Stream {}

fn reject_child_dispatch(id: StreamId) {
    let err = StreamError::InvalidDispatchTarget {
        id,
        operation: "receive dispatched values",
    };
    warn!(%err, "child streams cannot be fed directly");
}

fn dispatch_root(id: StreamId, state: &Mutex<RootState>, value: Value) {
    let (instances, listeners) = {
        let mut guard = lock(state);
        guard.value = value.clone();
        (guard.instances.clone(), guard.listeners.clone())
    };

    for child in &instances {
        let (pipeline, seed) = {
            let guard = lock(&child.state);
            (guard.pipeline.clone(), guard.value.clone())
        };
        let next = pipeline
            .iter()
            .fold(seed, |acc, transform| transform.apply(&acc, &value));
        lock(&child.state).value = next;
    }

    trace!(stream = %id, children = instances.len(), listeners = listeners.len(), "dispatch");

    for entry in &listeners {
        match &entry.node {
            NodeRef::Root => entry.listener.notify(&value),
            NodeRef::Child(child) => entry.listener.notify(&child.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: &str| {
            let sink = Arc::clone(&sink);
            let tag = tag.to_string();
            Listener::new(move |v| sink.lock().unwrap().push(format!("{tag}:{v}")))
        };
        (log, make)
    }

    fn add(n: i64) -> impl Fn(&Value, &Value) -> Value + Send + Sync + 'static {
        move |acc, _| Value::Int(acc.as_int().unwrap_or(0) + n)
    }

    #[test]
    fn adapter_identity_is_stable() {
        let stream = Stream::new();
        assert_eq!(stream.adapter(), stream.adapter());
        assert_ne!(stream.adapter(), Stream::new().adapter());
    }

    #[test]
    fn adapter_feeds_root() {
        let stream = Stream::new();
        stream.adapter().call(Value::from("tick"));
        assert_eq!(stream.value(), Value::from("tick"));
    }

    #[test]
    fn listeners_fire_in_registration_order_across_nodes() {
        let root = Stream::new();
        let c1 = root.pipe(add(1));
        let c2 = root.pipe(add(-1));
        let (log, make) = recorder();

        c2.on_value(&make("c2"));
        root.on_value(&make("root"));
        c1.on_value(&make("c1"));

        assert!(root.dispatch(Value::Int(10)));
        assert_eq!(*log.lock().unwrap(), vec!["c2:-1", "root:10", "c1:1"]);
    }

    #[test]
    fn children_recompute_in_attachment_order() {
        let order = Arc::new(StdMutex::new(Vec::new()));
        let root = Stream::new();
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            root.pipe(move |acc, _| {
                order.lock().unwrap().push(tag);
                acc.clone()
            });
        }
        root.dispatch(Value::Null);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn pipeline_folds_over_previous_child_value() {
        let root = Stream::new();
        root.dispatch(Value::Int(100));

        // f1 adds the raw value to the accumulator, f2 doubles it.
        let child = root
            .pipe(|acc, raw| Value::Int(acc.as_int().unwrap_or(0) + raw.as_int().unwrap_or(0)))
            .pipe(|acc, _| Value::Int(acc.as_int().unwrap_or(0) * 2));
        assert_eq!(child.value(), Value::Int(100));

        root.dispatch(Value::Int(1));
        assert_eq!(child.value(), Value::Int((100 + 1) * 2));

        root.dispatch(Value::Int(3));
        assert_eq!(child.value(), Value::Int((202 + 3) * 2));
    }

    #[test]
    fn pipe_on_child_extends_the_same_child() {
        let root = Stream::new();
        let child = root.pipe(add(1));
        let again = child.pipe(add(10));
        assert_eq!(child, again);
        assert_eq!(child.pipeline_len(), 2);
        assert_eq!(root.children_len(), 1);
        assert_eq!(again.root(), root);
    }

    #[test]
    fn removing_child_stops_only_its_listeners() {
        let root = Stream::new();
        let c1 = root.pipe(add(1));
        let c2 = root.pipe(add(-1));
        let (log, make) = recorder();
        c1.on_value(&make("c1"));
        c2.on_value(&make("c2"));

        root.dispatch(Value::Null);
        assert!(root.remove(&c1));
        root.dispatch(Value::Null);

        assert_eq!(*log.lock().unwrap(), vec!["c1:1", "c2:-1", "c2:-2"]);
        assert_eq!(c1.value(), Value::Int(1));
        assert_eq!(root.children_len(), 1);
        assert_eq!(root.listeners_len(), 1);
        assert!(!root.remove(&c1));
    }

    #[test]
    fn remove_on_child_is_rejected() {
        let root = Stream::new();
        let c1 = root.pipe(add(1));
        let c2 = root.pipe(add(2));
        assert!(!c1.remove(&c2));
        assert_eq!(root.children_len(), 2);
    }

    #[test]
    fn remove_ignores_foreign_children() {
        let a = Stream::new();
        let b = Stream::new();
        let child_of_b = b.pipe(add(1));
        assert!(!a.remove(&child_of_b));
        assert_eq!(b.children_len(), 1);
    }

    #[test]
    fn dispatch_on_child_is_a_noop() {
        let root = Stream::new();
        let child = root.pipe(add(1));
        assert!(!child.dispatch(Value::Int(5)));
        child.adapter().call(Value::Int(5));
        assert_eq!(child.value(), Value::Null);
        assert_eq!(root.value(), Value::Null);
        assert_eq!(child.adapter(), child.adapter());
    }

    #[test]
    fn off_value_only_removes_entry_for_that_node() {
        let root = Stream::new();
        let child = root.pipe(add(1));
        let (log, make) = recorder();
        let shared = make("shared");
        root.on_value(&shared);
        child.on_value(&shared);

        assert!(child.off_value(&shared));
        assert!(!child.off_value(&shared));
        root.dispatch(Value::Int(7));

        assert_eq!(*log.lock().unwrap(), vec!["shared:7"]);
        assert_eq!(root.listeners_len(), 1);
    }

    #[test]
    fn mutations_during_dispatch_apply_to_next_dispatch() {
        let root = Stream::new();
        let late_runs = Arc::new(StdMutex::new(0));
        let attach_from = root.clone();
        let counter = Arc::clone(&late_runs);
        let attached = Arc::new(StdMutex::new(false));
        root.on_value(&Listener::new(move |_| {
            let mut done = attached.lock().unwrap();
            if !*done {
                *done = true;
                let counter = Arc::clone(&counter);
                attach_from.pipe(move |acc, _| {
                    *counter.lock().unwrap() += 1;
                    acc.clone()
                });
            }
        }));

        root.dispatch(Value::Int(1));
        assert_eq!(*late_runs.lock().unwrap(), 0);
        root.dispatch(Value::Int(2));
        assert_eq!(*late_runs.lock().unwrap(), 1);
    }

    #[test]
    fn listener_attached_by_a_transform_waits_for_next_dispatch() {
        let root = Stream::new();
        let heard = Arc::new(StdMutex::new(Vec::new()));
        let attach_to = root.clone();
        let sink = Arc::clone(&heard);
        let attached = Arc::new(StdMutex::new(false));
        let _child = root.pipe(move |_, raw| {
            let mut done = attached.lock().unwrap();
            if !*done {
                *done = true;
                let sink = Arc::clone(&sink);
                attach_to.on_value(&Listener::new(move |v| sink.lock().unwrap().push(v.clone())));
            }
            raw.clone()
        });

        root.dispatch(Value::Int(1));
        assert!(heard.lock().unwrap().is_empty());
        root.dispatch(Value::Int(2));
        assert_eq!(*heard.lock().unwrap(), vec![Value::Int(2)]);
    }

    #[test]
    fn sibling_removed_by_a_listener_still_fires_in_that_pass() {
        let root = Stream::new();
        let sibling = root.pipe(add(1));
        let hits = Arc::new(StdMutex::new(0));

        let (remover_root, target) = (root.clone(), sibling.clone());
        root.on_value(&Listener::new(move |_| {
            remover_root.remove(&target);
        }));
        let counter = Arc::clone(&hits);
        sibling.on_value(&Listener::new(move |_| *counter.lock().unwrap() += 1));

        root.dispatch(Value::Int(1));
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(root.children_len(), 0);

        root.dispatch(Value::Int(2));
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(sibling.value(), Value::Int(1));
    }

    #[test]
    fn registration_value_ignores_null() {
        let root = Stream::new();
        root.capture_registration_value(Value::Null);
        assert_eq!(root.registration_value(), None);
        root.capture_registration_value(Value::Int(4));
        assert_eq!(root.registration_value(), Some(Value::Int(4)));
        assert_eq!(root.pipe(add(1)).registration_value(), None);
    }
}
