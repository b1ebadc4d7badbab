//! Topic-keyed event bus with resettable per-node scopes.
//!
//! Every slot node owns an [`EventScope`]. Activities register handlers
//! through the scope of the node they run in, and the node resets the scope
//! when the activity stops so no handler outlives its activity. Scopes are
//! chained: a registration made through a child scope is also recorded by
//! every ancestor scope, so resetting a parent clears its whole subtree.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// An event delivered to every handler registered for its topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

type Handler = Rc<dyn Fn(&Event)>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: BTreeMap<HandlerId, (String, Handler)>,
}

/// Shared, single-threaded event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&Event) + 'static,
    ) -> HandlerId {
        let mut inner = self.inner.borrow_mut();
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.insert(id, (topic.into(), Rc::new(handler)));
        id
    }

    /// Returns `false` if the handler was already removed.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.inner.borrow_mut().handlers.remove(&id).is_some()
    }

    /// Deliver `event` to its topic's handlers in registration order. Returns
    /// how many handlers ran.
    pub fn fire(&self, event: &Event) -> usize {
        // Snapshot first: handlers may register or remove handlers while running.
        let matching: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .values()
            .filter(|(topic, _)| *topic == event.topic)
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &matching {
            handler(event);
        }
        matching.len()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.borrow().handlers.len()
    }
}

struct ScopeLink {
    registered: RefCell<Vec<HandlerId>>,
    parent: Option<Rc<ScopeLink>>,
}

/// Registration boundary for one slot node.
#[derive(Clone)]
pub struct EventScope {
    bus: EventBus,
    link: Rc<ScopeLink>,
}

impl fmt::Debug for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventScope")
            .field("registered", &self.registered_count())
            .finish()
    }
}

impl EventScope {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            link: Rc::new(ScopeLink {
                registered: RefCell::new(Vec::new()),
                parent: None,
            }),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            link: Rc::new(ScopeLink {
                registered: RefCell::new(Vec::new()),
                parent: Some(Rc::clone(&self.link)),
            }),
        }
    }

    pub fn add_handler(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&Event) + 'static,
    ) -> HandlerId {
        let id = self.bus.add_handler(topic, handler);
        let mut link = Some(&self.link);
        while let Some(current) = link {
            current.registered.borrow_mut().push(id);
            link = current.parent.as_ref();
        }
        id
    }

    pub fn fire(&self, event: &Event) -> usize {
        self.bus.fire(event)
    }

    /// Unregister every handler added through this scope or its children.
    /// Ancestor scopes forget the removed ids too.
    pub fn remove_handlers(&self) {
        let ids = std::mem::take(&mut *self.link.registered.borrow_mut());
        if ids.is_empty() {
            return;
        }
        let mut ancestor = self.link.parent.clone();
        while let Some(link) = ancestor {
            link.registered.borrow_mut().retain(|id| !ids.contains(id));
            ancestor = link.parent.clone();
        }
        let removed = ids
            .into_iter()
            .filter(|id| self.bus.remove_handler(*id))
            .count();
        if removed > 0 {
            debug!(removed, "event scope reset");
        }
    }

    pub fn registered_count(&self) -> usize {
        self.link.registered.borrow().len()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
