//! Synchronous publish/subscribe channels
//!
//! Every component creates its own [`Event`] channels when it is built and
//! exposes them as fields. Composition code wires channels together
//! explicitly by subscribing forwarding closures.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::types::{LaneId, Side};

/// Handle returned by [`Event::subscribe`], used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Handler<T> = Box<dyn FnMut(&T)>;

struct Subscribers<T> {
    next_id: usize,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

/// A notification channel
///
/// Cloning an `Event` yields another handle to the same subscriber list, so a
/// clone can be moved into a forwarding closure. Subscribers run in
/// subscription order, synchronously inside [`Event::emit`]. A handler must
/// not subscribe to or emit on the channel that is currently calling it.
pub struct Event<T> {
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, handler: impl FnMut(&T) + 'static) -> SubscriptionId {
        let mut subs = self.subscribers.borrow_mut();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        let before = subs.handlers.len();
        subs.handlers.retain(|(sub_id, _)| *sub_id != id);
        subs.handlers.len() != before
    }

    pub fn emit(&self, args: &T) {
        let mut subs = self.subscribers.borrow_mut();
        for (_, handler) in subs.handlers.iter_mut() {
            handler(args);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().handlers.len()
    }
}

impl<T: 'static> Event<T> {
    /// Re-publish everything emitted here on `target`
    pub fn forward_to(&self, target: &Event<T>) -> SubscriptionId {
        let target = target.clone();
        self.subscribe(move |args| target.emit(args))
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Payload of a car-entered-intersection notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarEntered {
    pub entrance: LaneId,
    pub exit: LaneId,
}

/// Crosswalk occupancy change on one side, carrying that side's lane sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrosswalkSignal {
    pub side: Side,
    pub entrances: Vec<LaneId>,
    pub exits: Vec<LaneId>,
}
