use std::{
    cell::RefCell,
    collections::HashMap,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::{channel::mpsc, stream::FusedStream, Stream};
use uuid::Uuid;

/// Broadcasts events to every current subscriber, in emission order
///
/// Cloning the emitter gives another handle on the same set of subscribers.
pub struct EventEmitter<E>(Rc<RefCell<HashMap<Uuid, mpsc::UnboundedSender<E>>>>);

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        EventEmitter(self.0.clone())
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        EventEmitter(Rc::new(RefCell::new(HashMap::new())))
    }
}

pub struct Subscription<E> {
    pub id: Uuid,
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<E: Clone> EventEmitter<E> {
    pub fn new() -> EventEmitter<E> {
        EventEmitter::default()
    }

    pub fn subscribe(&self) -> Subscription<E> {
        // Unbounded so that emitting never waits on a subscriber that is busy
        let (sender, receiver) = mpsc::unbounded();
        let id = Uuid::new_v4();
        self.0.borrow_mut().insert(id, sender);
        Subscription { id, receiver }
    }

    /// Returns whether the subscription was still registered
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        self.0.borrow_mut().remove(&id).is_some()
    }

    pub fn emit(&self, e: E) {
        // Subscriptions that were dropped without unsubscribing get pruned here
        self.0
            .borrow_mut()
            .retain(|_, s| s.unbounded_send(e.clone()).is_ok());
    }

    pub fn num_subscribers(&self) -> usize {
        self.0.borrow().len()
    }
}

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<E> FusedStream for Subscription<E> {
    fn is_terminated(&self) -> bool {
        self.receiver.is_terminated()
    }
}

impl<E> Subscription<E> {
    /// Pops an already-emitted event without waiting
    pub fn try_next(&mut self) -> Option<E> {
        self.receiver.try_next().ok().flatten()
    }
}
