//! Push-based subscriptions.
//!
//! Each subscriber owns an unbounded queue of raw values. Publishing only
//! clones into the queues; projections run on the receiving side, so no
//! subscriber code runs while the runtime tree is locked. Dropping a
//! [`Subscription`] closes its queue and the sender is pruned on the next
//! publish.

use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

pub(crate) struct Listeners<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone + Send + 'static> Listeners<T> {
    /// Register a projected subscriber, optionally replaying `current` first.
    pub(crate) fn subscribe_map<U, F>(&mut self, current: Option<&T>, project: F) -> Subscription<U>
    where
        U: 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(value) = current {
            // The receiver is alive, so this cannot fail.
            let _ = sender.send(value.clone());
        }
        self.senders.push(sender);
        Subscription {
            source: Box::new(Projected { receiver, project }),
        }
    }

    pub(crate) fn subscribe(&mut self) -> Subscription<T> {
        self.subscribe_map(None, T::clone)
    }

    pub(crate) fn publish(&mut self, value: &T) {
        self.senders.retain(|sender| sender.send(value.clone()).is_ok());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

trait Source<U>: Send {
    fn try_recv(&mut self) -> Option<U>;

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<U>>;
}

struct Projected<T, F> {
    receiver: mpsc::UnboundedReceiver<T>,
    project: F,
}

impl<T, U, F> Source<U> for Projected<T, F>
where
    T: Send,
    F: Fn(&T) -> U + Send,
{
    fn try_recv(&mut self) -> Option<U> {
        self.receiver.try_recv().ok().map(|value| (self.project)(&value))
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<U>> {
        self.receiver
            .poll_recv(cx)
            .map(|value| value.map(|value| (self.project)(&value)))
    }
}

/// Receiving end of a state or event stream.
///
/// Never completes while the owning `StateManager` is alive. Drop it to
/// unsubscribe.
pub struct Subscription<T> {
    source: Box<dyn Source<T>>,
}

impl<T> Subscription<T> {
    /// Next queued value without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.source.try_recv()
    }

    /// Wait for the next value.
    pub async fn recv(&mut self) -> Option<T> {
        poll_fn(|cx| self.source.poll_recv(cx)).await
    }

    /// Everything queued so far, in delivery order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(value) = self.source.try_recv() {
            out.push(value);
        }
        out
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().source.poll_recv(cx)
    }
}
