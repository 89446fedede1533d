//! Dispatch queue bridging background producers to a single consumer.
//!
//! Any thread may enqueue through a cloneable [`DispatchHandle`]; exactly one
//! owner of the [`Dispatcher`] drains it, typically once per host tick. Actions
//! run in the order they became visible to the queue.

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};

use roomchat_core::error::{ChatError, ChatResult};

/// A unit of deferred work run against the consumer context `T`.
pub type QueuedAction<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// Create a connected handle/dispatcher pair.
pub fn channel<T: 'static>() -> (DispatchHandle<T>, Dispatcher<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let handle = DispatchHandle {
        tx,
        pending: pending.clone(),
    };
    let dispatcher = Dispatcher {
        rx,
        pending,
        handle: handle.clone(),
    };
    (handle, dispatcher)
}

/// Producer side of the queue. Cheap to clone, usable from any thread.
pub struct DispatchHandle<T> {
    tx: mpsc::UnboundedSender<QueuedAction<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for DispatchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<T: 'static> DispatchHandle<T> {
    /// Append an action. Never blocks; if the dispatcher is gone the action is
    /// discarded.
    pub fn enqueue<F>(&self, action: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Box::new(action)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("dispatcher dropped, discarding queued action");
        }
    }

    /// Append an action and get a [`Completion`] that resolves with its return
    /// value once a drain has run it.
    pub fn enqueue_awaitable<F, R>(&self, action: F) -> Completion<R>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(move |ctx| {
            let out = action(ctx);
            let _ = tx.send(out);
        });
        Completion { rx }
    }

    /// Number of actions enqueued but not yet taken by a drain.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Consumer side of the queue.
pub struct Dispatcher<T> {
    rx: mpsc::UnboundedReceiver<QueuedAction<T>>,
    pending: Arc<AtomicUsize>,
    handle: DispatchHandle<T>,
}

impl<T: 'static> Dispatcher<T> {
    /// A new producer handle for this queue.
    pub fn handle(&self) -> DispatchHandle<T> {
        self.handle.clone()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Run every action visible at the start of the call, oldest first.
    ///
    /// Actions enqueued while draining (including by the actions themselves)
    /// wait for the next drain. A panicking action is logged and skipped; the
    /// rest of the batch still runs. Returns the number of actions taken.
    pub fn drain(&mut self, ctx: &mut T) -> usize {
        let mut batch = Vec::new();
        while let Ok(action) = self.rx.try_recv() {
            batch.push(action);
        }
        self.pending.fetch_sub(batch.len(), Ordering::SeqCst);

        let count = batch.len();
        for action in batch {
            let result = catch_unwind(AssertUnwindSafe(|| action(&mut *ctx)));
            if let Err(panic) = result {
                tracing::error!("queued action panicked: {}", panic_message(&*panic));
            }
        }
        count
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

/// Resolves once an awaitable action has run on the consumer.
///
/// There is no cancellation: dropping a `Completion` does not stop the action.
pub struct Completion<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> Completion<R> {
    /// Block the calling thread until the action has run.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_wait(self) -> ChatResult<R> {
        self.rx.blocking_recv().map_err(|_| not_completed())
    }
}

impl<R> Future for Completion<R> {
    type Output = ChatResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|r| r.map_err(|_| not_completed()))
    }
}

fn not_completed() -> ChatError {
    ChatError::Dispatch("queued action did not complete".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drains_in_fifo_order() {
        let (handle, mut dispatcher) = channel::<Vec<u32>>();
        for i in 0..5 {
            handle.enqueue(move |v| v.push(i));
        }
        assert_eq!(dispatcher.pending(), 5);

        let mut seen = Vec::new();
        assert_eq!(dispatcher.drain(&mut seen), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn concurrent_producers_keep_their_own_order() {
        let (handle, mut dispatcher) = channel::<Vec<&'static str>>();
        let a = handle.clone();
        let b = handle.clone();

        let ta = thread::spawn(move || {
            a.enqueue(|v| v.push("a1"));
            a.enqueue(|v| v.push("a2"));
        });
        let tb = thread::spawn(move || {
            b.enqueue(|v| v.push("b1"));
            b.enqueue(|v| v.push("b2"));
        });
        ta.join().unwrap();
        tb.join().unwrap();

        let mut seen = Vec::new();
        dispatcher.drain(&mut seen);
        assert_eq!(seen.len(), 4);
        let pos = |s| seen.iter().position(|x| *x == s).unwrap();
        assert!(pos("a1") < pos("a2"));
        assert!(pos("b1") < pos("b2"));
    }

    #[test]
    fn actions_enqueued_during_drain_wait_for_next_drain() {
        struct Ctx {
            handle: DispatchHandle<Ctx>,
            log: Vec<&'static str>,
        }

        let (handle, mut dispatcher) = channel::<Ctx>();
        let mut ctx = Ctx {
            handle: handle.clone(),
            log: Vec::new(),
        };

        handle.enqueue(|c: &mut Ctx| {
            c.log.push("first");
            c.handle.enqueue(|c: &mut Ctx| c.log.push("deferred"));
        });

        assert_eq!(dispatcher.drain(&mut ctx), 1);
        assert_eq!(ctx.log, vec!["first"]);

        assert_eq!(dispatcher.drain(&mut ctx), 1);
        assert_eq!(ctx.log, vec!["first", "deferred"]);
    }

    #[test]
    fn panicking_action_does_not_stop_the_batch() {
        let (handle, mut dispatcher) = channel::<Vec<u32>>();
        handle.enqueue(|v| v.push(1));
        handle.enqueue(|_| panic!("boom"));
        handle.enqueue(|v| v.push(3));

        let mut seen = Vec::new();
        assert_eq!(dispatcher.drain(&mut seen), 3);
        assert_eq!(seen, vec![1, 3]);

        handle.enqueue(|v| v.push(4));
        dispatcher.drain(&mut seen);
        assert_eq!(seen, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn awaitable_resolves_with_return_value() {
        let (handle, mut dispatcher) = channel::<u32>();
        let completion = handle.enqueue_awaitable(|n| {
            *n += 41;
            *n + 1
        });

        let mut counter = 0;
        dispatcher.drain(&mut counter);
        assert_eq!(counter, 41);
        assert_eq!(completion.await.unwrap(), 42);
    }

    #[test]
    fn awaitable_from_another_thread() {
        let (handle, mut dispatcher) = channel::<Vec<u32>>();
        let producer = thread::spawn(move || {
            handle
                .enqueue_awaitable(|v: &mut Vec<u32>| {
                    v.push(7);
                    v.len()
                })
                .blocking_wait()
        });

        let mut seen = Vec::new();
        while !producer.is_finished() {
            dispatcher.drain(&mut seen);
            thread::yield_now();
        }
        assert_eq!(producer.join().unwrap().unwrap(), 1);
        assert_eq!(seen, vec![7]);
    }

    #[tokio::test]
    async fn awaitable_reports_panicked_action() {
        let (handle, mut dispatcher) = channel::<()>();
        let completion = handle.enqueue_awaitable(|_| -> u8 { panic!("nope") });
        dispatcher.drain(&mut ());
        assert!(matches!(completion.await, Err(ChatError::Dispatch(_))));
    }

    #[test]
    fn enqueue_after_dispatcher_dropped_is_silent() {
        let (handle, dispatcher) = channel::<()>();
        drop(dispatcher);
        handle.enqueue(|_| {});
        assert_eq!(handle.pending(), 0);
    }
}
