//! One-shot result channel between a worker (`Promise`) and the caller
//! (`ExecutionHandle`), built on `futures::channel::oneshot`.
//!
//! The sender sits in a slot shared by both sides. Whoever takes it first
//! decides the terminal state: the worker by sending a value or an error, the
//! caller by cancelling, which drops the sender and wakes the receiver. Once
//! the slot is empty every further `set`, `set_error` or `cancel` is rejected
//! and changes nothing.
//!
//! The caller can block (`wait`, `wait_timeout`) or `.await` the handle. A
//! worker checks `Promise::is_cancelled` before each side effect.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot::{self, Canceled, Receiver, Sender};

use crate::error::{Error, Result};


struct Shared<T> {
    sender: Mutex<Option<Sender<Result<T>>>>,
    cancelled: AtomicBool,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl<T> Shared<T> {
    fn slot(&self) -> MutexGuard<'_, Option<Sender<Result<T>>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends `outcome` if the slot is still pending, otherwise hands it back.
    fn complete(&self, outcome: Result<T>) -> std::result::Result<(), Result<T>> {
        let sender = match self.slot().take() {
            Some(sender) => sender,
            None => return Err(outcome),
        };
        let sent = sender.send(outcome);
        self.finish();
        sent
    }

    fn cancel(&self) -> bool {
        let sender = {
            let mut slot = self.slot();
            let sender = slot.take();
            if sender.is_some() {
                self.cancelled.store(true, Ordering::SeqCst);
            }
            sender
        };
        match sender {
            Some(sender) => {
                drop(sender);
                self.finish();
                true
            }
            None => false,
        }
    }

    fn finish(&self) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.done_cv.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn is_done(&self) -> bool {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }
}


/// Creates a connected promise/handle pair.
pub fn channel<T>() -> (Promise<T>, ExecutionHandle<T>) {
    let (sender, receiver) = oneshot::channel();
    let shared = Arc::new(Shared {
        sender: Mutex::new(Some(sender)),
        cancelled: AtomicBool::new(false),
        done: Mutex::new(false),
        done_cv: Condvar::new(),
    });
    (
        Promise { shared: shared.clone() },
        ExecutionHandle { receiver, shared, taken: false },
    )
}


/// Worker side of an execution.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Resolves with `value`. If the handle is already cancelled, resolved or
    /// dropped, the value is handed back untouched so the worker can release it.
    pub fn set(&self, value: T) -> std::result::Result<(), T> {
        match self.shared.complete(Ok(value)) {
            Ok(()) => Ok(()),
            Err(Ok(value)) => Err(value),
            Err(Err(_)) => Ok(()),
        }
    }

    pub fn set_error(&self, err: Error) -> bool {
        self.shared.complete(Err(err)).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // A worker that unwinds must not leave the caller waiting forever.
        if self.shared.complete(Err(Error::WorkerLost)).is_ok() {
            warn!("[FUTURE] Promise dropped while pending, handle failed with WorkerLost");
        }
    }
}


/// Caller side of an execution.
pub struct ExecutionHandle<T> {
    receiver: Receiver<Result<T>>,
    shared: Arc<Shared<T>>,
    taken: bool,
}

impl<T> ExecutionHandle<T> {
    /// A handle that is already resolved with `err`.
    pub fn failed(err: Error) -> ExecutionHandle<T> {
        let (promise, handle) = channel();
        promise.set_error(err);
        handle
    }

    /// Cancels a pending execution. Returns `false` if it already finished.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    /// A cloneable token that cancels this handle from another thread.
    pub fn canceller(&self) -> Canceller
    where
        T: Send + 'static,
    {
        let shared = self.shared.clone();
        Canceller { cancel: Arc::new(move || shared.cancel()) }
    }

    /// Blocks until the execution is terminal and returns its outcome.
    /// A cancelled handle yields `Error::Cancelled`.
    pub fn wait(mut self) -> Result<T> {
        futures::executor::block_on(&mut self)
    }

    /// Like `wait`, but gives up after `timeout`, returning `None` and leaving
    /// the handle untouched.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<T>> {
        if self.taken {
            return Some(Err(Error::ResultTaken));
        }
        {
            let done = self.shared.done.lock().unwrap_or_else(PoisonError::into_inner);
            let (done, _) = self.shared.done_cv
                .wait_timeout_while(done, timeout, |done| !*done)
                .unwrap_or_else(PoisonError::into_inner);
            if !*done {
                return None;
            }
        }
        match self.receiver.try_recv() {
            Ok(Some(outcome)) => Some(self.took(Ok(outcome))),
            Ok(None) => None,
            Err(canceled) => Some(self.took(Err(canceled))),
        }
    }

    /// Maps what the receiver produced. Only a real outcome consumes the
    /// handle; a cancelled one keeps answering `Cancelled`.
    fn took(&mut self, received: std::result::Result<Result<T>, Canceled>) -> Result<T> {
        match received {
            Ok(outcome) => {
                self.taken = true;
                outcome
            }
            Err(Canceled) if self.shared.is_cancelled() => Err(Error::Cancelled),
            Err(Canceled) => {
                self.taken = true;
                Err(Error::WorkerLost)
            }
        }
    }
}

impl<T> Future for ExecutionHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        if self.taken {
            return Poll::Ready(Err(Error::ResultTaken));
        }
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(received) => Poll::Ready(self.took(received)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for ExecutionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.taken {
            "taken"
        } else if self.is_cancelled() {
            "cancelled"
        } else if self.is_done() {
            "done"
        } else {
            "pending"
        };
        f.debug_struct("ExecutionHandle").field("state", &state).finish()
    }
}


/// Cancels the handle it was taken from.
#[derive(Clone)]
pub struct Canceller {
    cancel: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Canceller {
    pub fn cancel(&self) -> bool {
        (self.cancel)()
    }
}
