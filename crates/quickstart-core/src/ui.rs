//! UI-thread task queue.
//!
//! Engine callbacks arrive on engine-owned threads and must not touch views.
//! They post closures through a [`UiHandle`]; the host drains the queue on its
//! UI thread with [`UiQueue::run_pending`] (or [`UiQueue::run`] when the UI
//! loop is itself async).

use std::sync::Arc;

use tokio::sync::mpsc;

pub type UiTask<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Invoked after every post so the host can schedule a drain.
pub type UiWaker = Arc<dyn Fn() + Send + Sync>;

pub struct UiHandle<T> {
    tx: mpsc::UnboundedSender<UiTask<T>>,
    waker: Option<UiWaker>,
}

impl<T> Clone for UiHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }
}

impl<T> UiHandle<T> {
    /// Queue `task` for the UI thread. Returns false once the queue is gone.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if self.tx.send(Box::new(task)).is_err() {
            tracing::debug!("ui queue closed, task dropped");
            return false;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
        true
    }
}

pub struct UiQueue<T> {
    rx: mpsc::UnboundedReceiver<UiTask<T>>,
    handle: UiHandle<T>,
}

impl<T> UiQueue<T> {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_waker(waker: UiWaker) -> Self {
        Self::build(Some(waker))
    }

    fn build(waker: Option<UiWaker>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: UiHandle { tx, waker },
        }
    }

    pub fn handle(&self) -> UiHandle<T> {
        self.handle.clone()
    }

    /// Run every task queued so far, in posting order.
    pub fn run_pending(&mut self, target: &mut T) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(target);
            ran += 1;
        }
        ran
    }

    /// Run tasks as they arrive until every outside handle is dropped.
    pub async fn run(self, target: &mut T) {
        let UiQueue { mut rx, handle } = self;
        // Our own sender would keep the channel open forever.
        drop(handle);
        while let Some(task) = rx.recv().await {
            task(target);
        }
    }
}

impl<T> Default for UiQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
