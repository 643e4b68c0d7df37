use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::PipelineResult;
use crate::stages::FaceStream;

/// Cancellation group for outstanding pipeline work.
///
/// Everything spawned through the group is aborted by [`dispose_all`] or when
/// the group is dropped. An engine call already running on the blocking pool
/// still finishes, but its result is never delivered.
///
/// [`dispose_all`]: Subscriptions::dispose_all
#[derive(Default)]
pub struct Subscriptions {
    handles: Mutex<Vec<AbortHandle>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a one-shot operation inside the group.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
        handle
    }

    /// Drive a stream inside the group, forwarding items to a bounded channel.
    ///
    /// The channel closes when the stream ends, the receiver is dropped or the
    /// group is disposed.
    pub fn observe<T>(&self, stream: FaceStream<T>, capacity: usize) -> mpsc::Receiver<PipelineResult<T>>
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    /// Outstanding (unfinished) operations.
    pub fn len(&self) -> usize {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort everything outstanding. Returns how many operations were cut short.
    pub fn dispose_all(&self) -> usize {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut aborted = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            tracing::debug!(aborted, "subscriptions disposed");
        }
        aborted
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
