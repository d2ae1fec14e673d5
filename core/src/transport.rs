//! The host-supplied transport and the upload progress channel.
//!
//! # Design
//! The core never performs I/O. A `Transport` executes a `WireRequest` and
//! calls back exactly once with a `RawResponse`, on whatever thread it likes.
//! Uploads additionally report progress through a handler the core supplies;
//! the core turns those reports into a `ProgressStream` that ends when the
//! upload completes.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::http::{Progress, RawResponse, WireRequest};

pub type CompletionHandler = Box<dyn FnOnce(RawResponse) + Send>;
pub type ProgressHandler = Box<dyn FnMut(Progress) + Send>;

/// Network execution capability provided by the host.
pub trait Transport: Send + Sync {
    /// Plain request/response exchange.
    fn send(&self, request: WireRequest, on_complete: CompletionHandler);

    /// Upload `payload` as the request body, reporting progress as bytes go
    /// out. `request.body` is unset for uploads.
    fn upload(
        &self,
        request: WireRequest,
        payload: Vec<u8>,
        on_progress: ProgressHandler,
        on_complete: CompletionHandler,
    );
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: WireRequest, on_complete: CompletionHandler) {
        (**self).send(request, on_complete)
    }

    fn upload(
        &self,
        request: WireRequest,
        payload: Vec<u8>,
        on_progress: ProgressHandler,
        on_complete: CompletionHandler,
    ) {
        (**self).upload(request, payload, on_progress, on_complete)
    }
}

/// Progress snapshots of one upload, in the order the transport reported
/// them. Iteration blocks until the next snapshot and ends once the upload
/// has completed.
#[derive(Debug, Clone)]
pub struct ProgressStream {
    rx: Receiver<Progress>,
}

impl ProgressStream {
    /// A stream with no snapshots, for requests that upload nothing.
    pub fn finished() -> Self {
        let (_, rx) = unbounded();
        Self { rx }
    }

    /// Snapshots received so far, without blocking.
    pub fn pending(&self) -> Vec<Progress> {
        self.rx.try_iter().collect()
    }
}

impl Iterator for ProgressStream {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        self.rx.recv().ok()
    }
}

/// Producing side of a `ProgressStream`. Closing it ends the stream even if
/// the transport keeps its progress handler alive.
#[derive(Clone)]
pub(crate) struct ProgressSender {
    tx: Arc<Mutex<Option<Sender<Progress>>>>,
}

impl ProgressSender {
    pub(crate) fn channel() -> (Self, ProgressStream) {
        let (tx, rx) = unbounded();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            ProgressStream { rx },
        )
    }

    pub(crate) fn send(&self, progress: Progress) {
        if let Some(tx) = self.tx.lock().as_ref() {
            // The caller may have dropped the stream.
            let _ = tx.send(progress);
        }
    }

    pub(crate) fn close(&self) {
        self.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_stream_is_empty() {
        assert_eq!(ProgressStream::finished().count(), 0);
    }

    #[test]
    fn stream_ends_after_close() {
        let (sender, stream) = ProgressSender::channel();
        sender.send(Progress { bytes_sent: 1, total_bytes: 2 });
        sender.send(Progress { bytes_sent: 2, total_bytes: 2 });
        let handler_copy = sender.clone();
        sender.close();
        handler_copy.send(Progress { bytes_sent: 9, total_bytes: 9 });

        let seen: Vec<u64> = stream.map(|p| p.bytes_sent).collect();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn pending_does_not_block() {
        let (sender, stream) = ProgressSender::channel();
        assert!(stream.pending().is_empty());
        sender.send(Progress { bytes_sent: 5, total_bytes: 10 });
        assert_eq!(stream.pending(), vec![Progress { bytes_sent: 5, total_bytes: 10 }]);
    }
}
