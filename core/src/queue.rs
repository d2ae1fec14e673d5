//! Execution contexts for result delivery.
//!
//! The client never settles a `Deferred` directly from the transport's
//! completion callback; it posts the settlement to a `CallbackQueue`.
//! `Immediate` runs it on the completing thread. `MainQueue` holds jobs until
//! the host drains it from its own loop, which is how a UI thread receives
//! results.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub type Job = Box<dyn FnOnce() + Send>;

/// Somewhere to run settlement jobs.
pub trait CallbackQueue: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs each job inline on the dispatching thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl CallbackQueue for Immediate {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// FIFO of jobs drained by the host, typically from its main loop.
#[derive(Clone, Default)]
pub struct MainQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl MainQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every job queued so far, including jobs queued by those jobs.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it.
            let job = self.jobs.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl CallbackQueue for MainQueue {
    fn dispatch(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainQueue").field("pending", &self.len()).finish()
    }
}
