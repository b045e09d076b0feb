//! An in-order asynchronous dispatch queue.
//!
//! The control thread enqueues dispatches and keeps going; a dedicated service
//! thread runs them one after another. Completion is observed through
//! [`Event`]s. Failures are sticky: once a dispatch fails, later dispatches are
//! skipped and every subsequent synchronization reports the first failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::EnactError;

type Job<'env> = Box<dyn FnOnce() -> Result<(), EnactError> + Send + 'env>;

struct Dispatch<'env> {
    kernel: &'static str,
    job: Job<'env>,
}

#[derive(Default)]
struct Progress {
    completed: u64,
    fault: Option<EnactError>,
}

#[derive(Default)]
struct Shared {
    progress: Mutex<Progress>,
    completed: Condvar,
}

/// A point in the stream's submission order.
///
/// Synchronizing on an event waits for every dispatch enqueued before it was
/// recorded. An event recorded on an empty stream is already complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    seq: u64,
}

/// Control-thread handle to a running stream.
pub struct Stream<'env> {
    tx: mpsc::Sender<Dispatch<'env>>,
    shared: Arc<Shared>,
    submitted: u64,
}

impl<'env> Stream<'env> {
    /// Runs `f` with a live stream and drains it before returning.
    ///
    /// Dispatches may borrow anything that outlives `'env`. Dispatches still
    /// queued when `f` returns are executed before this function returns;
    /// call [`synchronize`](Self::synchronize) inside `f` to observe their
    /// outcome.
    pub fn scoped<R>(f: impl FnOnce(&mut Stream<'env>) -> R) -> R {
        let shared = Arc::new(Shared::default());
        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<Dispatch<'env>>();
            let service_shared = Arc::clone(&shared);
            scope.spawn(move || service(&rx, &service_shared));
            let mut stream = Stream {
                tx,
                shared,
                submitted: 0,
            };
            f(&mut stream)
            // Dropping `stream` closes the channel; the service thread drains
            // what is left and exits, and the scope joins it.
        })
    }

    /// Enqueues a dispatch.
    ///
    /// # Errors
    /// `LaunchFailure` if the service thread is gone.
    pub fn launch(
        &mut self,
        kernel: &'static str,
        job: impl FnOnce() -> Result<(), EnactError> + Send + 'env,
    ) -> Result<(), EnactError> {
        self.tx
            .send(Dispatch {
                kernel,
                job: Box::new(job),
            })
            .map_err(|_| EnactError::LaunchFailure {
                kernel,
                reason: "stream service thread has exited".to_owned(),
            })?;
        self.submitted += 1;
        tracing::trace!(kernel, seq = self.submitted, "dispatch enqueued");
        Ok(())
    }

    /// Records an event after everything enqueued so far.
    pub fn record(&self) -> Event {
        Event {
            seq: self.submitted,
        }
    }

    /// Blocks until `event` has completed.
    ///
    /// # Errors
    /// The first failure of any dispatch on the stream, or
    /// `SynchronizationFailure` if the stream state is poisoned.
    pub fn wait(&self, event: Event) -> Result<(), EnactError> {
        let poisoned = |_| EnactError::SynchronizationFailure {
            reason: "stream progress lock poisoned".to_owned(),
        };
        let mut progress = self.shared.progress.lock().map_err(poisoned)?;
        while progress.completed < event.seq && progress.fault.is_none() {
            progress = self.shared.completed.wait(progress).map_err(poisoned)?;
        }
        match &progress.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    /// Blocks until everything enqueued so far has completed.
    ///
    /// # Errors
    /// See [`wait`](Self::wait).
    pub fn synchronize(&self) -> Result<(), EnactError> {
        self.wait(self.record())
    }
}

fn service(rx: &mpsc::Receiver<Dispatch<'_>>, shared: &Shared) {
    for Dispatch { kernel, job } in rx {
        let faulted = shared
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fault
            .is_some();
        let outcome = if faulted {
            tracing::trace!(kernel, "skipping dispatch after earlier fault");
            Ok(())
        } else {
            panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                Err(EnactError::LaunchFailure {
                    kernel,
                    reason: panic_message(payload.as_ref()),
                })
            })
        };

        let mut progress = shared
            .progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(fault) = outcome {
            tracing::debug!(kernel, %fault, "dispatch failed");
            progress.fault.get_or_insert(fault);
        }
        progress.completed += 1;
        shared.completed.notify_all();
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker group panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatches_run_in_order() {
        let log = Mutex::new(Vec::new());
        Stream::scoped(|stream| {
            for i in 0..16 {
                let log = &log;
                stream
                    .launch("push", move || {
                        log.lock().unwrap().push(i);
                        Ok(())
                    })
                    .unwrap();
            }
            stream.synchronize().unwrap();
        });
        assert_eq!(log.into_inner().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn event_on_empty_stream_is_complete() {
        Stream::scoped(|stream| {
            let event = stream.record();
            stream.wait(event).unwrap();
        });
    }

    #[test]
    fn faults_are_sticky_and_skip_later_work() {
        let ran = AtomicUsize::new(0);
        let result = Stream::scoped(|stream| {
            let ran = &ran;
            stream
                .launch("fail", || {
                    Err(EnactError::SynchronizationFailure { reason: "boom".into() })
                })
                .unwrap();
            stream
                .launch("after", move || {
                    ran.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                })
                .unwrap();
            let first = stream.synchronize();
            let second = stream.synchronize();
            (first, second)
        });
        assert!(result.0.is_err());
        assert_eq!(result.0, result.1);
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn panics_become_launch_failures() {
        let result = Stream::scoped(|stream| {
            stream.launch("explode", || panic!("lane fault")).unwrap();
            stream.synchronize()
        });
        assert_eq!(
            result,
            Err(EnactError::LaunchFailure {
                kernel: "explode",
                reason: "lane fault".into()
            })
        );
    }
}
