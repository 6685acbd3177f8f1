//! Supervised background workers for the periodic pool loops

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A named thread running `tick` every `interval` until stopped.
///
/// Stopping drops the shutdown sender, which wakes the thread out of its
/// sleep. A panicking tick is logged and the loop carries on.
pub(crate) struct BackgroundWorker {
    name: String,
    shutdown: Option<Sender<()>>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        // Never sent on; disconnects when the thread exits
        let (done_tx, done_rx) = channel::bounded::<()>(0);

        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _done = done_tx;
            tracing::debug!(worker = %thread_name, ?interval, "background worker started");
            loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| tick())) {
                            tracing::error!(
                                worker = %thread_name,
                                panic = %panic_message(payload.as_ref()),
                                "background pass panicked; continuing on next tick"
                            );
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!(worker = %thread_name, "background worker stopped");
        })?;

        Ok(Self {
            name,
            shutdown: Some(shutdown_tx),
            done: done_rx,
            handle: Some(handle),
        })
    }

    /// Signal shutdown and wait up to `timeout` for the thread to exit.
    ///
    /// Returns false if the thread was still running when the wait expired;
    /// it is then detached.
    pub fn stop(mut self, timeout: Duration) -> bool {
        drop(self.shutdown.take());
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(worker = %self.name, ?timeout, "background worker did not stop in time; detaching");
                false
            }
            _ => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                true
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worker_ticks_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = BackgroundWorker::spawn("test-ticker", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(worker.name(), "test-ticker");

        thread::sleep(Duration::from_millis(60));
        assert!(worker.stop(Duration::from_secs(1)));

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {seen}");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_worker_survives_panicking_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = BackgroundWorker::spawn("test-panicker", Duration::from_millis(5), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first pass blows up");
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        assert!(worker.stop(Duration::from_secs(1)));
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let worker = BackgroundWorker::spawn("test-sleeper", Duration::from_secs(3600), || {}).unwrap();
        let started = std::time::Instant::now();
        assert!(worker.stop(Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
