//! Response processor
//!
//! A single-consumer FIFO queue between the producers of inbound lines (the
//! transport's receive path, and anyone calling `enqueue`) and the handler
//! that interprets them. Each line gets a sequence number at enqueue time;
//! the number is assigned under the same lock as the send, so sequence order
//! and queue order agree.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// A line waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    pub seq: u64,
    pub line: String,
}

/// What to do with queued lines on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Process everything already queued
    #[default]
    Drain,
    /// Drop everything already queued
    Discard,
}

/// Producer side: sequence counter and sender under one lock
struct Producer {
    next_seq: u64,
    tx: Sender<QueuedLine>,
}

/// Single-consumer line queue with a dedicated worker thread
pub struct ResponseProcessor {
    name: String,
    producer: Mutex<Option<Producer>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    discard: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
}

impl ResponseProcessor {
    /// Start the consumer thread
    ///
    /// `handler` runs on that thread, one line at a time, in sequence order.
    /// A panic inside the handler is caught and logged; the loop carries on
    /// with the next line.
    pub fn start<F>(name: impl Into<String>, handler: F) -> std::io::Result<Self>
    where
        F: Fn(&QueuedLine) + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = channel::unbounded::<QueuedLine>();
        let discard = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));

        let worker = {
            let name = name.clone();
            let discard = Arc::clone(&discard);
            let processed = Arc::clone(&processed);
            thread::Builder::new()
                .name(format!("fresco-rx-{name}"))
                .spawn(move || {
                    for item in rx.iter() {
                        if discard.load(Ordering::SeqCst) {
                            continue;
                        }
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&item)));
                        if let Err(payload) = outcome {
                            error!(
                                processor = %name,
                                seq = item.seq,
                                panic = %panic_message(payload.as_ref()),
                                "Line handler panicked"
                            );
                        }
                        processed.fetch_add(1, Ordering::SeqCst);
                    }
                    debug!(processor = %name, "Response processor stopped");
                })?
        };

        Ok(Self {
            name,
            producer: Mutex::new(Some(Producer { next_seq: 0, tx })),
            worker: Mutex::new(Some(worker)),
            discard,
            processed,
        })
    }

    /// Queue a line; returns its sequence number, or `None` after shutdown
    pub fn enqueue(&self, line: impl Into<String>) -> Option<u64> {
        let mut producer = self.producer.lock();
        let Some(producer) = producer.as_mut() else {
            warn!(processor = %self.name, "Processor shut down, dropping line");
            return None;
        };

        let seq = producer.next_seq;
        let queued = QueuedLine {
            seq,
            line: line.into(),
        };
        if producer.tx.send(queued).is_err() {
            warn!(processor = %self.name, seq, "Processor worker gone, dropping line");
            return None;
        }
        producer.next_seq += 1;
        Some(seq)
    }

    /// Number of lines handled so far (including ones whose handler panicked)
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.producer.lock().is_some()
    }

    /// Stop accepting lines and wait for the worker to finish
    ///
    /// Idempotent. Must not be called from inside the handler.
    pub fn shutdown(&self, mode: ShutdownMode) {
        if mode == ShutdownMode::Discard {
            self.discard.store(true, Ordering::SeqCst);
        }
        // Dropping the sender ends the worker's iteration once the queue is empty
        drop(self.producer.lock().take());

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            warn!(processor = %self.name, "Shutdown called from the processor thread");
            return;
        }
        if worker.join().is_err() {
            error!(processor = %self.name, "Response processor worker panicked");
        }
        debug!(processor = %self.name, ?mode, processed = self.processed(), "Response processor shut down");
    }
}

impl Drop for ResponseProcessor {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Discard);
    }
}

impl std::fmt::Debug for ResponseProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseProcessor")
            .field("name", &self.name)
            .field("processed", &self.processed())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recording() -> (ResponseProcessor, Arc<Mutex<Vec<QueuedLine>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let processor =
            ResponseProcessor::start("test", move |line: &QueuedLine| sink.lock().push(line.clone()))
                .unwrap();
        (processor, seen)
    }

    #[test]
    fn test_fifo_with_sequence_numbers() {
        let (processor, seen) = recording();
        for i in 0..10 {
            assert_eq!(processor.enqueue(format!("line {i}")), Some(i));
        }
        processor.shutdown(ShutdownMode::Drain);

        let seen = seen.lock();
        assert_eq!(seen.len(), 10);
        for (i, item) in seen.iter().enumerate() {
            assert_eq!(item.seq, i as u64);
            assert_eq!(item.line, format!("line {i}"));
        }
    }

    #[test]
    fn test_panic_does_not_stop_loop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let processor = ResponseProcessor::start("test", move |item: &QueuedLine| {
            if item.line == "boom" {
                panic!("handler failed on {}", item.seq);
            }
            sink.lock().push(item.line.clone());
        })
        .unwrap();

        processor.enqueue("before");
        processor.enqueue("boom");
        processor.enqueue("after");
        processor.shutdown(ShutdownMode::Drain);

        assert_eq!(*seen.lock(), vec!["before", "after"]);
        assert_eq!(processor.processed(), 3);
    }

    #[test]
    fn test_discard_drops_queued_lines() {
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let g = Arc::clone(&gate);
        let processor = ResponseProcessor::start("test", move |item: &QueuedLine| {
            let _wait = g.lock();
            sink.lock().push(item.seq);
        })
        .unwrap();

        for i in 0..5 {
            processor.enqueue(format!("{i}"));
        }
        // Let the worker pick up the first line, then release it
        std::thread::sleep(Duration::from_millis(50));
        processor.discard.store(true, Ordering::SeqCst);
        drop(held);
        processor.shutdown(ShutdownMode::Discard);

        assert!(seen.lock().len() <= 1);
    }

    #[test]
    fn test_enqueue_after_shutdown() {
        let (processor, _) = recording();
        processor.shutdown(ShutdownMode::Drain);
        processor.shutdown(ShutdownMode::Drain);
        assert!(!processor.is_running());
        assert_eq!(processor.enqueue("late"), None);
    }
}
