//! Deferred, coalesced delivery on a worker thread.
//!
//! The first notice of a window arms a fixed deadline; everything arriving
//! before the deadline joins the same union. Later notices do not push the
//! deadline out, so a continuous storm still gets delivered every `delay`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::{DirtyNotice, PendingRegions, RegionCoalescer};

/// Receives coalesced regions on the delivery thread.
pub trait RegionSink: Send + Sync + 'static {
    fn deliver(&self, regions: PendingRegions);
}

enum Command {
    Mark(DirtyNotice),
    Flush(Sender<()>),
    Shutdown,
}

pub struct DeferredDelivery {
    tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl DeferredDelivery {
    pub fn spawn(delay: Duration, sink: Arc<dyn RegionSink>) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("vline-region-delivery".to_string())
            .spawn(move || run(rx, delay, sink))?;
        debug!(target: "events.coalesce", delay_ms = delay.as_millis() as u64, "delivery_worker_started");
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn mark(&self, notice: DirtyNotice) {
        if self.tx.send(Command::Mark(notice)).is_err() {
            warn!(target: "events.coalesce", "delivery_worker_gone");
        }
    }

    /// Deliver whatever is pending now and wait until the sink returned.
    ///
    /// Must not be called while holding a lock the sink acquires.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Command::Flush(ack_tx)).is_err() {
            warn!(target: "events.coalesce", "delivery_worker_gone");
            return;
        }
        let _ = ack_rx.recv();
    }
}

impl Drop for DeferredDelivery {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            // The sink may drop the last owner from inside `deliver`.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn deliver(coalescer: &mut RegionCoalescer, sink: &Arc<dyn RegionSink>) {
    if let Some(regions) = coalescer.take() {
        sink.deliver(regions);
    }
}

fn run(rx: Receiver<Command>, delay: Duration, sink: Arc<dyn RegionSink>) {
    let mut coalescer = RegionCoalescer::new();
    let mut deadline: Option<Instant> = None;
    loop {
        let cmd = match deadline {
            None => match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => break,
            },
            Some(at) => match rx.recv_deadline(at) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    deliver(&mut coalescer, &sink);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };
        match cmd {
            Command::Mark(notice) => {
                coalescer.mark(notice);
                if deadline.is_none() {
                    deadline = Some(Instant::now() + delay);
                }
            }
            Command::Flush(ack) => {
                deadline = None;
                deliver(&mut coalescer, &sink);
                let _ = ack.send(());
            }
            Command::Shutdown => break,
        }
    }
    if !coalescer.is_empty() {
        debug!(target: "events.coalesce", marks = coalescer.marks(), "delivery_discarded_on_shutdown");
    }
}
