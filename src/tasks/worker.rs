//! Single-thread rescale pool.
//! Tasks run one at a time in submission order; outcomes travel back over a
//! channel that the interactive thread drains.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::events::{TaskOutcome, WorkerEvent};
use crate::tasks::rescale::{OutcomeSink, RescaleTask};

/// Wakes the interactive thread after the worker delivered something.
pub type Repaint = Arc<dyn Fn() + Send + Sync>;

/// Forwards task signals to the interactive thread and asks it to repaint.
pub struct ChannelSink {
    tx: Sender<WorkerEvent>,
    repaint: Repaint,
}

impl ChannelSink {
    pub fn new(tx: Sender<WorkerEvent>, repaint: Repaint) -> Self {
        Self { tx, repaint }
    }
}

impl OutcomeSink for ChannelSink {
    fn outcome(&self, seq: u64, outcome: TaskOutcome) -> Result<()> {
        self.tx
            .send(WorkerEvent::Outcome { seq, outcome })
            .context("result channel closed")?;
        (self.repaint)();
        Ok(())
    }

    fn finished(&self, seq: u64) {
        if self.tx.send(WorkerEvent::Finished { seq }).is_err() {
            debug!(seq, "result channel closed before completion notice");
        }
        (self.repaint)();
    }
}

/// Capacity-one worker pool. Dropping it cancels the backlog and joins the thread.
pub struct RescaleWorker {
    tx: Option<Sender<RescaleTask>>,
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl RescaleWorker {
    /// Spawn the worker thread. Events for every submitted task are sent on
    /// `events`.
    pub fn spawn(events: Sender<WorkerEvent>, repaint: Repaint) -> Result<Self> {
        let (task_tx, task_rx) = unbounded::<RescaleTask>();
        let sink = ChannelSink::new(events, repaint);
        let stop = Arc::new(AtomicBool::new(false));
        let join = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("rescale-worker".into())
                .spawn(move || run(task_rx, sink, &stop))
                .context("failed to spawn rescale worker thread")?
        };
        Ok(Self {
            tx: Some(task_tx),
            stop,
            join: Some(join),
        })
    }

    /// Queue a task. Never blocks; returns `false` if the worker is gone.
    pub fn submit(&self, task: RescaleTask) -> bool {
        let seq = task.seq();
        let (width, height) = task.target();
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.send(task) {
            Ok(()) => {
                debug!(seq, width, height, queued = tx.len(), "rescale submitted");
                true
            }
            Err(_) => {
                warn!(seq, "rescale worker is not running");
                false
            }
        }
    }

    /// Tasks accepted but not yet picked up by the worker.
    pub fn queued(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    /// Finish the running task, cancel the rest of the queue and join.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("rescale worker thread panicked");
            }
        }
    }
}

impl Drop for RescaleWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(rx: Receiver<RescaleTask>, sink: ChannelSink, stop: &AtomicBool) {
    info!("rescale worker started");
    let mut skipped = 0usize;
    while let Ok(task) = rx.recv() {
        if stop.load(Ordering::Acquire) {
            task.cancel(&sink);
            skipped += 1;
        } else {
            task.execute(&sink);
        }
    }
    info!(skipped, "rescale worker stopped");
}
