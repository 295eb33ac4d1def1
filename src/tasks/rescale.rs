use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::ResampleFilter;
use crate::error::ResampleError;
use crate::events::{DisplayImage, TaskOutcome};
use crate::processing::resample::{resize_rgba, to_display};
use crate::source::SourceImage;

/// Receiver of the two signals every task emits: its outcome, then completion.
pub trait OutcomeSink {
    /// Deliver the task's outcome. Errors are logged by the task, never retried.
    fn outcome(&self, seq: u64, outcome: TaskOutcome) -> anyhow::Result<()>;
    /// Completion notice. Called once per task after `outcome`, whatever happened there.
    fn finished(&self, seq: u64);
}

/// Largest output a task may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Total pixel budget (`max-output-pixels`).
    pub max_pixels: u64,
    /// Longest side the display surface can upload as one texture.
    pub max_side: u32,
}

impl OutputLimits {
    pub fn unbounded() -> Self {
        Self {
            max_pixels: u64::MAX,
            max_side: u32::MAX,
        }
    }
}

/// One resample job: a shared handle to the original plus the size to produce.
#[derive(Debug)]
pub struct RescaleTask {
    seq: u64,
    source: Option<Arc<SourceImage>>,
    target: (u32, u32),
    filter: ResampleFilter,
    limits: OutputLimits,
}

impl RescaleTask {
    pub fn new(
        seq: u64,
        source: Option<Arc<SourceImage>>,
        target: (u32, u32),
        filter: ResampleFilter,
        limits: OutputLimits,
    ) -> Self {
        Self {
            seq,
            source,
            target,
            filter,
            limits,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn target(&self) -> (u32, u32) {
        self.target
    }

    /// Run on the worker thread. Emits exactly one outcome and one completion.
    pub fn execute(self, sink: &dyn OutcomeSink) {
        let seq = self.seq;
        // Fires `finished` on every exit path, including a panicking sink.
        let _done = FinishGuard { sink, seq };

        let started = Instant::now();
        let outcome = match self.run() {
            Ok(image) => {
                debug!(
                    seq,
                    width = image.size[0],
                    height = image.size[1],
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "rescale finished"
                );
                TaskOutcome::Success(Arc::new(image))
            }
            Err(err) => {
                warn!(seq, error = %err, "rescale failed");
                TaskOutcome::Failure(err.to_string())
            }
        };
        // release the source handle before anyone hears about completion
        drop(self);
        deliver(sink, seq, outcome);
    }

    /// Skip the resample. Still emits a failed outcome and the completion.
    pub fn cancel(self, sink: &dyn OutcomeSink) {
        let seq = self.seq;
        let _done = FinishGuard { sink, seq };
        debug!(seq, "rescale skipped");
        drop(self);
        deliver(
            sink,
            seq,
            TaskOutcome::Failure(ResampleError::Cancelled.to_string()),
        );
    }

    fn run(&self) -> Result<DisplayImage, ResampleError> {
        let Some(source) = self.source.as_deref() else {
            return Err(ResampleError::NoImage);
        };
        let (width, height) = self.target;
        if width == 0 || height == 0 {
            return Err(ResampleError::DegenerateSize { width, height });
        }
        let OutputLimits {
            max_pixels,
            max_side,
        } = self.limits;
        if u64::from(width) * u64::from(height) > max_pixels {
            return Err(ResampleError::TooLarge {
                width,
                height,
                limit: max_pixels,
            });
        }
        if width > max_side || height > max_side {
            return Err(ResampleError::SideTooLong {
                width,
                height,
                limit: max_side,
            });
        }

        let filter = self.filter;
        panic::catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            tests::panic_if_marked(source);
            let resized = resize_rgba(source.pixels(), width, height, filter)?;
            to_display(&resized)
        }))
        .unwrap_or_else(|payload| Err(ResampleError::Panicked(panic_message(&*payload))))
    }
}

fn deliver(sink: &dyn OutcomeSink, seq: u64, outcome: TaskOutcome) {
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| sink.outcome(seq, outcome)));
    match delivered {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(seq, error = %err, "failed to deliver rescale outcome"),
        Err(_) => warn!(seq, "outcome delivery panicked"),
    }
}

struct FinishGuard<'a> {
    sink: &'a dyn OutcomeSink,
    seq: u64,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.sink.finished(self.seq);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
        fail_outcome: bool,
    }

    impl OutcomeSink for Recorder {
        fn outcome(&self, seq: u64, outcome: TaskOutcome) -> anyhow::Result<()> {
            let label = match outcome {
                TaskOutcome::Success(img) => format!("ok:{seq}:{}x{}", img.size[0], img.size[1]),
                TaskOutcome::Failure(msg) => format!("err:{seq}:{msg}"),
            };
            self.events.borrow_mut().push(label);
            if self.fail_outcome {
                anyhow::bail!("receiver gone");
            }
            Ok(())
        }

        fn finished(&self, seq: u64) {
            self.events.borrow_mut().push(format!("done:{seq}"));
        }
    }

    fn source(w: u32, h: u32) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(
            PathBuf::from("/mem/test.png"),
            RgbaImage::new(w, h),
        ))
    }

    /// Sources with this file name make the resample itself panic.
    pub(crate) const PANIC_SOURCE: &str = "panic-in-resample.png";

    pub(super) fn panic_if_marked(source: &SourceImage) {
        if source.path().ends_with(PANIC_SOURCE) {
            panic!("resample blew up on {}", source.path().display());
        }
    }

    fn limits() -> OutputLimits {
        OutputLimits {
            max_pixels: 1_000_000,
            max_side: 4_096,
        }
    }

    fn task(seq: u64, src: Option<Arc<SourceImage>>, target: (u32, u32)) -> RescaleTask {
        RescaleTask::new(seq, src, target, ResampleFilter::Lanczos3, limits())
    }

    #[test]
    fn success_then_done() {
        let rec = Recorder::default();
        task(1, Some(source(10, 10)), (25, 5)).execute(&rec);
        assert_eq!(*rec.events.borrow(), vec!["ok:1:25x5", "done:1"]);
    }

    #[test]
    fn missing_source_reports_no_image() {
        let rec = Recorder::default();
        task(2, None, (5, 5)).execute(&rec);
        assert_eq!(*rec.events.borrow(), vec!["err:2:no image loaded", "done:2"]);
    }

    #[test]
    fn oversized_target_fails_without_allocating() {
        let rec = Recorder::default();
        task(3, Some(source(4, 4)), (2_000, 2_000)).execute(&rec);
        let events = rec.events.borrow();
        assert!(events[0].starts_with("err:3:target size 2000x2000"), "{events:?}");
        assert_eq!(events[1], "done:3");
    }

    #[test]
    fn side_beyond_texture_limit_fails() {
        let rec = Recorder::default();
        // 5000x20 is well under the pixel budget but too wide to upload
        task(6, Some(source(1000, 4)), (5_000, 20)).execute(&rec);
        assert_eq!(
            *rec.events.borrow(),
            vec![
                "err:6:target size 5000x20 exceeds the 4096px display limit per side",
                "done:6"
            ]
        );

        let rec = Recorder::default();
        task(7, Some(source(1, 1000)), (4, 4_097)).execute(&rec);
        assert!(rec.events.borrow()[0].contains("display limit"));

        let rec = Recorder::default();
        task(8, Some(source(10, 10)), (4_096, 1)).execute(&rec);
        assert_eq!(*rec.events.borrow(), vec!["ok:8:4096x1", "done:8"]);
    }

    #[test]
    fn panic_inside_resample_becomes_failure() {
        let rec = Recorder::default();
        let marked = Arc::new(SourceImage::new(
            PathBuf::from("/mem").join(PANIC_SOURCE),
            RgbaImage::new(4, 4),
        ));
        task(9, Some(marked), (8, 8)).execute(&rec);
        let events = rec.events.borrow();
        assert!(
            events[0].starts_with("err:9:rescale panicked: resample blew up"),
            "{events:?}"
        );
        assert_eq!(events[1], "done:9");
    }

    #[test]
    fn cancelled_task_still_completes() {
        let rec = Recorder::default();
        let src = source(4, 4);
        let weak = Arc::downgrade(&src);
        task(10, Some(src), (8, 8)).cancel(&rec);
        assert_eq!(
            *rec.events.borrow(),
            vec!["err:10:rescale cancelled: viewer is shutting down", "done:10"]
        );
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn completion_fires_when_outcome_delivery_fails() {
        let rec = Recorder {
            fail_outcome: true,
            ..Recorder::default()
        };
        task(4, Some(source(2, 2)), (1, 1)).execute(&rec);
        assert_eq!(*rec.events.borrow(), vec!["ok:4:1x1", "done:4"]);
    }

    struct PanickingSink {
        finished: RefCell<Option<u64>>,
    }

    impl OutcomeSink for PanickingSink {
        fn outcome(&self, _seq: u64, _outcome: TaskOutcome) -> anyhow::Result<()> {
            panic!("sink exploded");
        }

        fn finished(&self, seq: u64) {
            *self.finished.borrow_mut() = Some(seq);
        }
    }

    #[test]
    fn completion_fires_when_outcome_delivery_panics() {
        let sink = PanickingSink {
            finished: RefCell::new(None),
        };
        task(5, Some(source(2, 2)), (2, 2)).execute(&sink);
        assert_eq!(*sink.finished.borrow(), Some(5));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom 7");
    }
}
