use crate::error::{ClassifyError, LabelCountMismatchError, StartupError};
use crate::frame::{convert, RawFrame};
use crate::labels::{ClassificationResult, LabelScorer, Threshold};
use crate::model::InferenceEngine;
use crate::tensor::{prepare, Quantization};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// What the UI is told about one frame arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    Classified(ClassificationResult),
    NoImage,
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStatus::Classified(result) => write!(f, "{result}"),
            FrameStatus::NoImage => f.write_str("No image available"),
        }
    }
}

/// Owns the model and label set; everything needed to classify a frame.
#[derive(Debug)]
pub struct Classifier {
    engine: InferenceEngine,
    scorer: LabelScorer,
    quantization: Quantization,
}

impl Classifier {
    /// Fails when the model declares a class count that differs from the label count.
    pub fn new(
        engine: InferenceEngine,
        labels: Vec<String>,
        threshold: f32,
        quantization: Quantization,
    ) -> Result<Self, StartupError> {
        if let Some(classes) = engine.class_count() {
            if classes != labels.len() {
                return Err(LabelCountMismatchError {
                    labels: labels.len(),
                    scores: classes,
                }
                .into());
            }
        }
        Ok(Self {
            engine,
            scorer: LabelScorer::new(labels, threshold),
            quantization,
        })
    }

    pub fn threshold(&self) -> Threshold {
        self.scorer.threshold()
    }

    pub fn classify(&self, frame: RawFrame) -> Result<ClassificationResult, ClassifyError> {
        let (width, height) = (frame.width, frame.height);
        let image = convert(frame)?;
        let input = prepare(image, self.engine.input_size(), self.quantization);
        let output = self.engine.infer(&input)?;
        let result = self.scorer.score(&output)?;
        trace!(width, height, %result, "frame classified");
        Ok(result)
    }

    /// Classifies one arrival, containing every per-frame failure.
    pub fn process(&self, arrival: Option<RawFrame>) -> FrameStatus {
        let Some(frame) = arrival else {
            debug!("no frame available");
            return FrameStatus::NoImage;
        };
        match self.classify(frame) {
            Ok(result) => FrameStatus::Classified(result),
            Err(e) => {
                warn!("dropping frame: {e}");
                FrameStatus::NoImage
            }
        }
    }
}

struct SlotState<T> {
    pending: Option<T>,
    closed: bool,
}

/// Capacity-one handoff where a new item overwrites an unconsumed one.
struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> LatestSlot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Returns `Ok(true)` if an unconsumed item was overwritten.
    fn put(&self, item: T) -> Result<bool, T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(item);
        }
        let replaced = state.pending.replace(item).is_some();
        drop(state);
        self.ready.notify_one();
        Ok(replaced)
    }

    /// Blocks until an item is pending; `None` once closed. `busy` is raised
    /// under the lock, together with the item leaving the slot.
    fn take(&self, busy: &AtomicBool) -> Option<T> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self
            .ready
            .wait_while(state, |s| s.pending.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return None;
        }
        busy.store(true, Ordering::Release);
        state.pending.take()
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.pending = None;
        drop(state);
        self.ready.notify_all();
    }
}

type Arrival = Option<RawFrame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Accepted, discarding a frame the worker had not picked up yet.
    Replaced,
    Closed,
}

/// Producer handle given to the camera thread.
#[derive(Clone)]
pub struct FrameSender {
    slot: Arc<LatestSlot<Arrival>>,
    replaced: Arc<AtomicU64>,
}

impl FrameSender {
    /// Never blocks. `None` reports that the camera had no frame to give.
    pub fn submit(&self, frame: Option<RawFrame>) -> Submission {
        match self.slot.put(frame) {
            Ok(false) => Submission::Accepted,
            Ok(true) => {
                let total = self.replaced.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(replaced = total, "pending frame replaced");
                Submission::Replaced
            }
            Err(_) => Submission::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Processing,
}

/// Single worker thread that classifies the latest submitted frame and
/// publishes a [`FrameStatus`] for each one.
pub struct FramePipeline {
    slot: Arc<LatestSlot<Arrival>>,
    replaced: Arc<AtomicU64>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FramePipeline {
    pub fn start(classifier: Arc<Classifier>, ui: Sender<FrameStatus>) -> io::Result<Self> {
        let slot = Arc::new(LatestSlot::new());
        let busy = Arc::new(AtomicBool::new(false));
        let worker_slot = slot.clone();
        let worker_busy = busy.clone();
        let worker = thread::Builder::new()
            .name("frame-worker".into())
            .spawn(move || run_worker(&classifier, &worker_slot, &ui, &worker_busy))?;
        debug!("frame pipeline started");
        Ok(Self {
            slot,
            replaced: Arc::new(AtomicU64::new(0)),
            busy,
            worker: Some(worker),
        })
    }

    pub fn sender(&self) -> FrameSender {
        FrameSender {
            slot: self.slot.clone(),
            replaced: self.replaced.clone(),
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.busy.load(Ordering::Acquire) {
            PipelineState::Processing
        } else {
            PipelineState::Idle
        }
    }

    /// Frames overwritten before the worker could take them.
    pub fn replaced_frames(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }

    /// Stops accepting frames, drops any pending one and waits for the frame
    /// in flight to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.slot.close();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("frame worker panicked");
            }
            debug!(replaced = self.replaced_frames(), "frame pipeline stopped");
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Closes the slot and clears `busy` on any worker exit, unwinding included.
struct WorkerExit<'a> {
    slot: &'a LatestSlot<Arrival>,
    busy: &'a AtomicBool,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        self.slot.close();
        if thread::panicking() {
            error!("frame worker stopped by a panic");
        }
    }
}

fn run_worker(
    classifier: &Classifier,
    slot: &LatestSlot<Arrival>,
    ui: &Sender<FrameStatus>,
    busy: &AtomicBool,
) {
    let _exit = WorkerExit { slot, busy };
    while let Some(arrival) = slot.take(busy) {
        let status = classifier.process(arrival);
        busy.store(false, Ordering::Release);
        if ui.send(status).is_err() {
            debug!("ui receiver closed");
            break;
        }
    }
}
