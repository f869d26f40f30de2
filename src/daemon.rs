use crate::camera::CameraThread;
use crate::config::{validate_threshold, Config};
use crate::error::StartupError;
use crate::ipc::{self, ControlMessage};
use crate::labels::{load_labels, Threshold};
use crate::model::{resolve_model_path, InferenceEngine, OnnxModel};
use crate::pipeline::{Classifier, FramePipeline, FrameStatus};
use std::fs;
use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Loads labels and model and checks them against each other and the config.
pub fn build_classifier(cfg: &Config) -> Result<Classifier, StartupError> {
    cfg.validate()?;
    let labels = load_labels(&cfg.labels).map_err(|source| StartupError::Labels {
        path: cfg.labels.clone(),
        source,
    })?;
    debug!(count = labels.len(), path = %cfg.labels.display(), "labels loaded");
    let path = resolve_model_path(&cfg.model.file, cfg.model.repo.as_deref())?;
    let model = OnnxModel::load(&path)?;
    let engine = InferenceEngine::new(Box::new(model), cfg.input_size)?;
    Classifier::new(engine, labels, cfg.threshold, cfg.quantization)
}

/// Keeps the most recent status line, the way a display widget would.
fn spawn_ui(statuses: Receiver<FrameStatus>, shown: Arc<Mutex<String>>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("ui".into()).spawn(move || {
        for status in statuses {
            let line = status.to_string();
            let mut current = shown.lock().unwrap_or_else(PoisonError::into_inner);
            if *current != line {
                info!(status = %line, "status changed");
                *current = line;
            }
        }
        debug!("ui loop stopped");
    })
}

fn handle_control(
    stream: &mut UnixStream,
    threshold: &Threshold,
    shown: &Mutex<String>,
    shutdown: &Sender<()>,
) {
    match serde_json::from_reader::<_, ControlMessage>(&mut *stream) {
        Ok(ControlMessage::Status) => {
            let line = shown
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            trace!(status = %line, "sending status");
            if let Err(e) = stream.write_all(line.as_bytes()) {
                warn!("failed to send status: {e}");
            }
        }
        Ok(ControlMessage::SetThreshold(value)) => match validate_threshold(value) {
            Ok(()) => {
                threshold.set(value);
                info!(threshold = value, "threshold updated");
            }
            Err(e) => warn!("rejected threshold: {e}"),
        },
        Ok(ControlMessage::Shutdown) => {
            debug!("shutdown requested");
            let _ = shutdown.send(());
        }
        Err(e) => warn!("invalid control message: {e}"),
    }
}

fn spawn_control(
    listener: UnixListener,
    threshold: Threshold,
    shown: Arc<Mutex<String>>,
    shutdown: Sender<()>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("control".into()).spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(mut s) => handle_control(&mut s, &threshold, &shown, &shutdown),
                Err(e) => error!("failed to accept connection: {e}"),
            }
        }
    })
}

/// Runs the camera pipeline until a shutdown message arrives on the control socket.
pub fn run_daemon(cfg: Config) -> Result<(), StartupError> {
    info!("daemon starting");
    let classifier = Arc::new(build_classifier(&cfg)?);
    let threshold = classifier.threshold();

    let shown = Arc::new(Mutex::new(FrameStatus::NoImage.to_string()));
    let (ui_tx, ui_rx) = mpsc::channel();
    let ui = spawn_ui(ui_rx, shown.clone())?;
    let pipeline = FramePipeline::start(classifier.clone(), ui_tx)?;

    let sock_path = ipc::socket_path();
    if fs::remove_file(&sock_path).is_ok() {
        trace!(path = %sock_path.display(), "removed stale socket");
    }
    let listener = UnixListener::bind(&sock_path)?;
    debug!(path = %sock_path.display(), "socket bound");
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    spawn_control(listener, threshold, shown, shutdown_tx)?;

    let camera = match CameraThread::spawn(cfg.camera.clone(), pipeline.sender()) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = fs::remove_file(&sock_path);
            return Err(e);
        }
    };
    info!("daemon running");

    let _ = shutdown_rx.recv();
    info!("daemon stopping");
    camera.stop();
    pipeline.shutdown();
    if ui.join().is_err() {
        error!("ui thread panicked");
    }
    drop(classifier);
    let _ = fs::remove_file(&sock_path);
    info!("daemon stopped");
    Ok(())
}
