use crate::config::CameraSettings;
use crate::error::{FrameError, StartupError};
use crate::frame::RawFrame;
use crate::pipeline::{FrameSender, Submission};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Buffer, Camera,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Splits a captured buffer into YUV planes.
pub fn raw_frame(buffer: &Buffer) -> Result<RawFrame, FrameError> {
    let resolution = buffer.resolution();
    let (width, height) = (resolution.width(), resolution.height());
    match buffer.source_frame_format() {
        FrameFormat::NV12 => RawFrame::from_nv12(width, height, buffer.buffer()),
        FrameFormat::YUYV => RawFrame::from_yuyv(width, height, buffer.buffer()),
        other => Err(FrameError::Malformed(format!(
            "unsupported camera format {other:?}"
        ))),
    }
}

fn open_camera(settings: &CameraSettings) -> Result<Camera, StartupError> {
    for fmt in [FrameFormat::NV12, FrameFormat::YUYV] {
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new_from(settings.width, settings.height, fmt, settings.fps),
        ));
        match Camera::new(CameraIndex::Index(settings.index), req) {
            Ok(cam) if matches!(cam.frame_format(), FrameFormat::NV12 | FrameFormat::YUYV) => {
                return Ok(cam)
            }
            Ok(cam) => debug!(format = ?cam.camera_format(), "camera offered unusable format"),
            Err(e) => debug!(?fmt, "camera rejected format: {e}"),
        }
    }
    Err(StartupError::Camera(format!(
        "camera {} offers neither NV12 nor YUYV",
        settings.index
    )))
}

/// Capture loop feeding the pipeline until stopped.
pub struct CameraThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraThread {
    /// Returns once the stream is open, or with the reason it could not be.
    pub fn spawn(settings: CameraSettings, sender: FrameSender) -> Result<Self, StartupError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                let opened = open_camera(&settings).and_then(|mut cam| {
                    cam.open_stream()
                        .map_err(|e| StartupError::Camera(e.to_string()))?;
                    Ok(cam)
                });
                let mut cam = match opened {
                    Ok(cam) => {
                        let _ = ready_tx.send(Ok(()));
                        cam
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                debug!(format = ?cam.camera_format(), "camera stream opened");

                while flag.load(Ordering::Relaxed) {
                    let arrival = match cam.frame() {
                        Ok(buffer) => match raw_frame(&buffer) {
                            Ok(frame) => Some(frame),
                            Err(e) => {
                                warn!("unusable camera frame: {e}");
                                None
                            }
                        },
                        Err(e) => {
                            error!("failed to capture frame: {e}");
                            thread::sleep(Duration::from_millis(100));
                            None
                        }
                    };
                    if sender.submit(arrival) == Submission::Closed {
                        break;
                    }
                }
                if let Err(e) = cam.stop_stream() {
                    warn!("failed to stop camera stream: {e}");
                }
                debug!("camera stopped");
            })?;

        ready_rx
            .recv()
            .map_err(|_| StartupError::Camera("camera thread exited".into()))??;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("camera thread panicked");
            }
        }
    }
}

impl Drop for CameraThread {
    fn drop(&mut self) {
        self.halt();
    }
}
