//! Camera recorder collaborator.
//!
//! The recorder only tracks state and creates an empty placeholder file per
//! recording; no media is captured.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Recorder errors.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// `start` while a recording is running.
    #[error("Recording already in progress")]
    AlreadyRecording,
    /// `stop` with nothing running.
    #[error("No recording in progress")]
    NotRecording,
    /// The recordings directory or file could not be created.
    #[error("failed to prepare recording file: {0}")]
    Io(#[from] std::io::Error),
}

/// Recorder status as sent to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatus {
    /// Whether a recording is running.
    pub recording: bool,
    /// Base name of the current recording file, empty when idle.
    pub filename: String,
    /// Local start time of the latest recording, empty if none was started.
    pub start_time: String,
    /// Seconds since the current recording started, `0` when idle.
    pub duration: u64,
    /// Address of the camera being recorded.
    #[serde(default)]
    pub camera_ip: String,
}

/// Returned by a successful start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStarted {
    /// File name.
    pub filename: String,
    /// Path under the recordings directory.
    pub path: String,
}

/// Returned by a successful stop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingStopped {
    /// Recording length in seconds.
    pub duration: f64,
    /// Path of the finished file.
    pub path: String,
}

/// Recording state as seen by the router and the REST handlers.
#[async_trait]
pub trait RecordingState: Send + Sync {
    /// Current status.
    async fn status(&self) -> Result<CameraStatus, RecordingError>;
    /// Begin a recording.
    async fn start(&self) -> Result<RecordingStarted, RecordingError>;
    /// End the running recording.
    async fn stop(&self) -> Result<RecordingStopped, RecordingError>;
}

struct ActiveRecording {
    path: PathBuf,
    started: Instant,
}

#[derive(Default)]
struct RecorderInner {
    active: Option<ActiveRecording>,
    last_start: Option<DateTime<Local>>,
}

/// In-memory recorder writing placeholder files under a directory.
pub struct CameraRecorder {
    dir: PathBuf,
    camera_ip: String,
    inner: Mutex<RecorderInner>,
}

impl CameraRecorder {
    /// Create a recorder that places files under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            camera_ip: String::new(),
            inner: Mutex::new(RecorderInner::default()),
        }
    }

    /// Set the camera address reported in [`CameraStatus`].
    #[must_use]
    pub fn with_camera(mut self, camera_ip: impl Into<String>) -> Self {
        self.camera_ip = camera_ip.into();
        self
    }

    /// Recordings directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot(&self) -> CameraStatus {
        let inner = self.inner.lock();
        let start_time = inner
            .last_start
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        match &inner.active {
            Some(active) => CameraStatus {
                recording: true,
                filename: file_name(&active.path),
                start_time,
                duration: active.started.elapsed().as_secs(),
                camera_ip: self.camera_ip.clone(),
            },
            None => CameraStatus {
                recording: false,
                filename: String::new(),
                start_time,
                duration: 0,
                camera_ip: self.camera_ip.clone(),
            },
        }
    }
}

#[async_trait]
impl RecordingState for CameraRecorder {
    async fn status(&self) -> Result<CameraStatus, RecordingError> {
        Ok(self.snapshot())
    }

    async fn start(&self) -> Result<RecordingStarted, RecordingError> {
        if self.inner.lock().active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }
        let now = Local::now();
        let filename = recording_file_name(&now);
        let path = self.dir.join(&filename);

        tokio::fs::create_dir_all(&self.dir).await?;
        drop(tokio::fs::File::create(&path).await?);

        {
            let mut inner = self.inner.lock();
            if inner.active.is_some() {
                return Err(RecordingError::AlreadyRecording);
            }
            inner.active = Some(ActiveRecording {
                path: path.clone(),
                started: Instant::now(),
            });
            inner.last_start = Some(now);
        }
        info!(path = %path.display(), "recording started");
        Ok(RecordingStarted {
            filename,
            path: path.display().to_string(),
        })
    }

    async fn stop(&self) -> Result<RecordingStopped, RecordingError> {
        let active = self
            .inner
            .lock()
            .active
            .take()
            .ok_or(RecordingError::NotRecording)?;
        let duration = active.started.elapsed().as_secs_f64();
        info!(path = %active.path.display(), duration, "recording stopped");
        Ok(RecordingStopped {
            duration,
            path: active.path.display().to_string(),
        })
    }
}

/// `camera_recording_YYYYMMDD_HHMMSS.mp4`
pub fn recording_file_name(at: &DateTime<Local>) -> String {
    format!("camera_recording_{}.mp4", at.format("%Y%m%d_%H%M%S"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(recording_file_name(&at), "camera_recording_20240309_070501.mp4");
    }

    #[tokio::test]
    async fn status_reports_configured_camera() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path()).with_camera("192.168.1.41:8080");
        assert_eq!(rec.status().await.unwrap().camera_ip, "192.168.1.41:8080");
        let _ = rec.start().await.unwrap();
        assert_eq!(rec.status().await.unwrap().camera_ip, "192.168.1.41:8080");
    }

    #[tokio::test]
    async fn idle_status_before_any_recording() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path());
        let status = rec.status().await.unwrap();
        assert_eq!(
            status,
            CameraStatus {
                recording: false,
                filename: String::new(),
                start_time: String::new(),
                duration: 0,
                camera_ip: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn start_creates_placeholder_and_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path().join("recordings"));

        let started = rec.start().await.unwrap();
        assert!(started.filename.starts_with("camera_recording_"));
        assert!(started.filename.ends_with(".mp4"));
        assert!(Path::new(&started.path).exists());

        let status = rec.status().await.unwrap();
        assert!(status.recording);
        assert_eq!(status.filename, started.filename);
        assert_eq!(status.start_time.len(), "2024-01-01 00:00:00".len());
    }

    #[tokio::test]
    async fn double_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path());
        let _ = rec.start().await.unwrap();
        let err = rec.start().await.unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyRecording));
        assert_eq!(err.to_string(), "Recording already in progress");
    }

    #[tokio::test]
    async fn stop_without_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path());
        let err = rec.stop().await.unwrap_err();
        assert!(matches!(err, RecordingError::NotRecording));
    }

    #[tokio::test]
    async fn stop_returns_path_and_keeps_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let rec = CameraRecorder::new(dir.path());
        let started = rec.start().await.unwrap();
        let stopped = rec.stop().await.unwrap();
        assert_eq!(stopped.path, started.path);
        assert!(stopped.duration >= 0.0);

        let status = rec.status().await.unwrap();
        assert!(!status.recording);
        assert!(status.filename.is_empty());
        assert!(!status.start_time.is_empty());
        assert_eq!(status.duration, 0);
    }
}
