/*!
    Timestamped multi-stream recording sessions.
*/

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail, ensure};
use chrono::Local;

use videoio_types::{FrameSource, Metadata, VideoStreamParams};
use videoio_writer::{ContainerWriter, WriterConfig};

pub const DEFAULT_FPS: f64 = 29.0;

const FILE_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S.mkv";
const TITLE: &str = "videoio recording";

/**
    Which cameras a recording captures.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    Color,
    Depth,
    #[default]
    Both,
}

impl Mode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "c" => Some(Self::Color),
            "d" => Some(Self::Depth),
            "cd" | "dc" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn records_color(self) -> bool {
        matches!(self, Self::Color | Self::Both)
    }

    pub fn records_depth(self) -> bool {
        matches!(self, Self::Depth | Self::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Camera {
    Color,
    Depth,
}

impl Camera {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "c" => Some(Self::Color),
            "d" => Some(Self::Depth),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Depth => "depth",
        }
    }

    /**
        Codec and pixel format a stream of this camera is encoded with.
    */
    fn encoding(self) -> (&'static str, &'static str) {
        match self {
            Self::Color => ("wmv2", "yuv420p"),
            Self::Depth => ("ffv1", "gray16le"),
        }
    }
}

struct Session {
    writer: ContainerWriter,
    path: PathBuf,
    color: Option<usize>,
    depth: Option<usize>,
    started: Instant,
    limit: Option<Duration>,
    frames: u64,
}

/**
    Records frames from a color and a depth source into one container per
    session.
*/
pub struct Recorder<C, D> {
    color: C,
    depth: D,
    dir: PathBuf,
    mode: Mode,
    fps: f64,
    threads: Option<usize>,
    session: Option<Session>,
}

impl<C: FrameSource, D: FrameSource> Recorder<C, D> {
    pub fn new(color: C, depth: D) -> Self {
        Self {
            color,
            depth,
            dir: PathBuf::from("."),
            mode: Mode::default(),
            fps: DEFAULT_FPS,
            threads: None,
            session: None,
        }
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /**
        File of the running session.
    */
    pub fn current_file(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    fn ensure_idle(&self, what: &str) -> Result<()> {
        ensure!(self.session.is_none(), "cannot change {what} while recording");
        Ok(())
    }

    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        self.ensure_idle("the directory")?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        self.dir = dir;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.ensure_idle("the mode")?;
        self.mode = mode;
        Ok(())
    }

    pub fn set_size(&mut self, camera: Camera, width: u32, height: u32) -> Result<()> {
        self.ensure_idle("the frame size")?;
        match camera {
            Camera::Color => self.color.set_size(width, height)?,
            Camera::Depth => self.depth.set_size(width, height)?,
        }
        Ok(())
    }

    pub fn size(&self, camera: Camera) -> (u32, u32) {
        match camera {
            Camera::Color => self.color.size(),
            Camera::Depth => self.depth.size(),
        }
    }

    pub fn set_fps(&mut self, fps: f64) -> Result<()> {
        self.ensure_idle("the frame rate")?;
        ensure!(fps > 0.0 && fps.is_finite(), "frame rate must be positive, got {fps}");
        self.fps = fps;
        Ok(())
    }

    fn stream_params(&self, camera: Camera) -> VideoStreamParams {
        let (width, height) = self.size(camera);
        let (codec, pixel_format) = camera.encoding();
        VideoStreamParams::new(width, height, self.fps, pixel_format).with_codec(codec)
    }

    /**
        Start a new session, optionally stopping by itself after `limit`.

        Returns the path of the new file.
    */
    pub fn start(&mut self, limit: Option<Duration>) -> Result<PathBuf> {
        if self.session.is_some() {
            bail!("already recording");
        }
        let path = self
            .dir
            .join(Local::now().format(FILE_NAME_FORMAT).to_string());

        let config = WriterConfig {
            threads: self.threads,
        };
        let mut writer = ContainerWriter::from_path(&path, config)
            .with_context(|| format!("creating {}", path.display()))?;

        let mut title = Metadata::new();
        title.insert("title".into(), TITLE.into());
        writer.set_metadata(title)?;

        let mut add = |camera: Camera, enabled: bool| -> Result<Option<usize>> {
            if !enabled {
                return Ok(None);
            }
            let id = writer
                .add_video_stream(&self.stream_params(camera))
                .with_context(|| format!("adding {} stream", camera.name()))?;
            let mut tags = Metadata::new();
            tags.insert("camera".into(), camera.name().into());
            writer.set_stream_metadata(id, tags)?;
            Ok(Some(id))
        };
        let color = add(Camera::Color, self.mode.records_color())?;
        let depth = add(Camera::Depth, self.mode.records_depth())?;

        tracing::info!(path = %path.display(), mode = ?self.mode, fps = self.fps, ?limit, "recording started");
        self.session = Some(Session {
            writer,
            path: path.clone(),
            color,
            depth,
            started: Instant::now(),
            limit,
            frames: 0,
        });
        Ok(path)
    }

    /**
        Finish the running session. Returns its file, if one was running.
    */
    pub fn stop(&mut self) -> Result<Option<PathBuf>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };
        session
            .writer
            .close()
            .with_context(|| format!("finishing {}", session.path.display()))?;
        tracing::info!(
            path = %session.path.display(),
            frames = session.frames,
            seconds = session.started.elapsed().as_secs_f64(),
            "recording stopped"
        );
        Ok(Some(session.path))
    }

    /**
        Poll both sources once and record whatever they deliver.

        Stops the session once its time limit has passed. Returns true
        while a session is running.
    */
    pub fn tick(&mut self) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        if session.limit.is_some_and(|limit| session.started.elapsed() >= limit) {
            self.stop()?;
            return Ok(false);
        }

        if let Some(id) = session.color {
            if let Some(frame) = self.color.next_frame() {
                session.writer.write(id, frame)?;
                session.frames += 1;
            }
        }
        if let Some(id) = session.depth {
            if let Some(frame) = self.depth.next_frame() {
                session.writer.write(id, frame)?;
                session.frames += 1;
            }
        }
        Ok(true)
    }
}

impl<C, D> Drop for Recorder<C, D> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(path = %session.path.display(), "recording dropped while running");
        }
    }
}
