/*!
    Multi-stream container reader.
*/

use std::{
    ffi::CString,
    path::{Path, PathBuf},
    ptr,
};

use ffmpeg_next::{
    Packet, Rescale, ffi, format::context::Input as InputContext, media::Type, rescale,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use videoio_decode::StreamDecoder;
use videoio_runtime::{
    convert::{metadata_from_dictionary, pixel_name, rational_from_ffmpeg, rational_to_ffmpeg},
    error as ff_error,
};
use videoio_transform::{
    ConvertTarget, FrameConverter,
    pixel::{copy_from_ffmpeg_into, output_format_for, pixel_format_to_ffmpeg},
};
use videoio_types::{
    DrainCursor, Error, ErrorKind, Metadata, Phase, PixelFormat, Pts, ReadParams, ReadStatus,
    Result, StreamDescriptor, VideoFrame,
};

use crate::probe::describe_stream;

static NO_METADATA: Metadata = Metadata::new();

/**
    Configuration for a [`ContainerReader`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Decoder threads per stream. `None` picks one per CPU plus one.
    pub threads: Option<usize>,
}

impl ReaderConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

struct StreamState {
    descriptor: StreamDescriptor,
    decoder: Option<StreamDecoder>,
    frames_read: u64,
    last_pts: Option<i64>,
}

impl StreamState {
    fn timestamp(&self) -> f64 {
        self.last_pts
            .map(|pts| Pts(pts).to_seconds(self.descriptor.time_base))
            .unwrap_or(0.0)
    }
}

fn wanted(filter: &[usize], index: usize) -> bool {
    filter.is_empty() || filter.contains(&index)
}

fn initial_phase(streams: &[StreamState]) -> Phase {
    if streams.iter().any(|s| s.descriptor.is_readable()) {
        Phase::Feeding
    } else {
        Phase::Exhausted
    }
}

/**
    Open a container and probe its streams.
*/
/**
    Scheduler transition for a failed packet read in `phase`.

    End of input moves to draining. A transient "try again" keeps the phase
    and ends the read with [`ReadStatus::Again`]; nothing else changes, so
    the read can be retried at once. Other failures are errors.
*/
fn packet_read_failed(
    err: ffmpeg_next::Error,
    phase: Phase,
) -> Result<(Phase, Option<ReadStatus>)> {
    match err {
        ffmpeg_next::Error::Eof => Ok((Phase::Draining, None)),
        e if ff_error::is_again(&e) => Ok((phase, Some(ReadStatus::Again))),
        e => Err(ff_error::from_ffmpeg(ErrorKind::RwFrame, "reading packet", e)),
    }
}

fn open_input(path: &Path) -> Result<InputContext> {
    let c_path = path
        .to_str()
        .and_then(|p| CString::new(p).ok())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::OpenFile,
                format!("unsupported path {}", path.display()),
            )
        })?;

    unsafe {
        let mut ctx: *mut ffi::AVFormatContext = ptr::null_mut();
        ff_error::check(
            ffi::avformat_open_input(&mut ctx, c_path.as_ptr(), ptr::null(), ptr::null_mut()),
            ErrorKind::OpenFile,
            format!("opening {}", path.display()),
        )?;

        let ret = ffi::avformat_find_stream_info(ctx, ptr::null_mut());
        if ret < 0 {
            ffi::avformat_close_input(&mut ctx);
            return Err(ff_error::from_ffmpeg(
                ErrorKind::FindStreamInfo,
                format!("probing {}", path.display()),
                ffmpeg_next::Error::from(ret),
            ));
        }
        Ok(InputContext::wrap(ctx))
    }
}

struct Session {
    path: PathBuf,
    streams: Vec<StreamState>,
    input: InputContext,
    metadata: Metadata,
    threads: usize,
    phase: Phase,
    cursor: DrainCursor,
    /// Stream whose decoder may still hold frames from the last packet.
    pending: Option<usize>,
    /// Position of the last packet read, in `AV_TIME_BASE` units.
    last_position: Option<i64>,
    decoded: VideoFrameFFmpeg,
    converter: FrameConverter,
    image: VideoFrame,
    has_image: bool,
}

impl Session {
    fn open(path: &Path, threads: usize) -> Result<Self> {
        let input = open_input(path)?;

        let mut streams = Vec::with_capacity(input.nb_streams() as usize);
        for stream in input.streams() {
            let decoder = if stream.parameters().medium() == Type::Video {
                StreamDecoder::open(stream.parameters(), threads)?
            } else {
                None
            };
            let descriptor = describe_stream(&input, &stream, decoder.as_ref());
            tracing::debug!(
                index = descriptor.index,
                kind = ?descriptor.kind,
                codec = %descriptor.codec_name,
                width = descriptor.width,
                height = descriptor.height,
                readable = descriptor.is_readable(),
                "stream probed"
            );
            streams.push(StreamState {
                descriptor,
                decoder,
                frames_read: 0,
                last_pts: None,
            });
        }

        let metadata = metadata_from_dictionary(input.metadata());
        let phase = initial_phase(&streams);
        let cursor = DrainCursor::new(streams.len());

        Ok(Self {
            path: path.to_path_buf(),
            streams,
            input,
            metadata,
            threads,
            phase,
            cursor,
            pending: None,
            last_position: None,
            decoded: VideoFrameFFmpeg::empty(),
            converter: FrameConverter::new(),
            image: VideoFrame::blank(PixelFormat::Gray8, 0, 0),
            has_image: false,
        })
    }

    fn read(&mut self, filter: &[usize], params: &ReadParams) -> Result<ReadStatus> {
        if let Some(&index) = filter.iter().find(|&&i| i >= self.streams.len()) {
            return Err(Error::bad_param(format!("stream {index} does not exist")));
        }
        self.has_image = false;

        loop {
            if let Some(index) = self.pending {
                if let Some(decoder) = self.streams[index].decoder.as_mut() {
                    if decoder.receive(&mut self.decoded)? {
                        return self.deliver(index, params);
                    }
                }
                self.pending = None;
            }

            match self.phase {
                Phase::Feeding => {
                    if let Some(status) = self.feed(filter)? {
                        return Ok(status);
                    }
                }
                Phase::Draining => {
                    let streams = &mut self.streams;
                    let decoded = &mut self.decoded;
                    let found = self.cursor.drain_next(|index| {
                        match streams[index].decoder.as_mut() {
                            Some(decoder) if wanted(filter, index) => decoder.receive(decoded),
                            _ => Ok(false),
                        }
                    })?;
                    match found {
                        Some(index) => return self.deliver(index, params),
                        None => {
                            tracing::debug!(path = %self.path.display(), "end of container");
                            self.rewind();
                            return Ok(ReadStatus::Eof);
                        }
                    }
                }
                Phase::Exhausted => return Ok(ReadStatus::Eof),
            }
        }
    }

    /**
        Read one packet and hand it to its decoder.

        Returns a status only when the read must end without a frame.
    */
    fn feed(&mut self, filter: &[usize]) -> Result<Option<ReadStatus>> {
        let mut packet = Packet::empty();
        if let Err(e) = packet.read(&mut self.input) {
            let (phase, status) = packet_read_failed(e, self.phase)?;
            if phase == Phase::Draining {
                for decoder in self.streams.iter_mut().filter_map(|s| s.decoder.as_mut()) {
                    decoder.send_eof()?;
                }
            }
            self.phase = phase;
            return Ok(status);
        }

        let index = packet.stream();
        let Some(state) = self.streams.get_mut(index) else {
            return Ok(None);
        };
        if let Some(position) = packet.dts().or(packet.pts()) {
            let time_base = rational_to_ffmpeg(state.descriptor.time_base);
            self.last_position = Some(position.rescale(time_base, rescale::TIME_BASE));
        }
        if !wanted(filter, index) {
            return Ok(None);
        }
        let Some(decoder) = state.decoder.as_mut() else {
            return Ok(None);
        };
        decoder.send(&packet)?;
        self.pending = Some(index);
        Ok(None)
    }

    /**
        Convert the decoded frame of `index` into the application frame.
    */
    fn deliver(&mut self, index: usize, params: &ReadParams) -> Result<ReadStatus> {
        let state = &mut self.streams[index];
        let decoded = &self.decoded;
        state.frames_read += 1;
        state.last_pts = decoded.timestamp().or(decoded.pts());

        let descriptor = &mut state.descriptor;
        descriptor.width = decoded.width();
        descriptor.height = decoded.height();
        let aspect = rational_from_ffmpeg(decoded.aspect_ratio());
        if aspect.num > 0 && aspect.den > 0 {
            descriptor.sample_aspect_ratio = aspect;
        }
        if let Some(name) = pixel_name(decoded.format()) {
            if descriptor.pixel_format.as_deref() != Some(name) {
                descriptor.pixel_format = Some(name.to_owned());
            }
        }

        let format = output_format_for(decoded.format()).ok_or_else(|| {
            Error::convert_image(format!(
                "no output layout for pixel format {:?}",
                decoded.format()
            ))
        })?;
        let (width, height) = descriptor.display_size(params);
        let target = ConvertTarget::new(pixel_format_to_ffmpeg(format), width, height)
            .with_interp(params.interp);

        let converted = self.converter.convert(decoded, &target)?;
        copy_from_ffmpeg_into(converted, descriptor.time_base, &mut self.image)?;
        self.has_image = true;
        self.cursor.record(index);

        tracing::trace!(stream = index, frames = state.frames_read, "frame decoded");
        Ok(ReadStatus::Frame(index))
    }

    fn reset_decoding(&mut self) {
        for decoder in self.streams.iter_mut().filter_map(|s| s.decoder.as_mut()) {
            decoder.flush();
        }
        self.pending = None;
        self.cursor.reset();
        self.has_image = false;
        self.phase = initial_phase(&self.streams);
    }

    /**
        Seek back to the start of the container and reset the counters.
    */
    fn rewind(&mut self) -> bool {
        let start: i64 = 0;
        match self.input.seek(start, ..start) {
            Ok(()) => {
                self.reset_decoding();
                for state in &mut self.streams {
                    state.frames_read = 0;
                    state.last_pts = None;
                }
                self.last_position = None;
                tracing::debug!(path = %self.path.display(), "rewound to start");
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "rewind failed");
                self.phase = Phase::Exhausted;
                false
            }
        }
    }

    fn seek(&mut self, frame: u64) -> bool {
        let Some(last) = self.last_position else {
            return self.rewind();
        };
        let Some(fps) = self
            .streams
            .iter()
            .find(|s| s.descriptor.is_readable())
            .map(|s| s.descriptor.fps())
            .filter(|fps| *fps > 0.0)
        else {
            tracing::warn!(frame, "no readable stream with a frame rate to seek by");
            return false;
        };

        let mut seconds = frame as f64 / fps;
        let duration = self.duration();
        if duration > 0.0 {
            seconds = seconds.min(duration);
        }
        let target = (seconds * f64::from(ffi::AV_TIME_BASE)) as i64;

        let result = if target < last {
            self.input.seek(target, ..target)
        } else {
            self.input.seek(target, target..)
        };
        match result {
            Ok(()) => {
                self.reset_decoding();
                self.last_position = Some(target);
                tracing::debug!(frame, seconds, "seeked");
                true
            }
            Err(e) => {
                tracing::warn!(frame, seconds, error = %e, "seek failed");
                false
            }
        }
    }

    fn duration(&self) -> f64 {
        self.streams
            .iter()
            .map(|s| s.descriptor.duration)
            .fold(0.0, f64::max)
    }
}

/**
    Reader for every video stream of a container file.

    A read returns the next decoded frame of whichever stream produces one
    first. While the container yields packets each packet goes to the
    decoder of its stream; once it is exhausted the decoders are drained in
    rotation. At the end the reader rewinds itself, so the next read starts
    over.

    ```ignore
    let mut reader = ContainerReader::from_path("in.mkv", ReaderConfig::default())?;
    while let ReadStatus::Frame(stream) = reader.read(&[], &ReadParams::default())? {
        let frame = reader.frame().expect("frame after a successful read");
        println!("stream {stream}: {}x{}", frame.width, frame.height);
    }
    ```
*/
#[derive(Default)]
pub struct ContainerReader {
    config: ReaderConfig,
    session: Option<Session>,
}

impl ContainerReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /**
        Create a reader and open `path`.
    */
    pub fn from_path<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let mut reader = Self::new(config);
        reader.open(path)?;
        Ok(reader)
    }

    /**
        Open a container, closing any container opened before.

        Every video stream with a decoder becomes readable. A failure leaves
        the reader closed.
    */
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.close();
        videoio_runtime::init()?;

        let path = path.as_ref();
        let threads = videoio_runtime::thread_count(self.config.threads);
        let session = Session::open(path, threads)?;

        tracing::info!(
            path = %path.display(),
            streams = session.streams.len(),
            readable = session.streams.iter().filter(|s| s.descriptor.is_readable()).count(),
            threads,
            "container opened"
        );
        self.session = Some(session);
        Ok(())
    }

    /**
        Release the container and all decoders. Safe to call repeatedly.
    */
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(path = %session.path.display(), "container closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /**
        Read the next frame.

        `filter` restricts reading to the listed stream indices; an empty
        filter reads every readable stream. Returns
        [`ReadStatus::Again`] when the container is temporarily not ready,
        and [`ReadStatus::Eof`] once every stream is drained (or when the
        reader is closed).
    */
    pub fn read(&mut self, filter: &[usize], params: &ReadParams) -> Result<ReadStatus> {
        params.validate()?;
        match self.session.as_mut() {
            Some(session) => session.read(filter, params),
            None => Ok(ReadStatus::Eof),
        }
    }

    /**
        Frame produced by the last successful read.

        The frame is only valid until the next call to [`read`](Self::read).
        Any read invalidates it first, including one that ends with
        [`ReadStatus::Again`], [`ReadStatus::Eof`] or an error.
    */
    pub fn frame(&self) -> Option<&VideoFrame> {
        self.session
            .as_ref()
            .filter(|s| s.has_image)
            .map(|s| &s.image)
    }

    /**
        Seek so that the next read starts near `frame` of the first readable
        video stream.

        Before any packet has been read this rewinds to the start. Returns
        false when the container cannot seek there.
    */
    pub fn seek(&mut self, frame: u64) -> bool {
        self.session.as_mut().is_some_and(|s| s.seek(frame))
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(Phase::Exhausted, |s| s.phase)
    }

    /**
        Decoder threads per stream.
    */
    pub fn thread_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or_else(|| videoio_runtime::thread_count(self.config.threads), |s| s.threads)
    }

    /**
        Container tags, and whether any exist.
    */
    pub fn metadata(&self) -> (bool, &Metadata) {
        let metadata = self.session.as_ref().map_or(&NO_METADATA, |s| &s.metadata);
        (!metadata.is_empty(), metadata)
    }

    pub fn nb_streams(&self) -> usize {
        self.descriptors().count()
    }

    pub fn nb_video_streams(&self) -> usize {
        self.descriptors().filter(|d| d.is_video()).count()
    }

    pub fn nb_readable_video_streams(&self) -> usize {
        self.descriptors().filter(|d| d.is_readable()).count()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.session
            .iter()
            .flat_map(|s| s.streams.iter().map(|state| &state.descriptor))
    }

    fn state(&self, index: usize) -> Result<&StreamState> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::bad_param("reader is not open"))?;
        session
            .streams
            .get(index)
            .ok_or_else(|| Error::bad_param(format!("stream {index} does not exist")))
    }

    /**
        Description of stream `index`. Fails with `BadParam` for an
        unknown index.
    */
    pub fn stream(&self, index: usize) -> Result<&StreamDescriptor> {
        self.state(index).map(|s| &s.descriptor)
    }

    pub fn codec_description(&self, index: usize) -> Result<&str> {
        self.stream(index).map(|d| d.codec_description.as_str())
    }

    pub fn codec_name(&self, index: usize) -> Result<&str> {
        self.stream(index).map(|d| d.codec_name.as_str())
    }

    pub fn fourcc(&self, index: usize) -> Result<u32> {
        self.stream(index).map(|d| d.fourcc)
    }

    pub fn is_video_stream(&self, index: usize) -> Result<bool> {
        self.stream(index).map(StreamDescriptor::is_video)
    }

    pub fn is_audio_stream(&self, index: usize) -> Result<bool> {
        self.stream(index).map(StreamDescriptor::is_audio)
    }

    pub fn has_decoder(&self, index: usize) -> Result<bool> {
        self.stream(index).map(|d| d.has_decoder)
    }

    pub fn frame_count(&self, index: usize) -> Result<u64> {
        self.stream(index).map(|d| d.frame_count)
    }

    /**
        Duration in seconds.
    */
    pub fn duration(&self, index: usize) -> Result<f64> {
        self.stream(index).map(|d| d.duration)
    }

    pub fn fps(&self, index: usize) -> Result<f64> {
        self.stream(index).map(StreamDescriptor::fps)
    }

    pub fn avg_fps(&self, index: usize) -> Result<f64> {
        self.stream(index).map(|d| d.avg_frame_rate.to_f64())
    }

    pub fn pixel_format(&self, index: usize) -> Result<Option<&str>> {
        self.stream(index).map(|d| d.pixel_format.as_deref())
    }

    pub fn width(&self, index: usize) -> Result<u32> {
        self.stream(index).map(|d| d.width)
    }

    pub fn height(&self, index: usize) -> Result<u32> {
        self.stream(index).map(|d| d.height)
    }

    /**
        Width of the frames a read with `params` returns.
    */
    pub fn display_width(&self, index: usize, params: &ReadParams) -> Result<u32> {
        self.stream(index).map(|d| d.display_width(params))
    }

    /**
        Height of the frames a read with `params` returns.
    */
    pub fn display_height(&self, index: usize, params: &ReadParams) -> Result<u32> {
        self.stream(index).map(|d| d.display_height(params))
    }

    pub fn aspect_ratio(&self, index: usize) -> Result<f64> {
        self.stream(index).map(StreamDescriptor::aspect_ratio)
    }

    pub fn bit_rate(&self, index: usize) -> Result<i64> {
        self.stream(index).map(|d| d.bit_rate)
    }

    pub fn bit_rate_tolerance(&self, index: usize) -> Result<i32> {
        self.stream(index).map(|d| d.bit_rate_tolerance)
    }

    pub fn gop_size(&self, index: usize) -> Result<i32> {
        self.stream(index).map(|d| d.gop_size)
    }

    pub fn max_b_frames(&self, index: usize) -> Result<i32> {
        self.stream(index).map(|d| d.max_b_frames)
    }

    /**
        Frames read from stream `index` since opening or the last rewind.
    */
    pub fn frames_read(&self, index: usize) -> Result<u64> {
        self.state(index).map(|s| s.frames_read)
    }

    /**
        Presentation time in seconds of the last frame read from `index`.
    */
    pub fn timestamp(&self, index: usize) -> Result<f64> {
        self.state(index).map(StreamState::timestamp)
    }
}

impl Drop for ContainerReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ContainerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerReader")
            .field("config", &self.config)
            .field("path", &self.path())
            .field("phase", &self.phase())
            .field("streams", &self.nb_streams())
            .finish()
    }
}
