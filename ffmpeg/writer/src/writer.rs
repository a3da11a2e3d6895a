/*!
    Multi-stream container writer.
*/

use std::{
    ffi::CString,
    path::{Path, PathBuf},
    ptr,
};

use ffmpeg_next::{
    Packet, codec, ffi, format::context::Output as OutputContext,
    util::frame::video::Video as VideoFrameFFmpeg,
};
use libc::c_int;

use videoio_encode::{StreamEncoder, find_codec, find_pixel_format};
use videoio_runtime::{
    convert::{metadata_to_dictionary, rational_from_ffmpeg, riff_video_tag},
    error as ff_error,
};
use videoio_transform::{
    ConvertTarget, FrameConverter,
    pixel::{copy_into_ffmpeg, pixel_format_to_ffmpeg},
};
use videoio_types::{
    Error, ErrorKind, Metadata, Pts, Result, VideoFrame, VideoStreamParams,
};

/**
    Upper bound on cached-frame replays per stream while flushing.
*/
const MAX_FLUSH_REPLAYS: u64 = 1024;

/**
    Muxer interleaving delay in seconds.
*/
const MAX_DELAY_SECONDS: f64 = 0.7;

/**
    Configuration for a [`ContainerWriter`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterConfig {
    /// Encoder threads per stream. `None` picks one per CPU plus one.
    pub threads: Option<usize>,
}

impl WriterConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

struct OutputStream {
    /// Container stream index.
    index: usize,
    params: VideoStreamParams,
    encoder: StreamEncoder,
    metadata: Metadata,
    /// Last frame handed in by the caller, in the caller's layout.
    source: Option<VideoFrameFFmpeg>,
    /// Frames received from the caller.
    frames: u64,
    /// Frames submitted to the encoder, flush replays included.
    submitted: u64,
    packets: u64,
    last_pts: Option<i64>,
}

impl OutputStream {
    /**
        Stamp the packet for this stream and hand it to the muxer.
    */
    fn mux(&mut self, packet: &mut Packet, output: &mut OutputContext) -> Result<()> {
        let stream_time_base = output
            .stream(self.index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| Error::bad_param(format!("stream {} vanished", self.index)))?;
        packet.set_stream(self.index);
        packet.rescale_ts(self.encoder.time_base(), stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(ff_error::map(ErrorKind::RwFrame, "writing packet"))?;
        self.packets += 1;
        Ok(())
    }

    fn timestamp(&self) -> f64 {
        let time_base = rational_from_ffmpeg(self.encoder.time_base());
        self.last_pts
            .map(|pts| Pts(pts).to_seconds(time_base))
            .unwrap_or(0.0)
    }
}

fn output_flags(output: &OutputContext) -> c_int {
    unsafe { (*(*output.as_ptr()).oformat).flags }
}

/**
    Allocate an output context for `path`, guessing the format from the
    file name, and open the file unless the format needs none.
*/
fn open_output(path: &Path) -> Result<OutputContext> {
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
        let ret = ffi::avformat_alloc_output_context2(
            &mut ctx,
            ptr::null(),
            ptr::null(),
            c_path.as_ptr(),
        );
        if ret < 0 || ctx.is_null() {
            return Err(ff_error::from_ffmpeg(
                ErrorKind::GuessFormat,
                format!("no container format for {}", path.display()),
                ffmpeg_next::Error::from(ret.min(-1)),
            ));
        }

        if (*(*ctx).oformat).flags & ffi::AVFMT_NOFILE as c_int == 0 {
            let ret = ffi::avio_open(&mut (*ctx).pb, c_path.as_ptr(), ffi::AVIO_FLAG_WRITE as c_int);
            if ret < 0 {
                ffi::avformat_free_context(ctx);
                return Err(ff_error::from_ffmpeg(
                    ErrorKind::OpenFile,
                    format!("creating {}", path.display()),
                    ffmpeg_next::Error::from(ret),
                ));
            }
        }
        (*ctx).max_delay = (MAX_DELAY_SECONDS * f64::from(ffi::AV_TIME_BASE)) as c_int;
        Ok(OutputContext::wrap(ctx))
    }
}

fn check_metadata(metadata: &Metadata) -> Result<()> {
    match metadata.keys().find(|key| key.is_empty() || key.contains('\0')) {
        Some(key) => Err(Error::new(
            ErrorKind::SetMetadata,
            format!("invalid metadata key {key:?}"),
        )),
        None => Ok(()),
    }
}

struct Session {
    path: PathBuf,
    streams: Vec<OutputStream>,
    output: OutputContext,
    converter: FrameConverter,
    metadata: Metadata,
    threads: usize,
    header_written: bool,
    failed: bool,
}

/**
    Detach `frame` from buffers an encoder still holds.

    Encoders that delay frames keep a reference to the sent buffer, so a
    reused frame gets fresh storage before it is overwritten.
*/
fn make_writable(frame: &mut VideoFrameFFmpeg) -> Result<()> {
    ff_error::check(
        unsafe { ffi::av_frame_make_writable(frame.as_mut_ptr()) },
        ErrorKind::RwFrame,
        "detaching frame buffer",
    )?;
    Ok(())
}

impl Session {
    fn open(path: &Path, threads: usize) -> Result<Self> {
        let output = open_output(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            streams: Vec::new(),
            output,
            converter: FrameConverter::new(),
            metadata: Metadata::new(),
            threads,
            header_written: false,
            failed: false,
        })
    }

    /**
        Record a failure so that closing skips the flush replay.
    */
    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !self.failed {
                tracing::debug!(path = %self.path.display(), error = %e, "writer marked failed");
            }
            self.failed = true;
        }
        result
    }

    fn stream(&self, id: usize) -> Result<&OutputStream> {
        self.streams
            .get(id)
            .ok_or_else(|| Error::bad_param(format!("stream {id} does not exist")))
    }

    fn add_video_stream(&mut self, params: &VideoStreamParams) -> Result<usize> {
        if self.header_written {
            return Err(Error::bad_param(
                "streams cannot be added after the header was written",
            ));
        }
        params.validate()?;

        let default_codec =
            codec::Id::from(unsafe { (*(*self.output.as_ptr()).oformat).video_codec });
        let codec = find_codec(&params.codec, default_codec)?;
        let format = find_pixel_format(&codec, &params.pixel_format, params.find_best_pixel_format)?;
        let global_header = output_flags(&self.output) & ffi::AVFMT_GLOBALHEADER as c_int != 0;
        let encoder = StreamEncoder::open(codec, params, format, self.threads, global_header)?;

        let mut stream = self
            .output
            .add_stream(codec)
            .map_err(ff_error::map(ErrorKind::OpenCodec, "adding stream"))?;
        let parameters = encoder.parameters();
        // Muxers read the display aspect from the stream, not the parameters.
        unsafe {
            (*stream.as_mut_ptr()).sample_aspect_ratio = (*parameters.as_ptr()).sample_aspect_ratio;
        }
        stream.set_parameters(parameters);
        stream.set_time_base(encoder.time_base());
        stream.set_avg_frame_rate(encoder.time_base().invert());
        let index = stream.index();

        tracing::debug!(
            path = %self.path.display(),
            index,
            codec = %encoder.codec_name(),
            format = ?encoder.format(),
            width = params.width,
            height = params.height,
            fps = params.frame_rate,
            "stream added"
        );

        self.streams.push(OutputStream {
            index,
            params: params.clone(),
            encoder,
            metadata: Metadata::new(),
            source: None,
            frames: 0,
            submitted: 0,
            packets: 0,
            last_pts: None,
        });
        Ok(self.streams.len() - 1)
    }

    fn write_header(&mut self) -> Result<()> {
        for stream in &self.streams {
            if !stream.metadata.is_empty() {
                if let Some(mut target) = self.output.stream_mut(stream.index) {
                    target.set_metadata(metadata_to_dictionary(&stream.metadata));
                }
            }
        }
        if !self.metadata.is_empty() {
            self.output.set_metadata(metadata_to_dictionary(&self.metadata));
        }
        self.output
            .write_header()
            .map_err(ff_error::map(ErrorKind::WriteHeader, "writing header"))?;
        self.header_written = true;
        tracing::debug!(path = %self.path.display(), streams = self.streams.len(), "header written");
        Ok(())
    }

    fn write(&mut self, id: usize, frame: &VideoFrame) -> Result<()> {
        let stream = self.stream(id)?;
        frame.validate()?;
        if (frame.width, frame.height) != (stream.params.width, stream.params.height) {
            return Err(Error::image_size(format!(
                "frame is {}x{}, stream {id} expects {}x{}",
                frame.width, frame.height, stream.params.width, stream.params.height
            )));
        }

        if !self.header_written {
            let header = self.write_header();
            self.latch(header)?;
        }

        let stream = &mut self.streams[id];
        let format = pixel_format_to_ffmpeg(frame.format);
        let reuse = stream.source.as_ref().is_some_and(|source| {
            source.format() == format
                && source.width() == frame.width
                && source.height() == frame.height
        });
        if !reuse {
            stream.source = None;
        }
        let source = stream
            .source
            .get_or_insert_with(|| VideoFrameFFmpeg::new(format, frame.width, frame.height));
        make_writable(source)?;
        copy_into_ffmpeg(frame, source)?;
        stream.frames += 1;

        let encoded = self.encode_cached(id, false);
        self.latch(encoded)
    }

    /**
        Encode the cached source frame of stream `id` with the next pts.

        While flushing, packets beyond the number of received frames are
        dropped.
    */
    fn encode_cached(&mut self, id: usize, flushing: bool) -> Result<()> {
        let Self {
            streams,
            output,
            converter,
            ..
        } = self;
        let stream = &mut streams[id];
        let Some(source) = stream.source.as_mut() else {
            return Ok(());
        };

        let pts = stream.submitted as i64;
        source.set_pts(Some(pts));
        let target = ConvertTarget::new(
            stream.encoder.format(),
            stream.encoder.width(),
            stream.encoder.height(),
        );
        let converted = converter.convert(source, &target)?;
        stream.submitted += 1;
        stream.last_pts = Some(pts);

        if stream.encoder.is_raw() {
            let mut packet = stream.encoder.encode_raw(converted)?;
            stream.mux(&mut packet, output)?;
        } else {
            stream.encoder.send_frame(converted)?;
            let mut packet = Packet::empty();
            while stream.encoder.receive_packet(&mut packet)? {
                if flushing && stream.packets >= stream.frames {
                    continue;
                }
                stream.mux(&mut packet, output)?;
            }
        }
        tracing::trace!(stream = id, pts, packets = stream.packets, "frame encoded");
        Ok(())
    }

    /**
        Replay cached frames until every stream emitted one packet per
        received frame.
    */
    fn flush(&mut self) -> Result<()> {
        for id in 0..self.streams.len() {
            let mut replays = 0;
            while self.streams[id].packets < self.streams[id].frames {
                if replays == MAX_FLUSH_REPLAYS {
                    let stream = &self.streams[id];
                    return Err(Error::new(
                        ErrorKind::EncDecVideo,
                        format!(
                            "stream {id} emitted {} of {} packets after {replays} replays",
                            stream.packets, stream.frames
                        ),
                    ));
                }
                self.encode_cached(id, true)?;
                replays += 1;
            }
            if replays > 0 {
                tracing::debug!(stream = id, replays, "encoder drained");
            }
        }
        Ok(())
    }

    /**
        Flush and write the trailer. Teardown happens when the session is
        dropped.
    */
    fn finish(&mut self) -> Result<()> {
        if !self.header_written {
            return Ok(());
        }
        let flushed = if self.failed {
            tracing::debug!(path = %self.path.display(), "skipping flush after failure");
            Ok(())
        } else {
            let flushed = self.flush();
            self.latch(flushed)
        };

        let trailer = self
            .output
            .write_trailer()
            .map_err(ff_error::map(ErrorKind::WriteTrailer, "writing trailer"));
        let trailer = self.latch(trailer);
        if trailer.is_ok() {
            tracing::debug!(path = %self.path.display(), "trailer written");
        }
        flushed.and(trailer)
    }
}

/**
    Writer for one or more video streams of a container file.

    The container format is guessed from the file name. Streams are added
    before the first frame is written; the header goes out with that first
    frame. [`close`](Self::close) drains the encoders so that every stream
    holds one packet per written frame, then writes the trailer.

    ```ignore
    let mut writer = ContainerWriter::from_path("out.mkv", WriterConfig::default())?;
    let id = writer.add_video_stream(&VideoStreamParams::new(640, 480, 30.0, "gray"))?;
    writer.write(id, &frame)?;
    writer.close()?;
    ```
*/
#[derive(Default)]
pub struct ContainerWriter {
    config: WriterConfig,
    session: Option<Session>,
}

impl ContainerWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /**
        Create a writer and open `path`.
    */
    pub fn from_path<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        let mut writer = Self::new(config);
        writer.open(path)?;
        Ok(writer)
    }

    /**
        Create the output file, closing any container opened before.
    */
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.close()?;
        videoio_runtime::init()?;

        let path = path.as_ref();
        let threads = videoio_runtime::thread_count(self.config.threads);
        self.session = Some(Session::open(path, threads)?);
        tracing::info!(path = %path.display(), threads, "container created");
        Ok(())
    }

    /**
        Finish the container and release everything.

        Closing a writer that never wrote a frame, or closing twice, does
        nothing. Resources are released even when flushing or writing the
        trailer fails; the first failure is returned.
    */
    pub fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let result = session.finish();
        drop(session);
        tracing::debug!("container closed");
        result
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::bad_param("writer is not open"))
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::bad_param("writer is not open"))
    }

    /**
        Set container tags. Fails with `SetMetadata` once the header is
        written.
    */
    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<()> {
        let session = self.session_mut()?;
        if session.header_written {
            return Err(Error::new(
                ErrorKind::SetMetadata,
                "metadata must be set before the first frame",
            ));
        }
        check_metadata(&metadata)?;
        session.metadata = metadata;
        Ok(())
    }

    /**
        Set tags of stream `id`. Same rules as [`set_metadata`](Self::set_metadata).
    */
    pub fn set_stream_metadata(&mut self, id: usize, metadata: Metadata) -> Result<()> {
        let session = self.session_mut()?;
        if session.header_written {
            return Err(Error::new(
                ErrorKind::SetMetadata,
                "metadata must be set before the first frame",
            ));
        }
        session.stream(id)?;
        check_metadata(&metadata)?;
        session.streams[id].metadata = metadata;
        Ok(())
    }

    /**
        Add a video stream and return its id.

        A stream that fails to configure is not added, and the writer is
        marked as failed.
    */
    pub fn add_video_stream(&mut self, params: &VideoStreamParams) -> Result<usize> {
        let session = self.session_mut()?;
        let added = session.add_video_stream(params);
        session.latch(added)
    }

    /**
        Encode one frame into stream `id`.

        The frame must match the stream's width and height. Invalid frames
        are rejected without touching the encoder.
    */
    pub fn write(&mut self, id: usize, frame: &VideoFrame) -> Result<()> {
        self.session_mut()?.write(id, frame)
    }

    pub fn thread_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or_else(|| videoio_runtime::thread_count(self.config.threads), |s| s.threads)
    }

    pub fn nb_streams(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.streams.len())
    }

    pub fn header_written(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.header_written)
    }

    /**
        Returns true once any configuration or encoding step failed.
    */
    pub fn has_failed(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.failed)
    }

    /**
        Parameters stream `id` was created with.
    */
    pub fn stream_params(&self, id: usize) -> Result<&VideoStreamParams> {
        self.session()?.stream(id).map(|s| &s.params)
    }

    /**
        Frames submitted to the encoder of stream `id`, flush replays
        included.
    */
    pub fn frame_number(&self, id: usize) -> Result<u64> {
        self.session()?.stream(id).map(|s| s.submitted)
    }

    pub fn packets_written(&self, id: usize) -> Result<u64> {
        self.session()?.stream(id).map(|s| s.packets)
    }

    /**
        Presentation time in seconds of the last frame submitted to `id`.
    */
    pub fn timestamp(&self, id: usize) -> Result<f64> {
        self.session()?.stream(id).map(OutputStream::timestamp)
    }

    pub fn codec_description(&self, id: usize) -> Result<String> {
        self.session()?.stream(id).map(|s| s.encoder.description())
    }

    pub fn codec_name(&self, id: usize) -> Result<String> {
        self.session()?.stream(id).map(|s| s.encoder.codec_name())
    }

    /**
        AVI tag of the stream's codec, zero if it has none.
    */
    pub fn fourcc(&self, id: usize) -> Result<u32> {
        self.session()?
            .stream(id)
            .map(|s| riff_video_tag(s.encoder.codec_id()).unwrap_or(0))
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "closing writer failed");
        }
    }
}

impl std::fmt::Debug for ContainerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerWriter")
            .field("config", &self.config)
            .field("path", &self.path())
            .field("streams", &self.nb_streams())
            .field("header_written", &self.header_written())
            .field("failed", &self.has_failed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use videoio_types::PixelFormat;

    use super::*;

    #[test]
    fn metadata_keys_are_checked() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), "clip".into());
        assert!(check_metadata(&metadata).is_ok());

        metadata.insert(String::new(), "x".into());
        let err = check_metadata(&metadata).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SetMetadata);
    }

    #[test]
    fn closed_writer_rejects_work() {
        let mut writer = ContainerWriter::new(WriterConfig::default().with_threads(3));
        assert_eq!(writer.thread_count(), 3);
        assert!(writer.close().is_ok());

        let params = VideoStreamParams::new(16, 16, 25.0, "gray");
        let err = writer.add_video_stream(&params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParam);

        let frame = VideoFrame::blank(PixelFormat::Gray8, 16, 16);
        assert_eq!(writer.write(0, &frame).unwrap_err().kind(), ErrorKind::BadParam);
        assert_eq!(writer.frame_number(0).unwrap_err().kind(), ErrorKind::BadParam);
    }

    #[test]
    fn shared_frames_are_detached_before_reuse() {
        let mut source = VideoFrameFFmpeg::new(ffmpeg_next::format::Pixel::GRAY8, 16, 16);
        source.data_mut(0).fill(7);

        // Stands in for an encoder holding on to a sent frame.
        let mut held = VideoFrameFFmpeg::empty();
        unsafe {
            assert!(ffi::av_frame_ref(held.as_mut_ptr(), source.as_ptr()) >= 0);
            assert_eq!(ffi::av_frame_is_writable(source.as_mut_ptr()), 0);
        }

        make_writable(&mut source).unwrap();
        let frame = VideoFrame::blank(PixelFormat::Gray8, 16, 16);
        copy_into_ffmpeg(&frame, &mut source).unwrap();

        assert!(held.data(0)[..16].iter().all(|&b| b == 7));
        assert!(source.data(0)[..16].iter().all(|&b| b == 0));
        unsafe {
            assert_ne!(ffi::av_frame_is_writable(source.as_mut_ptr()), 0);
        }
    }

    #[test]
    fn unknown_extension_cannot_guess_a_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContainerWriter::from_path(dir.path().join("clip.notaformat"), WriterConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GuessFormat);
    }

    #[test]
    fn unwritable_location_fails_to_open() {
        let err = ContainerWriter::from_path("/nonexistent/dir/clip.mkv", WriterConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFile);
    }

    #[test]
    fn raw_frames_bypass_the_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.nut");
        let mut writer = ContainerWriter::from_path(&path, WriterConfig::default()).unwrap();
        let params = VideoStreamParams::new(8, 4, 10.0, "gray").with_codec("rawvideo");
        let id = writer.add_video_stream(&params).unwrap();

        let mut frame = VideoFrame::blank(PixelFormat::Gray8, 8, 4);
        for value in 0..3u8 {
            frame.data.fill(value);
            writer.write(id, &frame).unwrap();
        }
        assert_eq!(writer.packets_written(id).unwrap(), 3);
        assert_eq!(writer.codec_name(id).unwrap(), "rawvideo");
        writer.close().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 96);
    }
}
