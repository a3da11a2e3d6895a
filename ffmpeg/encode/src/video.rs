/*!
    Video encoder implementation.
*/

use ffmpeg_next::{
    Codec, Packet,
    codec::{self, encoder::Video as VideoEncoderFFmpeg},
    ffi,
    format::Pixel,
    packet,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use videoio_runtime::{
    convert::{
        codec_description, codec_name, rational_from_f64, rational_from_ffmpeg,
        rational_to_ffmpeg,
    },
    error as ff_error,
};
use videoio_types::{Error, ErrorKind, Rational, Result, VideoStreamParams};

use crate::options::apply_options;

/**
    Largest denominator used when approximating a frame rate.
*/
const FRAME_RATE_PRECISION: i32 = 100_000;

/**
    Largest term used when approximating a sample aspect ratio.
*/
const ASPECT_PRECISION: i32 = 255;

/**
    Codecs whose chroma motion vectors can overflow unless macroblocks are
    chosen by rate-distortion.
*/
fn needs_rd_mb_decision(id: codec::Id) -> bool {
    matches!(id, codec::Id::MPEG1VIDEO | codec::Id::MSMPEG4V3)
}

/**
    Video encoder for one output stream.
*/
pub struct StreamEncoder {
    encoder: VideoEncoderFFmpeg,
    codec_id: codec::Id,
    threads: usize,
}

impl StreamEncoder {
    /**
        Configure and open an encoder.

        `format` is the already resolved input pixel format. With
        `global_header` the codec puts its headers in the stream
        parameters instead of every key frame.
    */
    pub fn open(
        codec: Codec,
        params: &VideoStreamParams,
        format: Pixel,
        threads: usize,
        global_header: bool,
    ) -> Result<Self> {
        params.validate()?;
        let codec_id = codec.id();

        let frame_rate = rational_from_f64(params.frame_rate, FRAME_RATE_PRECISION);
        if !frame_rate.is_valid() || frame_rate.num <= 0 {
            return Err(Error::bad_param(format!(
                "frame rate {} cannot be represented",
                params.frame_rate
            )));
        }

        let mut encoder = codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(ff_error::map(ErrorKind::OpenCodec, "creating encoder"))?;

        encoder.set_width(params.width);
        encoder.set_height(params.height);
        encoder.set_format(format);
        encoder.set_frame_rate(Some(rational_to_ffmpeg(frame_rate)));
        encoder.set_time_base(rational_to_ffmpeg(frame_rate.invert()));

        if let Some(aspect) = params.aspect_ratio.filter(|a| *a >= 0.0) {
            encoder.set_aspect_ratio(rational_to_ffmpeg(rational_from_f64(
                aspect,
                ASPECT_PRECISION,
            )));
        }
        if let Some(bit_rate) = params.bit_rate.filter(|b| *b >= 0) {
            encoder.set_bit_rate(bit_rate as usize);
        }
        if let Some(gop) = params.gop_size {
            encoder.set_gop(gop);
        }
        if let Some(max_b_frames) = params.max_b_frames {
            encoder.set_max_b_frames(max_b_frames as usize);
        }
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        unsafe {
            let ctx = encoder.as_mut_ptr();
            if let Some(tolerance) = params.bit_rate_tolerance.filter(|t| *t >= 0) {
                (*ctx).bit_rate_tolerance = tolerance;
            }
            (*ctx).thread_count = i32::try_from(threads).unwrap_or(i32::MAX);
            if needs_rd_mb_decision(codec_id) {
                (*ctx).mb_decision = ffi::FF_MB_DECISION_RD as libc::c_int;
            }
        }

        apply_options(&mut encoder, &params.options)?;

        let encoder = encoder
            .open_as(codec)
            .map_err(ff_error::map(ErrorKind::OpenCodec, "opening encoder"))?;

        tracing::debug!(
            codec = ?codec_id,
            ?format,
            width = params.width,
            height = params.height,
            %frame_rate,
            threads,
            "encoder opened"
        );

        Ok(Self {
            encoder,
            codec_id,
            threads,
        })
    }

    /**
        Submit one frame. The frame's pts is in [`time_base`](Self::time_base).
    */
    pub fn send_frame(&mut self, frame: &VideoFrameFFmpeg) -> Result<()> {
        self.encoder
            .send_frame(frame)
            .map_err(ff_error::map(ErrorKind::EncDecVideo, "encoding frame"))
    }

    /**
        Receive the next compressed packet, if the encoder has one ready.
    */
    pub fn receive_packet(&mut self, packet: &mut Packet) -> Result<bool> {
        match self.encoder.receive_packet(packet) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) if ff_error::is_again(&e) => Ok(false),
            Err(e) => Err(ff_error::from_ffmpeg(
                ErrorKind::EncDecVideo,
                "receiving packet",
                e,
            )),
        }
    }

    /**
        Pack an uncompressed picture into a key frame packet, bypassing
        the encoder.
    */
    pub fn encode_raw(&self, frame: &VideoFrameFFmpeg) -> Result<Packet> {
        let (width, height) = (frame.width() as libc::c_int, frame.height() as libc::c_int);
        let format: ffi::AVPixelFormat = frame.format().into();
        let size = ff_error::check(
            unsafe { ffi::av_image_get_buffer_size(format, width, height, 1) },
            ErrorKind::EncDecVideo,
            "computing picture size",
        )?;

        let mut packet = Packet::new(size as usize);
        let data = packet
            .data_mut()
            .ok_or_else(|| Error::out_of_memory(format!("packet of {size} bytes")))?;
        unsafe {
            let src = frame.as_ptr();
            ff_error::check(
                ffi::av_image_copy_to_buffer(
                    data.as_mut_ptr(),
                    size,
                    (*src).data.as_ptr() as *const *const u8,
                    (*src).linesize.as_ptr(),
                    format,
                    width,
                    height,
                    1,
                ),
                ErrorKind::EncDecVideo,
                "copying raw picture",
            )?;
        }
        packet.set_pts(frame.pts());
        packet.set_dts(frame.pts());
        packet.set_duration(1);
        packet.set_flags(packet::Flags::KEY);
        Ok(packet)
    }

    /**
        Stream parameters describing the opened encoder.
    */
    pub fn parameters(&self) -> codec::Parameters {
        codec::Parameters::from(&self.encoder)
    }

    /**
        Whether frames skip the encoder and are written as raw pictures.
    */
    pub fn is_raw(&self) -> bool {
        self.codec_id == codec::Id::RAWVIDEO
    }

    pub fn codec_id(&self) -> codec::Id {
        self.codec_id
    }

    pub fn codec_name(&self) -> String {
        codec_name(self.codec_id)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn format(&self) -> Pixel {
        self.encoder.format()
    }

    pub fn width(&self) -> u32 {
        self.encoder.width()
    }

    pub fn height(&self) -> u32 {
        self.encoder.height()
    }

    /**
        Encoder time base, one tick per frame.
    */
    pub fn time_base(&self) -> ffmpeg_next::Rational {
        ffmpeg_next::Rational::from(unsafe { (*self.encoder.as_ptr()).time_base })
    }

    pub fn frame_rate(&self) -> Rational {
        rational_from_ffmpeg(self.time_base()).invert()
    }

    /**
        One-line description of the encoder, as printed by FFmpeg tools.
    */
    pub fn description(&self) -> String {
        codec_description(&self.encoder, true)
    }
}

impl std::fmt::Debug for StreamEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEncoder")
            .field("codec_id", &self.codec_id)
            .field("format", &self.encoder.format())
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}
