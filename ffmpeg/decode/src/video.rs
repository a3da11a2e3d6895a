/*!
    Video decoder implementation.
*/

use ffmpeg_next::{
    Packet,
    codec::{self, decoder::Video as VideoDecoderFFmpeg, threading},
    format::Pixel,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use videoio_runtime::{
    convert::{codec_description, rational_from_ffmpeg},
    error as ff_error,
};
use videoio_types::{ErrorKind, Rational, Result};

/**
    Video decoder for one container stream.

    Packets go in through [`send`](Self::send) and frames come out of
    [`receive`](Self::receive). The caller drains every frame a packet
    produces before sending the next one.
*/
pub struct StreamDecoder {
    decoder: VideoDecoderFFmpeg,
    threads: usize,
    eof_sent: bool,
}

impl StreamDecoder {
    /**
        Open a decoder for the given stream parameters.

        Returns `Ok(None)` when FFmpeg has no decoder for the codec; the
        stream can still be described but not decoded.
    */
    pub fn open(parameters: codec::Parameters, threads: usize) -> Result<Option<Self>> {
        let mut context = codec::context::Context::from_parameters(parameters)
            .map_err(ff_error::map(ErrorKind::OpenCodec, "copying stream parameters"))?;

        let id = context.id();
        let Some(codec) = codec::decoder::find(id) else {
            tracing::warn!(codec = ?id, "no decoder available");
            return Ok(None);
        };

        context.set_threading(threading::Config {
            kind: threading::Type::Frame,
            count: threads,
            ..Default::default()
        });

        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(ff_error::map(ErrorKind::OpenCodec, "opening decoder"))?;

        tracing::debug!(
            codec = ?id,
            width = decoder.width(),
            height = decoder.height(),
            threads,
            "decoder opened"
        );

        Ok(Some(Self {
            decoder,
            threads,
            eof_sent: false,
        }))
    }

    /**
        Feed one compressed packet to the decoder.
    */
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        self.decoder
            .send_packet(packet)
            .map_err(ff_error::map(ErrorKind::EncDecVideo, "decoding packet"))
    }

    /**
        Signal end of input so the decoder releases its delayed frames.

        Only the first call after opening or flushing has any effect.
    */
    pub fn send_eof(&mut self) -> Result<()> {
        if self.eof_sent {
            return Ok(());
        }
        self.eof_sent = true;
        match self.decoder.send_eof() {
            Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(()),
            Err(e) => Err(ff_error::from_ffmpeg(
                ErrorKind::EncDecVideo,
                "draining decoder",
                e,
            )),
        }
    }

    /**
        Receive the next decoded frame into `frame`.

        Returns `false` when the decoder needs more input or is fully
        drained.
    */
    pub fn receive(&mut self, frame: &mut VideoFrameFFmpeg) -> Result<bool> {
        match self.decoder.receive_frame(frame) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) if ff_error::is_again(&e) => Ok(false),
            Err(e) => Err(ff_error::from_ffmpeg(
                ErrorKind::EncDecVideo,
                "receiving frame",
                e,
            )),
        }
    }

    /**
        Discard buffered input and output, e.g. after a seek.
    */
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.eof_sent = false;
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn format(&self) -> Pixel {
        self.decoder.format()
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    pub fn time_base(&self) -> Rational {
        rational_from_ffmpeg(self.decoder.time_base())
    }

    /**
        Rate control and GOP fields of the decoder context, as
        `(bit_rate_tolerance, gop_size, max_b_frames)`.
    */
    pub fn tuning(&self) -> (i32, i32, i32) {
        unsafe {
            let ctx = self.decoder.as_ptr();
            ((*ctx).bit_rate_tolerance, (*ctx).gop_size, (*ctx).max_b_frames)
        }
    }

    /**
        One-line description of the decoder, as printed by FFmpeg tools.
    */
    pub fn description(&self) -> String {
        codec_description(&self.decoder, false)
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("format", &self.decoder.format())
            .field("threads", &self.threads)
            .field("eof_sent", &self.eof_sent)
            .finish_non_exhaustive()
    }
}
