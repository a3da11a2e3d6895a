/*!
    Stream description types.
*/

use std::collections::BTreeMap;

use crate::{Rational, ReadParams, aspect, fourcc};

/**
    Container-level or stream-level key/value tags.
*/
pub type Metadata = BTreeMap<String, String>;

/**
    Classification of a container stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/**
    Snapshot of what is known about one stream of an open container.

    The reader refreshes the geometry, pixel format and sample aspect
    ratio from the decoder once frames are decoded.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct StreamDescriptor {
    /// Stream index, stable for the lifetime of the container.
    pub index: usize,
    pub kind: StreamKind,
    /// Short codec name (e.g., "h264"), empty if unknown.
    pub codec_name: String,
    /// One-line codec summary as FFmpeg prints it.
    pub codec_description: String,
    /// Container codec tag.
    pub fourcc: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Native pixel format name, if known.
    pub pixel_format: Option<String>,
    /// Time base for timestamps.
    pub time_base: Rational,
    /// Nominal frame rate.
    pub frame_rate: Rational,
    /// Average frame rate.
    pub avg_frame_rate: Rational,
    pub sample_aspect_ratio: Rational,
    /// Duration in seconds.
    pub duration: f64,
    /// Reported or estimated number of frames.
    pub frame_count: u64,
    pub bit_rate: i64,
    pub bit_rate_tolerance: i32,
    pub gop_size: i32,
    pub max_b_frames: i32,
    /// A decoder was opened for this stream.
    pub has_decoder: bool,
    /// Stream-level tags.
    pub metadata: Metadata,
}

impl StreamDescriptor {
    pub fn is_video(&self) -> bool {
        self.kind == StreamKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == StreamKind::Audio
    }

    /**
        Returns true if frames can be read from this stream.
    */
    pub fn is_readable(&self) -> bool {
        self.is_video() && self.has_decoder
    }

    /**
        Sample aspect ratio as a float, zero for non-video streams.
    */
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_video() {
            self.sample_aspect_ratio.to_f64()
        } else {
            0.0
        }
    }

    /**
        Returns the frame rate as fps.
    */
    pub fn fps(&self) -> f64 {
        self.frame_rate.to_f64()
    }

    /**
        Width after optional aspect ratio correction.
    */
    pub fn display_width(&self, params: &ReadParams) -> u32 {
        self.display_size(params).0
    }

    /**
        Height after optional aspect ratio correction.
    */
    pub fn display_height(&self, params: &ReadParams) -> u32 {
        self.display_size(params).1
    }

    pub fn display_size(&self, params: &ReadParams) -> (u32, u32) {
        if !self.is_video() {
            return (self.width, self.height);
        }
        aspect::corrected_size(self.width, self.height, self.sample_aspect_ratio, params)
    }

    /**
        Printable form of the container codec tag.
    */
    pub fn fourcc_string(&self) -> String {
        fourcc::fourcc_to_string(self.fourcc)
    }
}

/**
    Estimate a frame count from a duration and a frame rate.
*/
pub fn estimate_frame_count(duration: f64, frame_rate: Rational) -> u64 {
    let frames = (duration * frame_rate.to_f64()).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}
