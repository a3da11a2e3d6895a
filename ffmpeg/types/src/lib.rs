/*!
    Shared types for the video container I/O crates.

    This crate defines the vocabulary that crosses crate boundaries. It has
    no dependency on FFmpeg, so the scheduling, aspect and validation rules
    it holds can be tested without native libraries.

    # Core Types

    - [`Error`], [`ErrorKind`] and [`Result`] - Error taxonomy
    - [`Rational`] and [`Pts`] - Time bases, rates and timestamps
    - [`PixelFormat`] and [`VideoFrame`] - Application-facing frames

    # Reading and Writing

    - [`ReadParams`] and [`Interpolation`] - Per-read options
    - [`VideoStreamParams`] - Writer stream configuration
    - [`StreamDescriptor`] and [`Metadata`] - Stream information
    - [`ReadStatus`], [`Phase`] and [`DrainCursor`] - Read scheduling

    # Capture Boundary

    - [`FrameSource`] and [`TestPattern`] - Frame producers
*/

pub mod aspect;
mod error;
pub mod fourcc;
mod format;
mod frame;
mod params;
mod rational;
mod schedule;
mod source;
mod stream;
mod timestamp;

pub use error::{Error, ErrorKind, Result};
pub use format::{PixelFormat, PlaneLayout};
pub use frame::VideoFrame;
pub use params::{
    DEFAULT_CODEC, Interpolation, MAX_ASPECT_RATIO, ReadParams, VideoStreamParams, parse_options,
};
pub use rational::Rational;
pub use schedule::{DrainCursor, EAGAIN, EOF, Phase, ReadStatus};
pub use source::{FrameSource, TestPattern};
pub use stream::{Metadata, StreamDescriptor, StreamKind, estimate_frame_count};
pub use timestamp::Pts;
