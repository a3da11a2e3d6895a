/*!
    Pixel format and size conversion for the video container I/O crates.

    [`FrameConverter`] normalizes decoded pictures for the reader and
    application frames for the writer. The [`pixel`] module maps between
    crate and FFmpeg pixel layouts and copies frames across that boundary.
*/

mod converter;
pub mod pixel;

pub use converter::{ConvertTarget, FrameConverter};
