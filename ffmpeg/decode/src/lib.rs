/*!
    Per-stream video decoding for the video container I/O crates.

    This crate turns demuxed packets into raw FFmpeg frames, one
    [`StreamDecoder`] per container stream. Scheduling across streams and
    conversion of the decoded pictures are left to the reader.
*/

mod video;

pub use video::StreamDecoder;
