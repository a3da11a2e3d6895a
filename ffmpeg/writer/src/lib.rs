/*!
    Container writing for the video container I/O crates.

    This crate handles the output side. It creates a container file whose
    format follows the file name, adds one encoder per video stream, and
    turns application frames into interleaved packets.

    # Lifecycle

    1. [`ContainerWriter::open`] creates the file
    2. [`ContainerWriter::add_video_stream`] configures each stream
    3. the first [`ContainerWriter::write`] emits the header
    4. [`ContainerWriter::close`] drains the encoders and writes the trailer

    Each stream keeps the last frame it was given. Closing replays that
    frame until the encoder has emitted one packet per frame written, so
    encoders with look-ahead never lose the tail of a recording.
*/

mod writer;

pub use writer::{ContainerWriter, WriterConfig};
