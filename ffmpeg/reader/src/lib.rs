/*!
    Container reading for the video container I/O crates.

    This crate handles the input side. It opens a container file, opens a
    decoder for every video stream it can, and hands out decoded frames one
    at a time from whichever stream produces one next. Frames arrive in a
    packed application layout, optionally resized to square pixels.

    # Scheduling

    Reading alternates between feeding packets to decoders and draining the
    frames they buffered. See [`videoio_types::DrainCursor`] for the drain
    rotation.

    # Example

    ```ignore
    use videoio_reader::{ContainerReader, ReaderConfig};
    use videoio_types::{ReadParams, ReadStatus};

    let mut reader = ContainerReader::from_path("clip.mkv", ReaderConfig::default())?;
    let params = ReadParams::default().with_aspect_fix(2.0);
    while let ReadStatus::Frame(stream) = reader.read(&[], &params)? {
        let frame = reader.frame().unwrap();
        println!("{stream}: {:.3}s", reader.timestamp(stream)?);
    }
    ```
*/

mod probe;
mod reader;

pub use reader::{ContainerReader, ReaderConfig};
