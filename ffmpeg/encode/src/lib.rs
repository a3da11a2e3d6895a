/*!
    Codec resolution and per-stream video encoding.

    This crate turns raw frames into compressed packets for the writer. It
    decides which encoder and pixel format a stream gets, applies codec
    options, and wraps the opened encoder in a [`StreamEncoder`].

    # Codec Resolution

    A stream names its codec in one of three ways:

    - an empty name selects the container's default video codec
    - a four-character name is tried as an AVI tag, then as an encoder name
    - anything else is an encoder name

    ```ignore
    use videoio_encode::{find_codec, find_pixel_format};

    let codec = find_codec("ffv1", default_id)?;
    let format = find_pixel_format(&codec, "gray16le", false)?;
    ```

    # Pixel Formats

    When an encoder restricts its input formats the requested one must be
    among them, unless the stream asks for the closest supported format.
*/

mod options;
mod resolve;
mod video;

pub use options::apply_options;
pub use resolve::{CodecQuery, find_codec, find_pixel_format, pixel_from_name};
pub use video::StreamEncoder;
