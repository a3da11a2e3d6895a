/*!
    Encoder and pixel format selection.
*/

use std::ffi::CString;

use ffmpeg_next::{
    Codec,
    codec::{self, encoder},
    ffi,
    format::Pixel,
};

use videoio_runtime::convert::codec_from_riff_tag;
use videoio_types::{Error, ErrorKind, Result, fourcc::fourcc_from_str};

/**
    How a codec name from the stream parameters is interpreted.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecQuery<'a> {
    /// Use the container format's default video codec.
    FormatDefault,
    /// Four characters: try the AVI tag first, then the encoder name.
    Tag { tag: u32, name: &'a str },
    /// Encoder name.
    Name(&'a str),
}

impl<'a> CodecQuery<'a> {
    pub fn classify(name: &'a str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            return Self::FormatDefault;
        }
        match fourcc_from_str(name) {
            Some(tag) => Self::Tag { tag, name },
            None => Self::Name(name),
        }
    }
}

/**
    Find a video encoder for `name`.

    `format_default` is the container's default video codec, used when
    the name is empty.
*/
pub fn find_codec(name: &str, format_default: codec::Id) -> Result<Codec> {
    let query = CodecQuery::classify(name);
    let codec = match query {
        CodecQuery::FormatDefault => {
            if format_default == codec::Id::None {
                None
            } else {
                encoder::find(format_default)
            }
        }
        CodecQuery::Tag { tag, name } => codec_from_riff_tag(tag)
            .and_then(encoder::find)
            .or_else(|| encoder::find_by_name(name)),
        CodecQuery::Name(name) => encoder::find_by_name(name),
    };

    let codec = codec.ok_or_else(|| {
        Error::new(ErrorKind::FindCodec, format!("no encoder found for {query:?}"))
    })?;
    if !codec.is_video() {
        return Err(Error::new(
            ErrorKind::FindCodec,
            format!("encoder {} is not a video encoder", codec.name()),
        ));
    }
    tracing::debug!(?query, codec = codec.name(), "encoder resolved");
    Ok(codec)
}

/**
    Look up a pixel format by its FFmpeg name.
*/
pub fn pixel_from_name(name: &str) -> Option<Pixel> {
    let c_name = CString::new(name).ok()?;
    let format = Pixel::from(unsafe { ffi::av_get_pix_fmt(c_name.as_ptr()) });
    (format != Pixel::None).then_some(format)
}

/**
    Choose the encoder input format for a requested pixel format name.

    With `find_best` the closest format the encoder supports is chosen
    when the requested one is not supported.
*/
pub fn find_pixel_format(codec: &Codec, requested: &str, find_best: bool) -> Result<Pixel> {
    let wanted = pixel_from_name(requested).ok_or_else(|| {
        Error::new(
            ErrorKind::FindPixFmt,
            format!("unknown pixel format '{requested}'"),
        )
    })?;

    let supported: Option<Vec<Pixel>> = codec
        .video()
        .ok()
        .and_then(|video| video.formats())
        .map(|formats| formats.collect());

    choose_pixel_format(supported.as_deref(), wanted, find_best, |list| {
        best_of_list(list, wanted)
    })
    .map_err(|e| Error::new(e.kind(), format!("{} ({})", e.message(), codec.name())))
}

fn choose_pixel_format<F>(
    supported: Option<&[Pixel]>,
    wanted: Pixel,
    find_best: bool,
    best: F,
) -> Result<Pixel>
where
    F: FnOnce(&[Pixel]) -> Pixel,
{
    let Some(list) = supported.filter(|list| !list.is_empty()) else {
        return Ok(wanted);
    };
    if list.contains(&wanted) {
        return Ok(wanted);
    }
    if find_best {
        let chosen = best(list);
        if chosen != Pixel::None {
            tracing::debug!(?wanted, ?chosen, "pixel format negotiated");
            return Ok(chosen);
        }
    }
    Err(Error::new(
        ErrorKind::FindPixFmt,
        format!("pixel format {wanted:?} is not supported"),
    ))
}

fn best_of_list(list: &[Pixel], wanted: Pixel) -> Pixel {
    let mut raw: Vec<ffi::AVPixelFormat> = list.iter().map(|&p| p.into()).collect();
    raw.push(ffi::AVPixelFormat::AV_PIX_FMT_NONE);
    let has_alpha = wanted
        .descriptor()
        .map(|d| {
            let flags = unsafe { (*d.as_ptr()).flags };
            flags & ffi::AV_PIX_FMT_FLAG_ALPHA as u64 != 0
        })
        .unwrap_or(false);
    let mut loss = 0;
    Pixel::from(unsafe {
        ffi::avcodec_find_best_pix_fmt_of_list(
            raw.as_ptr(),
            wanted.into(),
            has_alpha as libc::c_int,
            &mut loss,
        )
    })
}
