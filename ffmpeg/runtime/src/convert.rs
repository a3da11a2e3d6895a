/*!
    Conversion utilities between ffmpeg-next values and crate types.
*/

use std::ffi::CStr;

use ffmpeg_next::{codec, ffi, format::Pixel};

use videoio_types::{Metadata, Rational};

/**
    Convert ffmpeg_next::Rational to our Rational.
*/
pub fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

/**
    Convert our Rational to ffmpeg_next::Rational.
*/
pub fn rational_to_ffmpeg(r: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational::new(r.num, r.den)
}

/**
    Closest rational to `value` with terms no larger than `max`.
*/
pub fn rational_from_f64(value: f64, max: i32) -> Rational {
    let r = unsafe { ffi::av_d2q(value, max) };
    Rational::new(r.num, r.den)
}

/**
    FFmpeg name of a pixel format, or `None` for `Pixel::None`.
*/
pub fn pixel_name(format: Pixel) -> Option<&'static str> {
    if format == Pixel::None {
        return None;
    }
    format.descriptor().map(|d| d.name())
}

/**
    Bits per pixel of a pixel format, averaged over planes.
*/
pub fn pixel_bits(format: Pixel) -> u32 {
    match format.descriptor() {
        Some(desc) => unsafe { ffi::av_get_bits_per_pixel(desc.as_ptr()) }.max(0) as u32,
        None => 0,
    }
}

/**
    Short name of a codec id (e.g., "h264"), empty if unknown.
*/
pub fn codec_name(id: codec::Id) -> String {
    unsafe {
        let desc = ffi::avcodec_descriptor_get(id.into());
        if desc.is_null() || (*desc).name.is_null() {
            return String::new();
        }
        CStr::from_ptr((*desc).name).to_string_lossy().into_owned()
    }
}

/**
    One-line summary of a codec context, as printed by FFmpeg tools.
*/
pub fn codec_description(context: &codec::Context, encode: bool) -> String {
    let mut buf = [0 as libc::c_char; 256];
    unsafe {
        ffi::avcodec_string(
            buf.as_mut_ptr(),
            buf.len() as libc::c_int,
            context.as_ptr() as *mut ffi::AVCodecContext,
            encode as libc::c_int,
        );
        CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
    }
}

/**
    AVI (RIFF) video tag registered for a codec, if any.
*/
pub fn riff_video_tag(id: codec::Id) -> Option<u32> {
    let tags = [unsafe { ffi::avformat_get_riff_video_tags() }, std::ptr::null()];
    let tag = unsafe { ffi::av_codec_get_tag(tags.as_ptr(), id.into()) };
    (tag != 0).then_some(tag)
}

/**
    Codec id registered for an AVI (RIFF) video tag, if any.
*/
pub fn codec_from_riff_tag(tag: u32) -> Option<codec::Id> {
    let tags = [unsafe { ffi::avformat_get_riff_video_tags() }, std::ptr::null()];
    let id: codec::Id = unsafe { ffi::av_codec_get_id(tags.as_ptr(), tag) }.into();
    (id != codec::Id::None).then_some(id)
}

/**
    Copy FFmpeg dictionary entries into a [`Metadata`] map.
*/
pub fn metadata_from_dictionary(dictionary: ffmpeg_next::DictionaryRef<'_>) -> Metadata {
    dictionary
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/**
    Build an FFmpeg dictionary from a [`Metadata`] map.
*/
pub fn metadata_to_dictionary(metadata: &Metadata) -> ffmpeg_next::Dictionary<'static> {
    let mut dictionary = ffmpeg_next::Dictionary::new();
    for (key, value) in metadata {
        dictionary.set(key, value);
    }
    dictionary
}
