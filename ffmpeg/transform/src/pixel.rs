/*!
    Pixel layout mapping and frame copies between crate and FFmpeg frames.
*/

use ffmpeg_next::{ffi, format::Pixel, util::frame::video::Video as VideoFrameFFmpeg};

use videoio_runtime::convert::pixel_bits;
use videoio_types::{Error, PixelFormat, Pts, Rational, Result, VideoFrame};

/**
    Convert our PixelFormat to FFmpeg's Pixel format.
*/
pub fn pixel_format_to_ffmpeg(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Gray16 => Pixel::GRAY16LE,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Bgr48 => Pixel::BGR48LE,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Nv12 => Pixel::NV12,
    }
}

/**
    Convert FFmpeg's Pixel format to our PixelFormat, if it is one of ours.
*/
pub fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::GRAY8 => Some(PixelFormat::Gray8),
        Pixel::GRAY16LE => Some(PixelFormat::Gray16),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::BGR48LE => Some(PixelFormat::Bgr48),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        _ => None,
    }
}

/**
    Whether `format` carries only luma, optionally with alpha.

    Decided from the format descriptor: one component, or two with the alpha
    flag, and neither the RGB nor the palette flag. Covers every gray depth FFmpeg knows, including
    float and bitstream layouts.
*/
pub fn is_gray(format: Pixel) -> bool {
    let Some(desc) = format.descriptor() else {
        return false;
    };
    let flags = unsafe { (*desc.as_ptr()).flags };
    if flags & (ffi::AV_PIX_FMT_FLAG_RGB | ffi::AV_PIX_FMT_FLAG_PAL) as u64 != 0 {
        return false;
    }
    match desc.nb_components() {
        1 => true,
        2 => flags & ffi::AV_PIX_FMT_FLAG_ALPHA as u64 != 0,
        _ => false,
    }
}

/**
    Choose the output layout for a decoded pixel format.

    Gray sources become `Gray8` or `Gray16`, everything else `Bgr24` or
    `Bgr48`, depending on the source bit depth. Returns `None` for formats
    without a known depth.
*/
pub fn promote(gray: bool, bits_per_pixel: u32, components: u8) -> Option<PixelFormat> {
    if bits_per_pixel == 0 || components == 0 {
        return None;
    }

    let format = if gray {
        if bits_per_pixel <= 8 {
            PixelFormat::Gray8
        } else {
            PixelFormat::Gray16
        }
    } else if components <= 3 {
        if bits_per_pixel <= 24 {
            PixelFormat::Bgr24
        } else {
            PixelFormat::Bgr48
        }
    } else if bits_per_pixel <= 32 {
        PixelFormat::Bgr24
    } else {
        PixelFormat::Bgr48
    };
    Some(format)
}

/**
    Output layout for frames decoded in `format`.
*/
pub fn output_format_for(format: Pixel) -> Option<PixelFormat> {
    let components = format.descriptor()?.nb_components();
    promote(is_gray(format), pixel_bits(format), components)
}

/**
    Copy an application frame into an allocated FFmpeg frame of the same
    layout and size, honoring the destination strides.
*/
pub fn copy_into_ffmpeg(src: &VideoFrame, dst: &mut VideoFrameFFmpeg) -> Result<()> {
    src.validate()?;
    if dst.width() != src.width
        || dst.height() != src.height
        || dst.format() != pixel_format_to_ffmpeg(src.format)
    {
        return Err(Error::image_size(format!(
            "cannot copy a {}x{} {} frame into a {}x{} {:?} frame",
            src.width,
            src.height,
            src.format.name(),
            dst.width(),
            dst.height(),
            dst.format()
        )));
    }

    for plane in 0..src.format.plane_count() {
        let (Some(layout), Some(bytes)) = (
            src.format.plane_layout(plane, src.width, src.height),
            src.plane(plane),
        ) else {
            continue;
        };
        let dst_stride = dst.stride(plane);
        let dst_data = dst.data_mut(plane);
        for (row, line) in bytes.chunks_exact(layout.row_bytes).enumerate() {
            let start = row * dst_stride;
            dst_data[start..start + layout.row_bytes].copy_from_slice(line);
        }
    }
    Ok(())
}

/**
    Copy an FFmpeg frame into a tightly packed application frame.
*/
pub fn copy_from_ffmpeg(src: &VideoFrameFFmpeg, time_base: Rational) -> Result<VideoFrame> {
    let mut frame = VideoFrame::blank(PixelFormat::Gray8, 0, 0);
    copy_from_ffmpeg_into(src, time_base, &mut frame)?;
    Ok(frame)
}

/**
    Like [`copy_from_ffmpeg`], but reuses the allocation of `dst`.
*/
pub fn copy_from_ffmpeg_into(
    src: &VideoFrameFFmpeg,
    time_base: Rational,
    dst: &mut VideoFrame,
) -> Result<()> {
    let format = pixel_format_from_ffmpeg(src.format()).ok_or_else(|| {
        Error::image_type(format!("pixel format {:?} has no application layout", src.format()))
    })?;
    let (width, height) = (src.width(), src.height());

    dst.data.clear();
    dst.data.reserve(format.buffer_size(width, height));
    for plane in 0..format.plane_count() {
        let Some(layout) = format.plane_layout(plane, width, height) else {
            continue;
        };
        let stride = src.stride(plane);
        let bytes = src.data(plane);
        for row in 0..layout.rows {
            let start = row * stride;
            dst.data.extend_from_slice(&bytes[start..start + layout.row_bytes]);
        }
    }

    dst.width = width;
    dst.height = height;
    dst.format = format;
    dst.pts = src.pts().map(Pts);
    dst.time_base = time_base;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_mapping_is_bijective() {
        for format in PixelFormat::ALL {
            let ffmpeg = pixel_format_to_ffmpeg(format);
            assert_eq!(pixel_format_from_ffmpeg(ffmpeg), Some(format));
        }
        assert_eq!(pixel_format_from_ffmpeg(Pixel::YUV410P), None);
    }

    #[test]
    fn promotion_table() {
        assert_eq!(promote(true, 8, 1), Some(PixelFormat::Gray8));
        assert_eq!(promote(true, 1, 1), Some(PixelFormat::Gray8));
        assert_eq!(promote(true, 16, 1), Some(PixelFormat::Gray16));
        assert_eq!(promote(true, 16, 2), Some(PixelFormat::Gray16));
        assert_eq!(promote(false, 12, 3), Some(PixelFormat::Bgr24));
        assert_eq!(promote(false, 48, 3), Some(PixelFormat::Bgr48));
        assert_eq!(promote(false, 32, 4), Some(PixelFormat::Bgr24));
        assert_eq!(promote(false, 64, 4), Some(PixelFormat::Bgr48));
        assert_eq!(promote(false, 0, 0), None);
    }

    #[test]
    fn gray_is_read_from_the_descriptor() {
        for format in [
            Pixel::GRAY8,
            Pixel::MONOBLACK,
            Pixel::YA8,
            Pixel::GRAY10LE,
            Pixel::GRAY12LE,
            Pixel::GRAY14LE,
            Pixel::YA16LE,
            Pixel::GRAYF32LE,
        ] {
            assert!(is_gray(format), "{format:?}");
        }
        for format in [Pixel::YUV420P, Pixel::BGR24, Pixel::RGBA, Pixel::PAL8, Pixel::None] {
            assert!(!is_gray(format), "{format:?}");
        }
    }

    #[test]
    fn promotion_from_ffmpeg_formats() {
        assert_eq!(output_format_for(Pixel::GRAY8), Some(PixelFormat::Gray8));
        assert_eq!(output_format_for(Pixel::GRAY16BE), Some(PixelFormat::Gray16));
        assert_eq!(output_format_for(Pixel::GRAY10LE), Some(PixelFormat::Gray16));
        assert_eq!(output_format_for(Pixel::GRAY12LE), Some(PixelFormat::Gray16));
        assert_eq!(output_format_for(Pixel::YA16LE), Some(PixelFormat::Gray16));
        assert_eq!(output_format_for(Pixel::YUV420P), Some(PixelFormat::Bgr24));
        assert_eq!(output_format_for(Pixel::PAL8), Some(PixelFormat::Bgr24));
        assert_eq!(output_format_for(Pixel::None), None);
    }

    #[test]
    fn copies_respect_strides() {
        let mut frame = VideoFrame::blank(PixelFormat::Yuv420p, 6, 4);
        for (i, byte) in frame.data.iter_mut().enumerate() {
            *byte = i as u8;
        }

        let mut ffmpeg = VideoFrameFFmpeg::new(Pixel::YUV420P, 6, 4);
        copy_into_ffmpeg(&frame, &mut ffmpeg).unwrap();
        assert!(ffmpeg.stride(0) >= 6);

        let back = copy_from_ffmpeg(&ffmpeg, Rational::new(1, 25)).unwrap();
        assert_eq!(back.data, frame.data);
        assert_eq!(back.format, PixelFormat::Yuv420p);
    }

    #[test]
    fn copy_into_reuses_the_destination() {
        let mut gray = VideoFrameFFmpeg::new(Pixel::GRAY8, 4, 2);
        gray.data_mut(0).fill(3);
        gray.set_pts(Some(5));

        let mut dst = VideoFrame::blank(PixelFormat::Bgr24, 64, 64);
        let capacity = dst.data.capacity();
        copy_from_ffmpeg_into(&gray, Rational::new(1, 30), &mut dst).unwrap();

        assert_eq!(dst.data, vec![3; 8]);
        assert_eq!(dst.data.capacity(), capacity);
        assert_eq!((dst.width, dst.height, dst.format), (4, 2, PixelFormat::Gray8));
        assert_eq!(dst.pts, Some(Pts(5)));
        assert!(dst.validate().is_ok());
    }

    #[test]
    fn mismatched_copy_is_rejected() {
        let frame = VideoFrame::blank(PixelFormat::Gray8, 4, 4);
        let mut ffmpeg = VideoFrameFFmpeg::new(Pixel::GRAY8, 6, 4);
        let err = copy_into_ffmpeg(&frame, &mut ffmpeg).unwrap_err();
        assert_eq!(err.kind(), videoio_types::ErrorKind::ImageSize);
    }
}
