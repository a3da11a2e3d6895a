/*!
    Pixel format and size conversion with reusable buffers.
*/

use ffmpeg_next::{
    ffi,
    format::Pixel,
    software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags},
    util::frame::video::Video as VideoFrameFFmpeg,
};

use videoio_runtime::error as ff_error;
use videoio_types::{Error, ErrorKind, Interpolation, Result};

/**
    Target layout and geometry of a conversion.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertTarget {
    pub format: Pixel,
    pub width: u32,
    pub height: u32,
    pub interp: Interpolation,
}

impl ConvertTarget {
    pub fn new(format: Pixel, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            interp: Interpolation::default(),
        }
    }

    pub fn with_interp(mut self, interp: Interpolation) -> Self {
        self.interp = interp;
        self
    }

    fn matches(&self, frame: &VideoFrameFFmpeg) -> bool {
        frame.format() == self.format && frame.width() == self.width && frame.height() == self.height
    }
}

fn scaler_flags(interp: Interpolation) -> ScalerFlags {
    let algorithm = match interp {
        Interpolation::FastBilinear => ScalerFlags::FAST_BILINEAR,
        Interpolation::Bilinear => ScalerFlags::BILINEAR,
        Interpolation::Bicubic => ScalerFlags::BICUBIC,
        Interpolation::X => ScalerFlags::X,
        Interpolation::Point => ScalerFlags::POINT,
        Interpolation::Area => ScalerFlags::AREA,
        Interpolation::Bicublin => ScalerFlags::BICUBLIN,
        Interpolation::Gauss => ScalerFlags::GAUSS,
        Interpolation::Sinc => ScalerFlags::SINC,
        Interpolation::Lanczos => ScalerFlags::LANCZOS,
        Interpolation::Spline => ScalerFlags::SPLINE,
    };
    algorithm | ScalerFlags::ACCURATE_RND
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScalerKey {
    src_format: Pixel,
    src_width: u32,
    src_height: u32,
    dst_format: Pixel,
    dst_width: u32,
    dst_height: u32,
    flags: libc::c_int,
}

struct ScalerState {
    context: ScalerContext,
    key: ScalerKey,
}

/**
    Converts FFmpeg frames to a target pixel format and size.

    The destination planes live in a buffer owned by the converter that
    only ever grows, and the scaler context is kept until the shape of
    the conversion changes. A frame returned by [`convert`](Self::convert)
    stays valid until the next call.
*/
pub struct FrameConverter {
    buffer: Vec<u8>,
    output: VideoFrameFFmpeg,
    scaler: Option<ScalerState>,
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConverter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            output: VideoFrameFFmpeg::empty(),
            scaler: None,
        }
    }

    /**
        Convert `src` to `target`.

        Returns `src` itself when it already has the target layout and
        size. Otherwise the result borrows the converter's buffer.
    */
    pub fn convert<'a>(
        &'a mut self,
        src: &'a VideoFrameFFmpeg,
        target: &ConvertTarget,
    ) -> Result<&'a VideoFrameFFmpeg> {
        validate(src, target)?;

        if target.matches(src) {
            return Ok(src);
        }

        self.prepare_output(target)?;

        let key = ScalerKey {
            src_format: src.format(),
            src_width: src.width(),
            src_height: src.height(),
            dst_format: target.format,
            dst_width: target.width,
            dst_height: target.height,
            flags: scaler_flags(target.interp).bits(),
        };
        let state = match self.scaler.take() {
            Some(state) if state.key == key => state,
            _ => {
                tracing::trace!(?key, "creating scaler");
                let context = ScalerContext::get(
                    key.src_format,
                    key.src_width,
                    key.src_height,
                    key.dst_format,
                    key.dst_width,
                    key.dst_height,
                    ScalerFlags::from_bits_truncate(key.flags),
                )
                .map_err(ff_error::map(ErrorKind::ConvertImage, "creating scaler"))?;
                ScalerState { context, key }
            }
        };
        let state = self.scaler.insert(state);

        state
            .context
            .run(src, &mut self.output)
            .map_err(ff_error::map(ErrorKind::ConvertImage, "converting frame"))?;
        self.output.set_pts(src.pts());

        Ok(&self.output)
    }

    /**
        Size in bytes of the destination buffer.
    */
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /**
        Size the buffer for `target` and point the output planes into it.
    */
    fn prepare_output(&mut self, target: &ConvertTarget) -> Result<()> {
        let (width, height) = dimensions(target.width, target.height)?;
        let required = ff_error::check(
            unsafe { ffi::av_image_get_buffer_size(target.format.into(), width, height, 1) },
            ErrorKind::ConvertImage,
            "computing destination size",
        )? as usize;

        if self.buffer.len() < required {
            let additional = required - self.buffer.len();
            self.buffer.try_reserve_exact(additional).map_err(|e| {
                Error::out_of_memory(format!("destination buffer of {required} bytes: {e}"))
            })?;
            self.buffer.resize(required, 0);
        }

        self.output.set_format(target.format);
        self.output.set_width(target.width);
        self.output.set_height(target.height);
        unsafe {
            let frame = self.output.as_mut_ptr();
            ff_error::check(
                ffi::av_image_fill_arrays(
                    (*frame).data.as_mut_ptr(),
                    (*frame).linesize.as_mut_ptr(),
                    self.buffer.as_ptr(),
                    target.format.into(),
                    width,
                    height,
                    1,
                ),
                ErrorKind::ConvertImage,
                "mapping destination planes",
            )?;
        }
        Ok(())
    }
}

fn dimensions(width: u32, height: u32) -> Result<(i32, i32)> {
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(Error::convert_image(format!(
            "{width}x{height} exceeds the supported size"
        ))),
    }
}

fn validate(src: &VideoFrameFFmpeg, target: &ConvertTarget) -> Result<()> {
    if src.format() == Pixel::None {
        return Err(Error::convert_image("source frame has no pixel format"));
    }
    let (width, height) = (src.width(), src.height());
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(Error::convert_image(format!(
            "source size must be positive and even, got {width}x{height}"
        )));
    }
    if target.format == Pixel::None {
        return Err(Error::convert_image("no destination pixel format"));
    }
    if target.width == 0 || target.height == 0 {
        return Err(Error::convert_image(format!(
            "destination size must be positive, got {}x{}",
            target.width, target.height
        )));
    }
    Ok(())
}

impl std::fmt::Debug for FrameConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConverter")
            .field("buffer_len", &self.buffer.len())
            .field("scaler", &self.scaler.as_ref().map(|s| s.key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(format: Pixel, width: u32, height: u32, value: u8) -> VideoFrameFFmpeg {
        let mut frame = VideoFrameFFmpeg::new(format, width, height);
        for plane in 0..frame.planes() {
            frame.data_mut(plane).fill(value);
        }
        frame
    }

    #[test]
    fn identity_returns_the_source() {
        let mut converter = FrameConverter::new();
        let src = filled(Pixel::BGR24, 8, 6, 9);
        let target = ConvertTarget::new(Pixel::BGR24, 8, 6);

        let out = converter.convert(&src, &target).unwrap();
        assert!(std::ptr::eq(out, &src));
        assert_eq!(converter.buffer_len(), 0);
    }

    #[test]
    fn converts_layout_and_size() {
        let mut converter = FrameConverter::new();
        let mut src = filled(Pixel::BGR24, 16, 8, 200);
        src.set_pts(Some(42));
        let target = ConvertTarget::new(Pixel::GRAY8, 8, 4).with_interp(Interpolation::Area);

        let out = converter.convert(&src, &target).unwrap();
        assert_eq!(out.format(), Pixel::GRAY8);
        assert_eq!((out.width(), out.height()), (8, 4));
        assert_eq!(out.pts(), Some(42));

        let first = out.data(0)[0];
        for row in 0..4 {
            let start = row * out.stride(0);
            assert!(out.data(0)[start..start + 8].iter().all(|&v| v == first));
        }
        assert_eq!(converter.buffer_len(), 32);
    }

    #[test]
    fn buffer_never_shrinks() {
        let mut converter = FrameConverter::new();
        let src = filled(Pixel::GRAY8, 32, 32, 1);

        converter
            .convert(&src, &ConvertTarget::new(Pixel::BGR24, 64, 64))
            .unwrap();
        let grown = converter.buffer_len();
        assert_eq!(grown, 64 * 64 * 3);

        let out = converter
            .convert(&src, &ConvertTarget::new(Pixel::BGR24, 16, 16))
            .unwrap();
        assert_eq!((out.width(), out.height()), (16, 16));
        assert_eq!(converter.buffer_len(), grown);
    }

    #[test]
    fn scaler_is_rebuilt_when_the_shape_changes() {
        let mut converter = FrameConverter::new();
        let src = filled(Pixel::YUV420P, 16, 16, 128);
        let target = ConvertTarget::new(Pixel::BGR24, 16, 16);

        converter.convert(&src, &target).unwrap();
        let first = converter.scaler.as_ref().map(|s| s.key);
        converter.convert(&src, &target).unwrap();
        assert_eq!(converter.scaler.as_ref().map(|s| s.key), first);

        let point = target.with_interp(Interpolation::Point);
        converter.convert(&src, &point).unwrap();
        let rebuilt = converter.scaler.as_ref().map(|s| s.key.flags);
        assert_eq!(
            rebuilt,
            Some((ScalerFlags::POINT | ScalerFlags::ACCURATE_RND).bits())
        );
    }

    #[test]
    fn rejects_invalid_geometry() {
        let mut converter = FrameConverter::new();

        let odd = filled(Pixel::GRAY8, 7, 6, 0);
        let err = converter
            .convert(&odd, &ConvertTarget::new(Pixel::GRAY8, 8, 6))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConvertImage);

        let src = filled(Pixel::GRAY8, 8, 6, 0);
        let err = converter
            .convert(&src, &ConvertTarget::new(Pixel::GRAY8, 0, 6))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConvertImage);

        let err = converter
            .convert(&src, &ConvertTarget::new(Pixel::None, 8, 6))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConvertImage);
    }

    #[test]
    fn odd_destination_is_allowed() {
        let mut converter = FrameConverter::new();
        let src = filled(Pixel::GRAY8, 8, 6, 50);
        let out = converter
            .convert(&src, &ConvertTarget::new(Pixel::GRAY8, 5, 3))
            .unwrap();
        assert_eq!((out.width(), out.height()), (5, 3));
    }
}
