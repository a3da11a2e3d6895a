/*!
    Reader and writer parameters.
*/

use crate::{Error, Result};

/**
    Interpolation used when a frame is resized.

    The numeric values are stable and match the order FFmpeg's software
    scaler lists its algorithms in.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    FastBilinear = 1,
    Bilinear = 2,
    Bicubic = 3,
    /// Experimental scaler.
    X = 4,
    /// Nearest neighbor.
    Point = 5,
    /// Averaging area.
    Area = 6,
    /// Bicubic for luma, bilinear for chroma.
    Bicublin = 7,
    Gauss = 8,
    Sinc = 9,
    #[default]
    Lanczos = 10,
    /// Natural bicubic spline.
    Spline = 11,
}

impl Interpolation {
    /**
        Look up an interpolation by its numeric value.
    */
    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            1 => Self::FastBilinear,
            2 => Self::Bilinear,
            3 => Self::Bicubic,
            4 => Self::X,
            5 => Self::Point,
            6 => Self::Area,
            7 => Self::Bicublin,
            8 => Self::Gauss,
            9 => Self::Sinc,
            10 => Self::Lanczos,
            11 => Self::Spline,
            other => return Err(Error::bad_param(format!("invalid interpolation {other}"))),
        })
    }

    pub const fn code(self) -> i32 {
        self as i32
    }
}

/**
    Per-call parameters for reading frames.

    Never persisted by the reader.
*/
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadParams {
    /// Correct non-square pixels to square ones.
    pub fix_aspect_ratio: bool,
    /**
        Tolerance `t >= 1`. Correction only applies when the raw aspect
        ratio lies within `[1/t, t]`.
    */
    pub aspect_ratio_tol: f64,
    /// Interpolation used for resizing.
    pub interp: Interpolation,
}

impl Default for ReadParams {
    fn default() -> Self {
        Self {
            fix_aspect_ratio: false,
            aspect_ratio_tol: 2.0,
            interp: Interpolation::default(),
        }
    }
}

impl ReadParams {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Enable aspect ratio correction with the given tolerance.
    */
    pub fn with_aspect_fix(mut self, tolerance: f64) -> Self {
        self.fix_aspect_ratio = true;
        self.aspect_ratio_tol = tolerance;
        self
    }

    pub fn with_interp(mut self, interp: Interpolation) -> Self {
        self.interp = interp;
        self
    }

    /**
        Reject a tolerance below one when correction is enabled.
    */
    pub fn validate(&self) -> Result<()> {
        if self.fix_aspect_ratio && !(self.aspect_ratio_tol >= 1.0) {
            return Err(Error::bad_param(format!(
                "aspect ratio tolerance must be at least 1, got {}",
                self.aspect_ratio_tol
            )));
        }
        Ok(())
    }
}

/**
    Largest sample aspect ratio accepted for a new stream.
*/
pub const MAX_ASPECT_RATIO: f64 = 10.0;

/**
    Codec used when a stream does not name one.
*/
pub const DEFAULT_CODEC: &str = "ffv1";

/**
    Configuration for one video stream added to a writer.

    Optional tuning fields left as `None` keep the encoder default.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoStreamParams {
    /**
        Encoder name, four-character container tag, or empty for the
        container's default codec.
    */
    pub codec: String,
    /// Frames per second, must be positive.
    pub frame_rate: f64,
    /// FFmpeg pixel format name used by the encoder.
    pub pixel_format: String,
    /// Negotiate the closest supported pixel format instead of failing.
    pub find_best_pixel_format: bool,
    /// Frame width, positive and even.
    pub width: u32,
    /// Frame height, positive and even.
    pub height: u32,
    /// Sample aspect ratio, at most [`MAX_ASPECT_RATIO`].
    pub aspect_ratio: Option<f64>,
    pub bit_rate: Option<i64>,
    pub bit_rate_tolerance: Option<i32>,
    pub gop_size: Option<u32>,
    pub max_b_frames: Option<u32>,
    /// Codec options as `key=value` pairs joined with `:`.
    pub options: String,
}

impl VideoStreamParams {
    /**
        Create stream parameters with the mandatory fields and the default codec.
    */
    pub fn new(width: u32, height: u32, frame_rate: f64, pixel_format: impl Into<String>) -> Self {
        Self {
            codec: DEFAULT_CODEC.to_string(),
            frame_rate,
            pixel_format: pixel_format.into(),
            find_best_pixel_format: false,
            width,
            height,
            aspect_ratio: None,
            bit_rate: None,
            bit_rate_tolerance: None,
            gop_size: None,
            max_b_frames: None,
            options: String::new(),
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn with_best_pixel_format(mut self, enabled: bool) -> Self {
        self.find_best_pixel_format = enabled;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f64) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: i64) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_bit_rate_tolerance(mut self, tolerance: i32) -> Self {
        self.bit_rate_tolerance = Some(tolerance);
        self
    }

    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = Some(gop_size);
        self
    }

    pub fn with_max_b_frames(mut self, max_b_frames: u32) -> Self {
        self.max_b_frames = Some(max_b_frames);
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    /**
        Check frame rate, geometry and aspect ratio, in that order.
    */
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate > 0.0) {
            return Err(Error::bad_param(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(Error::image_size(format!(
                "stream size must be positive and even, got {}x{}",
                self.width, self.height
            )));
        }
        if let Some(aspect) = self.aspect_ratio {
            if aspect > MAX_ASPECT_RATIO {
                return Err(Error::bad_param(format!(
                    "aspect ratio must not exceed {MAX_ASPECT_RATIO}, got {aspect}"
                )));
            }
        }
        Ok(())
    }
}

/**
    Split a codec option string into `(key, value)` pairs.

    Pairs are separated by `:` and keys from values by `=`. Empty segments
    are skipped.
*/
pub fn parse_options(options: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for segment in options.split(':') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            Error::new(
                crate::ErrorKind::SetOptions,
                format!("option '{segment}' is missing '='"),
            )
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::new(
                crate::ErrorKind::SetOptions,
                format!("option '{segment}' has an empty key"),
            ));
        }
        pairs.push((key.to_string(), value.trim().to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn read_params_defaults() {
        let params = ReadParams::default();
        assert!(!params.fix_aspect_ratio);
        assert_eq!(params.aspect_ratio_tol, 2.0);
        assert_eq!(params.interp, Interpolation::Lanczos);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn read_params_rejects_small_tolerance() {
        let params = ReadParams::new().with_aspect_fix(0.5);
        assert_eq!(params.validate().unwrap_err().kind(), ErrorKind::BadParam);

        // Without correction the tolerance is irrelevant.
        let params = ReadParams {
            aspect_ratio_tol: 0.5,
            ..ReadParams::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn interpolation_codes() {
        assert_eq!(Interpolation::from_code(10).unwrap(), Interpolation::Lanczos);
        assert_eq!(Interpolation::Spline.code(), 11);
        assert_eq!(
            Interpolation::from_code(0).unwrap_err().kind(),
            ErrorKind::BadParam
        );
    }

    #[test]
    fn stream_params_validation_order() {
        let bad_rate = VideoStreamParams::new(641, 480, 0.0, "yuv420p");
        assert_eq!(bad_rate.validate().unwrap_err().kind(), ErrorKind::BadParam);

        let odd = VideoStreamParams::new(641, 480, 30.0, "yuv420p");
        assert_eq!(odd.validate().unwrap_err().kind(), ErrorKind::ImageSize);

        let zero = VideoStreamParams::new(0, 480, 30.0, "yuv420p");
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::ImageSize);

        let wide = VideoStreamParams::new(640, 480, 30.0, "yuv420p").with_aspect_ratio(10.5);
        assert_eq!(wide.validate().unwrap_err().kind(), ErrorKind::BadParam);

        let ok = VideoStreamParams::new(640, 480, 30.0, "yuv420p").with_aspect_ratio(10.0);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.codec, DEFAULT_CODEC);
    }

    #[test]
    fn option_strings() {
        let pairs = parse_options("preset=fast:crf=23").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("preset".to_string(), "fast".to_string()),
                ("crf".to_string(), "23".to_string())
            ]
        );
        assert!(parse_options("").unwrap().is_empty());
        assert_eq!(
            parse_options("preset").unwrap_err().kind(),
            ErrorKind::SetOptions
        );
        assert_eq!(
            parse_options("=3").unwrap_err().kind(),
            ErrorKind::SetOptions
        );
    }
}
