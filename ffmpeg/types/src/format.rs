/*!
    Pixel format types.
*/

use std::str::FromStr;

use crate::{Error, Result};

/**
    Application-facing pixel layouts.

    Frames handed to the writer and frames produced by the reader use one of
    these layouts. Encoders may use any layout FFmpeg knows about; the
    conversion between the two happens inside the I/O crates.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Single channel, 8 bits per pixel
    Gray8,
    /// Single channel, 16 bits per pixel, little-endian
    Gray16,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Packed BGR, 48bpp, little-endian (high bit depth color)
    Bgr48,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Planar YUV 4:2:0, 12bpp
    Yuv420p,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Semi-planar YUV 4:2:0, 12bpp
    Nv12,
}

/**
    Byte geometry of one plane of a tightly packed frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Bytes in one row, without padding.
    pub row_bytes: usize,
    /// Number of rows.
    pub rows: usize,
}

impl PlaneLayout {
    pub const fn size(self) -> usize {
        self.row_bytes * self.rows
    }
}

impl PixelFormat {
    /**
        All application-facing layouts.
    */
    pub const ALL: [PixelFormat; 11] = [
        Self::Gray8,
        Self::Gray16,
        Self::Bgr24,
        Self::Bgr48,
        Self::Rgb24,
        Self::Bgra,
        Self::Rgba,
        Self::Yuv420p,
        Self::Yuv422p,
        Self::Yuv444p,
        Self::Nv12,
    ];

    /**
        Returns the number of bits per pixel for this format.

        For planar formats, this is the average bits per pixel.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Gray8 => 8,
            Self::Yuv420p | Self::Nv12 => 12,
            Self::Gray16 | Self::Yuv422p => 16,
            Self::Rgb24 | Self::Bgr24 | Self::Yuv444p => 24,
            Self::Bgra | Self::Rgba => 32,
            Self::Bgr48 => 48,
        }
    }

    /**
        Returns true if this is a planar format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => true,
            Self::Nv12 => true, // semi-planar counts as planar
            Self::Gray8
            | Self::Gray16
            | Self::Bgr24
            | Self::Bgr48
            | Self::Rgb24
            | Self::Bgra
            | Self::Rgba => false,
        }
    }

    /**
        Returns the number of data planes.
    */
    pub const fn plane_count(self) -> usize {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
            Self::Nv12 => 2,
            _ => 1,
        }
    }

    /**
        Returns the tightly packed layout of `plane` for a frame of the given size.

        Chroma planes of subsampled formats round their dimensions up.
    */
    pub const fn plane_layout(self, plane: usize, width: u32, height: u32) -> Option<PlaneLayout> {
        let w = width as usize;
        let h = height as usize;
        let half_w = w.div_ceil(2);
        let half_h = h.div_ceil(2);
        let layout = match (self, plane) {
            (Self::Gray8, 0) => PlaneLayout { row_bytes: w, rows: h },
            (Self::Gray16, 0) => PlaneLayout { row_bytes: w * 2, rows: h },
            (Self::Bgr24 | Self::Rgb24, 0) => PlaneLayout { row_bytes: w * 3, rows: h },
            (Self::Bgra | Self::Rgba, 0) => PlaneLayout { row_bytes: w * 4, rows: h },
            (Self::Bgr48, 0) => PlaneLayout { row_bytes: w * 6, rows: h },
            (Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Nv12, 0) => {
                PlaneLayout { row_bytes: w, rows: h }
            }
            (Self::Yuv420p, 1 | 2) => PlaneLayout { row_bytes: half_w, rows: half_h },
            (Self::Yuv422p, 1 | 2) => PlaneLayout { row_bytes: half_w, rows: h },
            (Self::Yuv444p, 1 | 2) => PlaneLayout { row_bytes: w, rows: h },
            (Self::Nv12, 1) => PlaneLayout { row_bytes: half_w * 2, rows: half_h },
            _ => return None,
        };
        Some(layout)
    }

    /**
        Returns the size in bytes of a tightly packed frame of the given size.
    */
    pub const fn buffer_size(self, width: u32, height: u32) -> usize {
        let mut total = 0;
        let mut plane = 0;
        while plane < self.plane_count() {
            if let Some(layout) = self.plane_layout(plane, width, height) {
                total += layout.size();
            }
            plane += 1;
        }
        total
    }

    /**
        Returns the FFmpeg name of this layout.
    */
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gray8 => "gray",
            Self::Gray16 => "gray16le",
            Self::Bgr24 => "bgr24",
            Self::Bgr48 => "bgr48le",
            Self::Rgb24 => "rgb24",
            Self::Bgra => "bgra",
            Self::Rgba => "rgba",
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Nv12 => "nv12",
        }
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let format = match lower.as_str() {
            "gray" | "gray8" => Self::Gray8,
            "gray16" | "gray16le" => Self::Gray16,
            "bgr48" | "bgr48le" => Self::Bgr48,
            other => Self::ALL
                .into_iter()
                .find(|f| f.name() == other)
                .ok_or_else(|| Error::image_type(format!("unknown pixel layout '{s}'")))?,
        };
        Ok(format)
    }
}
