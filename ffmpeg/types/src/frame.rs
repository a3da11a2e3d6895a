/*!
    Application-facing frame type.
*/

use crate::{Error, PixelFormat, Pts, Rational, Result};

/**
    A video frame owned by the application.

    Planes are stored back to back in `data` without row padding,
    in the order and sizes given by [`PixelFormat::plane_layout`].
*/
#[derive(Clone, Debug)]
pub struct VideoFrame {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of the data.
    pub format: PixelFormat,
    /// Presentation timestamp (None for frames without timing).
    pub pts: Option<Pts>,
    /// Time base for interpreting the PTS.
    pub time_base: Rational,
}

impl VideoFrame {
    /**
        Create a new video frame.
    */
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Option<Pts>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            pts,
            time_base,
        }
    }

    /**
        Create a zero-filled frame without timing.
    */
    pub fn blank(format: PixelFormat, width: u32, height: u32) -> Self {
        let data = vec![0; format.buffer_size(width, height)];
        Self::new(data, width, height, format, None, Rational::default())
    }

    /**
        Check that `data` holds exactly one frame of the declared layout.
    */
    pub fn validate(&self) -> Result<()> {
        let expected = self.format.buffer_size(self.width, self.height);
        if self.data.len() != expected {
            return Err(Error::image_type(format!(
                "{}x{} {} frame needs {} bytes, got {}",
                self.width,
                self.height,
                self.format.name(),
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    /**
        Returns the bytes of one plane, or `None` if the layout has no such plane.
    */
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let (offset, size) = self.plane_range(index)?;
        self.data.get(offset..offset + size)
    }

    /**
        Returns the mutable bytes of one plane.
    */
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let (offset, size) = self.plane_range(index)?;
        self.data.get_mut(offset..offset + size)
    }

    /**
        Returns the row stride of one plane.
    */
    pub fn stride(&self, index: usize) -> Option<usize> {
        self.format
            .plane_layout(index, self.width, self.height)
            .map(|layout| layout.row_bytes)
    }

    fn plane_range(&self, index: usize) -> Option<(usize, usize)> {
        let mut offset = 0;
        for plane in 0..index {
            offset += self.format.plane_layout(plane, self.width, self.height)?.size();
        }
        let layout = self.format.plane_layout(index, self.width, self.height)?;
        Some((offset, layout.size()))
    }

    /**
        Returns the presentation time in seconds, if PTS is set.
    */
    pub fn presentation_time(&self) -> Option<f64> {
        self.pts.map(|pts| pts.to_seconds(self.time_base))
    }
}
