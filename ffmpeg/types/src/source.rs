/*!
    Frame source boundary.

    A frame source stands in for capture hardware: it delivers frames of a
    fixed, caller-configurable geometry on demand and signals "nothing this
    cycle" with `None` instead of blocking.
*/

use crate::{Error, PixelFormat, Result, VideoFrame};

/**
    Producer of raw frames for recording.
*/
pub trait FrameSource {
    /**
        Pixel layout of every frame this source produces.
    */
    fn format(&self) -> PixelFormat;

    /**
        Current frame geometry.
    */
    fn size(&self) -> (u32, u32);

    /**
        Change the frame geometry. Width and height must be positive and even.
    */
    fn set_size(&mut self, width: u32, height: u32) -> Result<()>;

    /**
        Returns the next frame, or `None` if no frame is available this cycle.
    */
    fn next_frame(&mut self) -> Option<&VideoFrame>;
}

/**
    Synthetic source producing a moving diagonal ramp.
*/
#[derive(Clone, Debug)]
pub struct TestPattern {
    frame: VideoFrame,
    tick: u64,
    gap_every: Option<u64>,
}

impl TestPattern {
    /**
        Create a pattern source of the given layout and size.
    */
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        Ok(Self {
            frame: VideoFrame::blank(format, width, height),
            tick: 0,
            gap_every: None,
        })
    }

    /**
        Report "unavailable" on every `n`-th poll.
    */
    pub fn with_gaps(mut self, n: u64) -> Self {
        self.gap_every = (n > 0).then_some(n);
        self
    }

    fn render(&mut self) {
        let tick = self.tick;
        let format = self.frame.format;
        let (width, height) = (self.frame.width, self.frame.height);
        for plane in 0..format.plane_count() {
            let Some(layout) = format.plane_layout(plane, width, height) else {
                continue;
            };
            let Some(bytes) = self.frame.plane_mut(plane) else {
                continue;
            };
            for (row, line) in bytes.chunks_exact_mut(layout.row_bytes).enumerate() {
                for (col, byte) in line.iter_mut().enumerate() {
                    *byte = (col as u64 + row as u64 + tick) as u8;
                }
            }
        }
    }
}

impl FrameSource for TestPattern {
    fn format(&self) -> PixelFormat {
        self.frame.format
    }

    fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        check_size(width, height)?;
        self.frame = VideoFrame::blank(self.frame.format, width, height);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<&VideoFrame> {
        self.tick += 1;
        if let Some(n) = self.gap_every {
            if self.tick % n == 0 {
                return None;
            }
        }
        self.render();
        Some(&self.frame)
    }
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(Error::image_size(format!(
            "source size must be positive and even, got {width}x{height}"
        )));
    }
    Ok(())
}
