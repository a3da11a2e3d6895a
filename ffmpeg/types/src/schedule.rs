/*!
    Read status and the decoder drain scheduler.

    Reading runs in two phases. While the container still yields packets
    the reader is [`Phase::Feeding`], routing each packet to the decoder of
    its stream. Once the container is exhausted it switches to
    [`Phase::Draining`] and asks the decoders for buffered frames in turn,
    starting just after the stream that produced the previous frame. The
    rotation lives in [`DrainCursor`] so that it can be exercised without
    any packet I/O.
*/

use crate::Result;

/**
    Sentinel for an exhausted reader.
*/
pub const EOF: i32 = -1;

/**
    Sentinel for a transient "not ready, retry" condition.
*/
pub const EAGAIN: i32 = -2;

/**
    Outcome of a single read.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadStatus {
    /// A frame was decoded from the stream with this index.
    Frame(usize),
    /// Every readable stream is exhausted.
    Eof,
    /// The container is temporarily not ready; retrying is safe.
    Again,
}

impl ReadStatus {
    /**
        Stream index on success, or [`EOF`] / [`EAGAIN`].
    */
    pub fn code(self) -> i32 {
        match self {
            Self::Frame(index) => i32::try_from(index).unwrap_or(i32::MAX),
            Self::Eof => EOF,
            Self::Again => EAGAIN,
        }
    }

    pub fn stream(self) -> Option<usize> {
        match self {
            Self::Frame(index) => Some(index),
            Self::Eof | Self::Again => None,
        }
    }

    pub fn is_eof(self) -> bool {
        self == Self::Eof
    }
}

/**
    Scheduler phase of a reader.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Packets are read from the container and fed to decoders.
    #[default]
    Feeding,
    /// The container is exhausted; buffered frames are drained.
    Draining,
    /// Nothing is left to read until the reader is rewound.
    Exhausted,
}

/**
    Round-robin cursor over the streams of a container.
*/
#[derive(Clone, Debug, Default)]
pub struct DrainCursor {
    stream_count: usize,
    last: Option<usize>,
}

impl DrainCursor {
    pub fn new(stream_count: usize) -> Self {
        Self {
            stream_count,
            last: None,
        }
    }

    /**
        Stream that produced the previous frame.
    */
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /**
        Remember the stream that produced a frame.
    */
    pub fn record(&mut self, stream: usize) {
        self.last = Some(stream);
    }

    /**
        Forget the previous producer, so the next rotation starts at stream 0.
    */
    pub fn reset(&mut self) {
        self.last = None;
    }

    /**
        Streams in the order they should be asked, each exactly once.
    */
    pub fn order(&self) -> impl Iterator<Item = usize> + use<> {
        let count = self.stream_count;
        let start = match self.last {
            Some(last) if count > 0 => (last + 1) % count,
            _ => 0,
        };
        (0..count).map(move |step| (start + step) % count)
    }

    /**
        Ask `receive` for a frame from each stream in rotation order.

        Stops at the first stream for which `receive` returns true, records it
        and returns its index. Returns `None` if no stream produced a frame.
    */
    pub fn drain_next<F>(&mut self, mut receive: F) -> Result<Option<usize>>
    where
        F: FnMut(usize) -> Result<bool>,
    {
        for stream in self.order() {
            if receive(stream)? {
                self.record(stream);
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ReadStatus::Frame(3).code(), 3);
        assert_eq!(ReadStatus::Eof.code(), EOF);
        assert_eq!(ReadStatus::Again.code(), EAGAIN);
        assert_eq!(ReadStatus::Again.stream(), None);
    }

    #[test]
    fn rotation_starts_after_last_producer() {
        let mut cursor = DrainCursor::new(3);
        assert_eq!(cursor.order().collect::<Vec<_>>(), vec![0, 1, 2]);
        cursor.record(1);
        assert_eq!(cursor.order().collect::<Vec<_>>(), vec![2, 0, 1]);
        cursor.record(2);
        assert_eq!(cursor.order().collect::<Vec<_>>(), vec![0, 1, 2]);
        cursor.reset();
        assert_eq!(cursor.order().next(), Some(0));
    }

    #[test]
    fn empty_container_has_no_order() {
        let mut cursor = DrainCursor::new(0);
        cursor.record(0);
        assert_eq!(cursor.order().count(), 0);
    }

    #[test]
    fn draining_interleaves_buffered_streams() {
        // Three streams with 3, 1 and 2 buffered frames.
        let mut buffered = vec![3, 1, 2];
        let mut cursor = DrainCursor::new(3);
        let mut produced = Vec::new();

        while let Some(stream) = cursor
            .drain_next(|s| {
                if buffered[s] > 0 {
                    buffered[s] -= 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .unwrap()
        {
            produced.push(stream);
        }

        assert_eq!(produced, vec![0, 1, 2, 0, 2, 0]);
    }

    #[test]
    fn drain_stops_at_first_producer() {
        let mut cursor = DrainCursor::new(4);
        cursor.record(0);
        let mut asked = Vec::new();
        let found = cursor
            .drain_next(|s| {
                asked.push(s);
                Ok(s == 3)
            })
            .unwrap();
        assert_eq!(found, Some(3));
        assert_eq!(asked, vec![1, 2, 3]);
        assert_eq!(cursor.last(), Some(3));
    }

    #[test]
    fn drain_propagates_errors() {
        let mut cursor = DrainCursor::new(2);
        let result = cursor.drain_next(|_| Err(crate::Error::bad_param("boom")));
        assert!(result.is_err());
        assert_eq!(cursor.last(), None);
    }
}
