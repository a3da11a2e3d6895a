/*!
    Error types for the video container I/O crates.
*/

use std::fmt;

use thiserror::Error;

/**
    Machine-checkable category of an [`Error`].

    The first sixteen kinds carry stable numeric codes, see [`ErrorKind::code`].
    Allocation failure is reported separately as [`ErrorKind::OutOfMemory`]
    so that it can never be confused with an ordinary I/O failure.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The container file could not be opened.
    OpenFile,
    /// Stream information could not be probed.
    FindStreamInfo,
    /// A decoder or encoder failed to initialize.
    OpenCodec,
    /// A packet could not be read from or written to the container.
    RwFrame,
    /// Encoding or decoding failed.
    EncDecVideo,
    /// Pixel format or size conversion failed.
    ConvertImage,
    /// The output container format could not be deduced.
    GuessFormat,
    /// No codec matched the request.
    FindCodec,
    /// No pixel format matched the request.
    FindPixFmt,
    /// The image layout is not supported.
    ImageType,
    /// The image geometry is inconsistent.
    ImageSize,
    /// An argument was out of range.
    BadParam,
    /// The codec option string could not be applied.
    SetOptions,
    /// Metadata could not be applied.
    SetMetadata,
    /// The container header could not be written.
    WriteHeader,
    /// The container trailer could not be written.
    WriteTrailer,
    /// An allocation failed.
    OutOfMemory,
}

impl ErrorKind {
    /**
        Stable numeric code of this kind.

        Returns `None` for [`ErrorKind::OutOfMemory`].
    */
    pub const fn code(self) -> Option<i32> {
        Some(match self {
            Self::OpenFile => 1,
            Self::FindStreamInfo => 2,
            Self::OpenCodec => 3,
            Self::RwFrame => 4,
            Self::EncDecVideo => 5,
            Self::ConvertImage => 6,
            Self::GuessFormat => 7,
            Self::FindCodec => 8,
            Self::FindPixFmt => 9,
            Self::ImageType => 10,
            Self::ImageSize => 11,
            Self::BadParam => 12,
            Self::SetOptions => 13,
            Self::SetMetadata => 14,
            Self::WriteHeader => 15,
            Self::WriteTrailer => 16,
            Self::OutOfMemory => return None,
        })
    }

    /**
        Short human-readable description of this kind.
    */
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenFile => "could not open file",
            Self::FindStreamInfo => "could not find stream information",
            Self::OpenCodec => "could not open codec",
            Self::RwFrame => "could not read or write frame",
            Self::EncDecVideo => "could not encode or decode video",
            Self::ConvertImage => "could not convert image",
            Self::GuessFormat => "could not deduce output format",
            Self::FindCodec => "could not find codec",
            Self::FindPixFmt => "could not find pixel format",
            Self::ImageType => "unsupported image type",
            Self::ImageSize => "inconsistent image size",
            Self::BadParam => "bad parameter",
            Self::SetOptions => "could not set options",
            Self::SetMetadata => "could not set metadata",
            Self::WriteHeader => "could not write header",
            Self::WriteTrailer => "could not write trailer",
            Self::OutOfMemory => "out of memory",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/**
    Error type for the video container I/O crates.

    Every failure carries an [`ErrorKind`] and a message describing
    the specific operation that failed.
*/
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /**
        Create an error of the given kind.
    */
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /**
        Create an out-of-memory error.
    */
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfMemory, message)
    }

    /**
        Create a bad-parameter error.
    */
    pub fn bad_param(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadParam, message)
    }

    /**
        Create an image-size error.
    */
    pub fn image_size(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImageSize, message)
    }

    /**
        Create an image-type error.
    */
    pub fn image_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImageType, message)
    }

    /**
        Create a conversion error.
    */
    pub fn convert_image(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConvertImage, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /**
        Returns true if this error reports an allocation failure.
    */
    pub fn is_out_of_memory(&self) -> bool {
        self.kind == ErrorKind::OutOfMemory
    }
}

/**
    Result type alias using our Error type.
*/
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::OpenFile.code(), Some(1));
        assert_eq!(ErrorKind::ImageSize.code(), Some(11));
        assert_eq!(ErrorKind::WriteTrailer.code(), Some(16));
        assert_eq!(ErrorKind::OutOfMemory.code(), None);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::image_size("expected 640x480, got 641x480");
        assert_eq!(
            err.to_string(),
            "inconsistent image size: expected 640x480, got 641x480"
        );
        assert_eq!(err.kind(), ErrorKind::ImageSize);
    }

    #[test]
    fn out_of_memory_is_distinct() {
        let oom = Error::out_of_memory("frame allocation");
        let io = Error::new(ErrorKind::RwFrame, "short write");
        assert!(oom.is_out_of_memory());
        assert!(!io.is_out_of_memory());
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<Error>();
    }
}
