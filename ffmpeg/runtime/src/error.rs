/*!
    Mapping of FFmpeg failures onto the crate error taxonomy.
*/

use std::fmt::Display;

use libc::c_int;

use videoio_types::{Error, ErrorKind};

/**
    Convert an FFmpeg error into an [`Error`] of the given kind.

    Allocation failures always become [`ErrorKind::OutOfMemory`],
    whatever the call site expected.
*/
pub fn from_ffmpeg(kind: ErrorKind, context: impl Display, err: ffmpeg_next::Error) -> Error {
    if is_out_of_memory(&err) {
        return Error::out_of_memory(format!("{context}: {err}"));
    }
    Error::new(kind, format!("{context}: {err}"))
}

/**
    Closure form of [`from_ffmpeg`] for use with `map_err`.
*/
pub fn map<C: Display>(kind: ErrorKind, context: C) -> impl FnOnce(ffmpeg_next::Error) -> Error {
    move |err| from_ffmpeg(kind, context, err)
}

/**
    Check the return value of a raw FFmpeg call.
*/
pub fn check(ret: c_int, kind: ErrorKind, context: impl Display) -> Result<c_int, Error> {
    if ret < 0 {
        return Err(from_ffmpeg(kind, context, ffmpeg_next::Error::from(ret)));
    }
    Ok(ret)
}

/**
    Returns true for the transient "try again" condition.
*/
pub fn is_again(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == libc::EAGAIN)
}

pub fn is_out_of_memory(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == libc::ENOMEM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enomem_becomes_out_of_memory() {
        let err = from_ffmpeg(
            ErrorKind::OpenCodec,
            "opening decoder",
            ffmpeg_next::Error::Other {
                errno: libc::ENOMEM,
            },
        );
        assert!(err.is_out_of_memory());
        assert!(err.message().starts_with("opening decoder"));
    }

    #[test]
    fn other_errors_keep_their_kind() {
        let err = map(ErrorKind::RwFrame, "reading packet")(ffmpeg_next::Error::InvalidData);
        assert_eq!(err.kind(), ErrorKind::RwFrame);
    }

    #[test]
    fn again_is_detected() {
        let again = ffmpeg_next::Error::Other {
            errno: libc::EAGAIN,
        };
        assert!(is_again(&again));
        assert!(!is_again(&ffmpeg_next::Error::Eof));
    }

    #[test]
    fn check_passes_non_negative() {
        assert_eq!(check(3, ErrorKind::SetOptions, "x").unwrap(), 3);
        let err = check(
            ffmpeg_next::ffi::AVERROR(libc::ENOMEM),
            ErrorKind::SetOptions,
            "x",
        )
        .unwrap_err();
        assert!(err.is_out_of_memory());
    }
}
