/*!
    Free-form codec options.
*/

use std::ffi::CString;

use ffmpeg_next::{codec, ffi};

use videoio_runtime::error as ff_error;
use videoio_types::{Error, ErrorKind, Result, parse_options};

/**
    Apply a `key=value:key=value` option string to an unopened codec context.

    Options are looked up on the context and on the codec's private
    options.
*/
pub fn apply_options(context: &mut codec::Context, options: &str) -> Result<usize> {
    let target = unsafe { context.as_mut_ptr() };
    let pairs = parse_options(options)?;
    for (key, value) in &pairs {
        let (Ok(c_key), Ok(c_value)) = (CString::new(key.as_str()), CString::new(value.as_str()))
        else {
            return Err(Error::new(
                ErrorKind::SetOptions,
                format!("option {key}={value} contains a NUL byte"),
            ));
        };
        let ret = unsafe {
            ffi::av_opt_set(
                target.cast(),
                c_key.as_ptr(),
                c_value.as_ptr(),
                ffi::AV_OPT_SEARCH_CHILDREN as libc::c_int,
            )
        };
        ff_error::check(ret, ErrorKind::SetOptions, format!("setting option {key}={value}"))?;
        tracing::debug!(key = %key, value = %value, "codec option set");
    }
    Ok(pairs.len())
}
