/*!
    FFmpeg runtime glue for the video container I/O crates.

    - [`init`] and friends perform the process-wide library setup once
    - [`error`] maps FFmpeg failures onto [`videoio_types::ErrorKind`]
    - [`convert`] translates between FFmpeg and crate-level values
*/

pub mod convert;
pub mod error;
mod init;

pub use init::{
    LogLevel, RuntimeConfig, RuntimeState, init, init_with, is_initialized,
    set_initialized_externally, shutdown, state, thread_count,
};
