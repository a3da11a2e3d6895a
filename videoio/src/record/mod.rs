mod command;
mod recorder;

pub use command::{Command, Flow};
pub use recorder::{DEFAULT_FPS, Mode, Recorder};
