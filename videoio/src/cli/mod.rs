use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use videoio_runtime::{LogLevel, RuntimeConfig};

mod probe;
mod record;
mod transcode;

pub use probe::ProbeCommand;
pub use record::RecordCommand;
pub use transcode::TranscodeCommand;

#[derive(Parser, Debug)]
#[command(name = "videoio")]
#[command(about = "Read, write and record multi-stream video containers")]
pub struct Args {
    /// Log debug output, including FFmpeg warnings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Describe the streams of a container
    Probe(ProbeCommand),
    /// Decode every video stream of a container and encode it again
    Transcode(TranscodeCommand),
    /// Record synthetic color and depth cameras, controlled from stdin
    Record(RecordCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        init_logging(self.verbose);

        let log_level = if self.verbose {
            LogLevel::Warning
        } else {
            LogLevel::Error
        };
        videoio_runtime::init_with(
            RuntimeConfig::default()
                .with_log_level(log_level)
                .with_network(false),
        )?;

        let result = match self.command {
            Command::Probe(cmd) => cmd.run().await,
            Command::Transcode(cmd) => cmd.run().await,
            Command::Record(cmd) => cmd.run().await,
        };
        videoio_runtime::shutdown();
        result
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/**
    Run blocking container work off the async runtime.
*/
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| anyhow!("worker task failed: {e}"))?
}
