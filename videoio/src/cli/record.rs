use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use videoio_types::{PixelFormat, TestPattern};

use crate::record::{Command, DEFAULT_FPS, Flow, Mode, Recorder};

#[derive(Parser, Debug)]
pub struct RecordCommand {
    /// Directory new recordings are written to
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Cameras to record: c, d or cd
    #[arg(long, default_value = "cd", value_parser = parse_mode)]
    pub mode: Mode,

    /// Color frame size as WIDTHxHEIGHT
    #[arg(long, default_value = "640x480", value_parser = parse_size)]
    pub color_size: (u32, u32),

    /// Depth frame size as WIDTHxHEIGHT
    #[arg(long, default_value = "640x480", value_parser = parse_size)]
    pub depth_size: (u32, u32),

    /// Frame rate of recordings
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: f64,

    /// Encoder threads per stream (0 picks one per core)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Start recording right away, stopping after this many seconds
    #[arg(long)]
    pub start: Option<f64>,
}

impl RecordCommand {
    pub async fn run(self) -> Result<()> {
        let color = TestPattern::new(PixelFormat::Bgr24, self.color_size.0, self.color_size.1)?;
        let depth = TestPattern::new(PixelFormat::Gray16, self.depth_size.0, self.depth_size.1)?;
        let mut recorder = Recorder::new(color, depth).with_threads(Some(self.threads));
        recorder.set_dir(&self.dir)?;
        recorder.set_mode(self.mode)?;
        recorder.set_fps(self.fps)?;

        if let Some(seconds) = self.start {
            Command::Start(Some(seconds)).apply(&mut recorder)?;
        }
        println!(
            "{:?} camera(s) at {} fps into {}",
            recorder.mode(),
            recorder.fps(),
            recorder.dir().display()
        );
        println!("commands: dir <path>, mode c|d|cd, size c|d <w> <h>, fps <rate>, start [s], stop, end");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / recorder.fps()));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("reading commands")? else {
                        Command::End.apply(&mut recorder)?;
                        break;
                    };
                    let flow = match Command::parse(&line) {
                        Ok(Some(command)) => command.apply(&mut recorder),
                        Ok(None) => Ok(Flow::Continue),
                        Err(e) => Err(e),
                    };
                    match flow {
                        Ok(Flow::End) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => eprintln!("error: {e:#}"),
                    }
                    let period = Duration::from_secs_f64(1.0 / recorder.fps());
                    if ticker.period() != period {
                        ticker = tokio::time::interval(period);
                        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    }
                }
                _ = ticker.tick() => {
                    let was_recording = recorder.is_recording();
                    if let Err(e) = recorder.tick() {
                        let path = recorder.current_file().map(|p| p.display().to_string());
                        tracing::error!(error = %format!("{e:#}"), ?path, "recording failed");
                        let _ = recorder.stop();
                    } else if was_recording && !recorder.is_recording() {
                        println!("recording finished");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    Command::End.apply(&mut recorder)?;
                    break;
                }
            }
        }
        Ok(())
    }
}

fn parse_mode(value: &str) -> Result<Mode> {
    Mode::parse(value).ok_or_else(|| anyhow!("expected c, d or cd"))
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT"))?;
    Ok((width.trim().parse()?, height.trim().parse()?))
}
