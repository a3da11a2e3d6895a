/*!
    Line-oriented control commands for a running recorder.

    ```text
    dir <path>           output directory
    mode c|d|cd          cameras to record
    size c|d <w> <h>     frame size of one camera
    fps <rate>           frame rate of new recordings
    start [seconds]      begin a recording, optionally time limited
    stop                 finish the current recording
    end                  finish and quit
    ```
*/

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

use videoio_types::FrameSource;

use super::recorder::{Camera, Mode, Recorder};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Dir(PathBuf),
    Mode(Mode),
    Size(Camera, u32, u32),
    Fps(f64),
    Start(Option<f64>),
    Stop,
    End,
}

/**
    What the control loop should do after a command.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    End,
}

impl Command {
    /**
        Parse one input line. Blank lines yield `None`.
    */
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("dir", [path]) => Self::Dir(PathBuf::from(path)),
            ("mode", [mode]) => {
                Self::Mode(Mode::parse(mode).ok_or_else(|| anyhow!("unknown mode {mode:?}"))?)
            }
            ("size", [camera, width, height]) => {
                let camera =
                    Camera::parse(camera).ok_or_else(|| anyhow!("unknown camera {camera:?}"))?;
                Self::Size(camera, number(width)?, number(height)?)
            }
            ("fps", [rate]) => Self::Fps(number(rate)?),
            ("start", []) => Self::Start(None),
            ("start", [seconds]) => Self::Start(Some(number(seconds)?)),
            ("stop", []) => Self::Stop,
            ("end" | "quit", []) => Self::End,
            ("dir" | "mode" | "size" | "fps" | "start" | "stop" | "end" | "quit", _) => {
                bail!("wrong arguments for {verb:?}")
            }
            _ => bail!("unknown command {verb:?}"),
        };
        Ok(Some(command))
    }

    /**
        Carry out the command on `recorder`.
    */
    pub fn apply<C, D>(self, recorder: &mut Recorder<C, D>) -> Result<Flow>
    where
        C: FrameSource,
        D: FrameSource,
    {
        match self {
            Self::Dir(dir) => recorder.set_dir(dir)?,
            Self::Mode(mode) => recorder.set_mode(mode)?,
            Self::Size(camera, width, height) => recorder.set_size(camera, width, height)?,
            Self::Fps(rate) => recorder.set_fps(rate)?,
            Self::Start(seconds) => {
                let limit = seconds
                    .map(Duration::try_from_secs_f64)
                    .transpose()
                    .context("invalid recording length")?;
                let path = recorder.start(limit)?;
                println!("recording to {}", path.display());
            }
            Self::Stop => match recorder.stop()? {
                Some(path) => println!("saved {}", path.display()),
                None => println!("not recording"),
            },
            Self::End => {
                if let Some(path) = recorder.stop()? {
                    println!("saved {}", path.display());
                }
                return Ok(Flow::End);
            }
        }
        Ok(Flow::Continue)
    }
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    word.parse()
        .with_context(|| format!("{word:?} is not a valid number"))
}

#[cfg(test)]
mod tests {
    use videoio_types::{PixelFormat, TestPattern};

    use super::*;

    #[test]
    fn parses_every_command() {
        let cases = [
            ("dir /tmp/out", Command::Dir("/tmp/out".into())),
            ("mode cd", Command::Mode(Mode::Both)),
            ("  mode   d ", Command::Mode(Mode::Depth)),
            ("size c 320 240", Command::Size(Camera::Color, 320, 240)),
            ("fps 15", Command::Fps(15.0)),
            ("start", Command::Start(None)),
            ("start 2.5", Command::Start(Some(2.5))),
            ("stop", Command::Stop),
            ("end", Command::End),
        ];
        for (line, expected) in cases {
            assert_eq!(Command::parse(line).unwrap(), Some(expected), "{line}");
        }
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "record",
            "mode x",
            "size cd 10 10",
            "size c ten 10",
            "fps",
            "start 1 2",
            "stop now",
        ] {
            assert!(Command::parse(line).is_err(), "{line}");
        }
    }

    #[test]
    fn drives_a_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let color = TestPattern::new(PixelFormat::Bgr24, 32, 32).unwrap();
        let depth = TestPattern::new(PixelFormat::Gray16, 32, 32).unwrap();
        let mut recorder = Recorder::new(color, depth).with_threads(Some(1));

        let script = format!("dir {}\nmode c\nfps 10\nstart\n", dir.path().display());
        for line in script.lines() {
            let command = Command::parse(line).unwrap().unwrap();
            assert_eq!(command.apply(&mut recorder).unwrap(), Flow::Continue);
        }
        assert!(recorder.is_recording());
        assert_eq!(recorder.fps(), 10.0);
        recorder.tick().unwrap();

        assert!(Command::Fps(5.0).apply(&mut recorder).is_err());
        assert!(Command::Start(Some(-1.0)).apply(&mut recorder).is_err());

        assert_eq!(Command::End.apply(&mut recorder).unwrap(), Flow::End);
        assert!(!recorder.is_recording());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
