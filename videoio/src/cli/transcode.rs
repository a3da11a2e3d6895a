use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use videoio_reader::{ContainerReader, ReaderConfig};
use videoio_types::{ReadParams, ReadStatus, VideoStreamParams};
use videoio_writer::{ContainerWriter, WriterConfig};

use super::blocking;

const FALLBACK_FPS: f64 = 25.0;

#[derive(Parser, Debug)]
pub struct TranscodeCommand {
    /// Container to read
    pub input: PathBuf,

    /// Container to write; the extension picks the format
    pub output: PathBuf,

    /// Encoder for every output stream
    #[arg(long, default_value = "ffv1")]
    pub codec: String,

    /// Pixel format requested from the encoder
    #[arg(long, default_value = "yuv420p")]
    pub pixel_format: String,

    /// Use exactly the requested pixel format instead of the closest supported one
    #[arg(long)]
    pub exact_pixel_format: bool,

    /// Stretch non-square pixels when the aspect ratio is within this factor of 1
    #[arg(long)]
    pub fix_aspect: Option<f64>,

    /// Stop after this many frames in total
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Codec threads per stream (0 picks one per core)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

impl TranscodeCommand {
    pub async fn run(self) -> Result<()> {
        let frames = blocking(move || self.transcode()).await?;
        println!("{frames} frame(s) written");
        Ok(())
    }

    fn transcode(self) -> Result<u64> {
        let mut reader = ContainerReader::from_path(
            &self.input,
            ReaderConfig::default().with_threads(self.threads),
        )
        .with_context(|| format!("opening {}", self.input.display()))?;

        let mut params = ReadParams::default();
        if let Some(tolerance) = self.fix_aspect {
            params = params.with_aspect_fix(tolerance);
        }
        params.validate()?;

        let mut writer = ContainerWriter::from_path(
            &self.output,
            WriterConfig::default().with_threads(self.threads),
        )
        .with_context(|| format!("creating {}", self.output.display()))?;
        let (found, metadata) = reader.metadata();
        if found {
            writer.set_metadata(metadata.clone())?;
        }

        // Output stream for each input stream, if it is carried over.
        let mut targets = vec![None; reader.nb_streams()];
        let mut sources = Vec::new();
        for stream in reader.descriptors() {
            if !stream.is_readable() {
                continue;
            }
            let (width, height) = stream.display_size(&params);
            if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
                tracing::warn!(
                    stream = stream.index,
                    width,
                    height,
                    "skipping stream with odd geometry"
                );
                continue;
            }
            let fps = if stream.fps() > 0.0 {
                stream.fps()
            } else {
                FALLBACK_FPS
            };
            let stream_params = VideoStreamParams::new(width, height, fps, self.pixel_format.as_str())
                .with_codec(self.codec.as_str())
                .with_best_pixel_format(!self.exact_pixel_format);
            let id = writer
                .add_video_stream(&stream_params)
                .with_context(|| format!("adding output for stream {}", stream.index))?;
            if !stream.metadata.is_empty() {
                writer.set_stream_metadata(id, stream.metadata.clone())?;
            }
            tracing::info!(input = stream.index, output = id, width, height, fps, "carrying stream");
            targets[stream.index] = Some(id);
            sources.push(stream.index);
        }
        if sources.is_empty() {
            bail!("{} has no readable video stream", self.input.display());
        }

        let mut written = 0;
        while self.max_frames.is_none_or(|max| written < max) {
            match reader.read(&sources, &params)? {
                ReadStatus::Frame(stream) => {
                    let (Some(id), Some(frame)) = (targets[stream], reader.frame()) else {
                        continue;
                    };
                    writer.write(id, frame)?;
                    written += 1;
                }
                ReadStatus::Again => continue,
                ReadStatus::Eof => break,
            }
        }

        writer
            .close()
            .with_context(|| format!("finishing {}", self.output.display()))?;
        Ok(written)
    }
}
