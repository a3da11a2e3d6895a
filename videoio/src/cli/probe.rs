use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use videoio_reader::{ContainerReader, ReaderConfig};
use videoio_types::StreamDescriptor;

use super::blocking;

#[derive(Parser, Debug)]
pub struct ProbeCommand {
    /// Container to inspect
    pub input: PathBuf,

    /// Decoder threads per stream (0 picks one per core)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

impl ProbeCommand {
    pub async fn run(self) -> Result<()> {
        let config = ReaderConfig::default().with_threads(self.threads);
        let input = self.input;
        blocking(move || {
            let reader = ContainerReader::from_path(&input, config)
                .with_context(|| format!("opening {}", input.display()))?;
            print_container(&reader);
            Ok(())
        })
        .await
    }
}

fn print_container(reader: &ContainerReader) {
    if let Some(path) = reader.path() {
        println!("Container: {}", path.display());
    }
    println!(
        "  {} stream(s), {} video, {} readable",
        reader.nb_streams(),
        reader.nb_video_streams(),
        reader.nb_readable_video_streams()
    );
    let (found, metadata) = reader.metadata();
    if found {
        for (key, value) in metadata {
            println!("  {key}: {value}");
        }
    }

    for stream in reader.descriptors() {
        println!();
        print_stream(stream);
    }
}

fn print_stream(stream: &StreamDescriptor) {
    println!(
        "Stream #{} ({:?}): {}",
        stream.index, stream.kind, stream.codec_description
    );
    if stream.fourcc != 0 {
        println!("  fourcc: {}", stream.fourcc_string());
    }
    if stream.is_video() {
        println!(
            "  {}x{} {}, sar {}",
            stream.width,
            stream.height,
            stream.pixel_format.as_deref().unwrap_or("(unknown)"),
            stream.sample_aspect_ratio
        );
        println!(
            "  {:.3} fps (avg {:.3}), time base {}",
            stream.fps(),
            stream.avg_frame_rate.to_f64(),
            stream.time_base
        );
        println!(
            "  {:.3}s, ~{} frame(s), {} b/s",
            stream.duration, stream.frame_count, stream.bit_rate
        );
        println!(
            "  gop {}, max b-frames {}, tolerance {}",
            stream.gop_size, stream.max_b_frames, stream.bit_rate_tolerance
        );
        if !stream.has_decoder {
            println!("  no decoder available");
        }
    }
    for (key, value) in &stream.metadata {
        println!("  {key}: {value}");
    }
}
