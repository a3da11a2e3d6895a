use std::{
    path::Path,
    process::{Command, Output},
};

use videoio_reader::{ContainerReader, ReaderConfig};
use videoio_types::{
    FrameSource, Metadata, PixelFormat, ReadParams, ReadStatus, TestPattern, VideoStreamParams,
};
use videoio_writer::{ContainerWriter, WriterConfig};

fn videoio(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_videoio"))
        .args(args)
        .output()
        .unwrap()
}

fn write_clip(path: &Path, frames: usize) {
    let mut writer =
        ContainerWriter::from_path(path, WriterConfig::default().with_threads(1)).unwrap();
    let mut tags = Metadata::new();
    tags.insert("title".into(), "pattern".into());
    writer.set_metadata(tags).unwrap();

    let id = writer
        .add_video_stream(&VideoStreamParams::new(48, 32, 20.0, "gray"))
        .unwrap();
    let mut source = TestPattern::new(PixelFormat::Gray8, 48, 32).unwrap();
    for _ in 0..frames {
        writer.write(id, source.next_frame().unwrap()).unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn probe_describes_streams() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mkv");
    write_clip(&clip, 4);

    let output = videoio(&["probe", "--threads", "1", clip.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 stream(s), 1 video, 1 readable"), "{stdout}");
    assert!(stdout.contains("48x32 gray"), "{stdout}");
    assert!(stdout.contains("title: pattern"), "{stdout}");
}

#[test]
fn runtime_is_shut_down_after_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mkv");
    write_clip(&clip, 2);

    let output = Command::new(env!("CARGO_BIN_EXE_videoio"))
        .args(["--verbose", "probe", "--threads", "1", clip.to_str().unwrap()])
        .env("RUST_LOG", "videoio_runtime=debug")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FFmpeg runtime shut down"), "{stderr}");

    let missing = dir.path().join("missing.mkv");
    let output = Command::new(env!("CARGO_BIN_EXE_videoio"))
        .args(["probe", missing.to_str().unwrap()])
        .env("RUST_LOG", "videoio_runtime=debug")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FFmpeg runtime shut down"), "{stderr}");
}

#[test]
fn probe_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mkv");
    let output = videoio(&["probe", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn transcode_copies_frames_and_tags() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mkv");
    let copy = dir.path().join("copy.mkv");
    write_clip(&clip, 6);

    let output = videoio(&[
        "transcode",
        "--threads",
        "1",
        "--max-frames",
        "4",
        clip.to_str().unwrap(),
        copy.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let mut reader =
        ContainerReader::from_path(&copy, ReaderConfig::default().with_threads(1)).unwrap();
    assert_eq!(reader.codec_name(0).unwrap(), "ffv1");
    assert_eq!(reader.pixel_format(0).unwrap(), Some("yuv420p"));
    assert_eq!(reader.metadata().1.get("title").map(String::as_str), Some("pattern"));

    let mut frames = 0;
    while let ReadStatus::Frame(_) = reader.read(&[], &ReadParams::default()).unwrap() {
        frames += 1;
    }
    assert_eq!(frames, 4);
}
