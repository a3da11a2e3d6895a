use std::{collections::BTreeMap, path::Path};

use videoio_types::{
    ErrorKind, FrameSource, Metadata, PixelFormat, TestPattern, VideoFrame, VideoStreamParams,
};
use videoio_writer::{ContainerWriter, WriterConfig};

fn config() -> WriterConfig {
    WriterConfig::default().with_threads(1)
}

/// Packets per stream in a finished container.
fn packet_counts(path: &Path) -> BTreeMap<usize, u64> {
    let mut input = ffmpeg_next::format::input(&path).unwrap();
    let mut counts = BTreeMap::new();
    for (stream, _) in input.packets() {
        *counts.entry(stream.index()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn every_frame_becomes_a_packet_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bframes.mkv");

    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    let params = VideoStreamParams::new(64, 48, 25.0, "yuv420p")
        .with_codec("mpeg4")
        .with_max_b_frames(2)
        .with_gop_size(12);
    let id = writer.add_video_stream(&params).unwrap();

    let mut source = TestPattern::new(PixelFormat::Yuv420p, 64, 48).unwrap();
    for _ in 0..10 {
        let frame = source.next_frame().unwrap();
        writer.write(id, frame).unwrap();
    }
    assert!(writer.header_written());
    assert!(writer.packets_written(id).unwrap() <= 10);
    assert_eq!(writer.frame_number(id).unwrap(), 10);

    writer.close().unwrap();
    assert_eq!(packet_counts(&path).get(&0), Some(&10));
}

#[test]
fn streams_are_flushed_independently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two.mkv");

    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    let color = writer
        .add_video_stream(&VideoStreamParams::new(32, 24, 30.0, "yuv420p").with_codec("mpeg4"))
        .unwrap();
    let depth = writer
        .add_video_stream(&VideoStreamParams::new(16, 12, 30.0, "gray16le"))
        .unwrap();
    assert_eq!((color, depth), (0, 1));
    assert_eq!(writer.nb_streams(), 2);

    let mut colors = TestPattern::new(PixelFormat::Yuv420p, 32, 24).unwrap();
    let mut depths = TestPattern::new(PixelFormat::Gray16, 16, 12).unwrap();
    for step in 0..7 {
        writer.write(color, colors.next_frame().unwrap()).unwrap();
        if step % 2 == 0 {
            writer.write(depth, depths.next_frame().unwrap()).unwrap();
        }
    }
    assert_eq!(writer.codec_name(depth).unwrap(), "ffv1");
    writer.close().unwrap();

    let counts = packet_counts(&path);
    assert_eq!(counts.get(&0), Some(&7));
    assert_eq!(counts.get(&1), Some(&4));
}

#[test]
fn close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.mkv");

    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    let id = writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 10.0, "gray"))
        .unwrap();
    writer
        .write(id, &VideoFrame::blank(PixelFormat::Gray8, 16, 16))
        .unwrap();

    writer.close().unwrap();
    assert!(!writer.is_open());
    writer.close().unwrap();
    drop(writer);

    assert_eq!(packet_counts(&path).get(&0), Some(&1));
}

#[test]
fn closing_without_frames_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.mkv");

    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 10.0, "gray"))
        .unwrap();
    writer.close().unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn odd_geometry_is_not_registered() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = ContainerWriter::from_path(dir.path().join("odd.mkv"), config()).unwrap();

    let err = writer
        .add_video_stream(&VideoStreamParams::new(15, 16, 25.0, "gray"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImageSize);
    assert_eq!(writer.nb_streams(), 0);
    assert!(writer.has_failed());

    let id = writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 25.0, "gray"))
        .unwrap();
    assert_eq!(id, 0);
}

#[test]
fn configuration_errors_have_their_own_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = ContainerWriter::from_path(dir.path().join("bad.mkv"), config()).unwrap();

    let cases = [
        (
            VideoStreamParams::new(16, 16, 25.0, "gray").with_codec("no-such-codec"),
            ErrorKind::FindCodec,
        ),
        (
            VideoStreamParams::new(16, 16, 25.0, "not-a-format"),
            ErrorKind::FindPixFmt,
        ),
        (
            VideoStreamParams::new(16, 16, 25.0, "gray").with_options("no_such_option=1"),
            ErrorKind::SetOptions,
        ),
        (
            VideoStreamParams::new(16, 16, 25.0, "gray").with_aspect_ratio(11.0),
            ErrorKind::BadParam,
        ),
    ];
    for (params, kind) in cases {
        assert_eq!(writer.add_video_stream(&params).unwrap_err().kind(), kind);
    }
    assert_eq!(writer.nb_streams(), 0);
}

#[test]
fn frames_are_checked_before_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = ContainerWriter::from_path(dir.path().join("check.mkv"), config()).unwrap();
    let id = writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 25.0, "gray"))
        .unwrap();

    let wrong_size = VideoFrame::blank(PixelFormat::Gray8, 32, 16);
    assert_eq!(writer.write(id, &wrong_size).unwrap_err().kind(), ErrorKind::ImageSize);

    let mut short = VideoFrame::blank(PixelFormat::Gray8, 16, 16);
    short.data.truncate(100);
    assert_eq!(writer.write(id, &short).unwrap_err().kind(), ErrorKind::ImageType);

    let good = VideoFrame::blank(PixelFormat::Gray8, 16, 16);
    assert_eq!(writer.write(7, &good).unwrap_err().kind(), ErrorKind::BadParam);

    assert!(!writer.header_written());
    assert!(!writer.has_failed());
}

#[test]
fn caller_layout_is_converted_for_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bgr.mkv");
    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    let id = writer
        .add_video_stream(&VideoStreamParams::new(32, 32, 25.0, "yuv420p"))
        .unwrap();

    let mut source = TestPattern::new(PixelFormat::Bgr24, 32, 32).unwrap();
    for _ in 0..3 {
        writer.write(id, source.next_frame().unwrap()).unwrap();
    }
    // A change of layout mid-stream is accepted as well.
    writer
        .write(id, &VideoFrame::blank(PixelFormat::Gray8, 32, 32))
        .unwrap();
    writer.close().unwrap();

    assert_eq!(packet_counts(&path).get(&0), Some(&4));
}

#[test]
fn accessors_follow_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = ContainerWriter::from_path(dir.path().join("acc.mkv"), config()).unwrap();
    let params = VideoStreamParams::new(16, 16, 25.0, "gray");
    let id = writer.add_video_stream(&params).unwrap();

    assert_eq!(writer.stream_params(id).unwrap(), &params);
    assert_eq!(writer.codec_name(id).unwrap(), "ffv1");
    assert_eq!(writer.fourcc(id).unwrap(), u32::from_le_bytes(*b"FFV1"));
    assert!(writer.codec_description(id).unwrap().contains("ffv1"));
    assert_eq!(writer.thread_count(), 1);

    let frame = VideoFrame::blank(PixelFormat::Gray8, 16, 16);
    for _ in 0..5 {
        writer.write(id, &frame).unwrap();
    }
    assert_eq!(writer.frame_number(id).unwrap(), 5);
    assert_eq!(writer.packets_written(id).unwrap(), 5);
    assert!((writer.timestamp(id).unwrap() - 0.16).abs() < 1e-9);

    let err = writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 25.0, "gray"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParam);
}

#[test]
fn metadata_is_written_with_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.mkv");
    let mut writer = ContainerWriter::from_path(&path, config()).unwrap();
    let id = writer
        .add_video_stream(&VideoStreamParams::new(16, 16, 25.0, "gray"))
        .unwrap();

    let mut tags = Metadata::new();
    tags.insert("title".into(), "calibration".into());
    writer.set_metadata(tags.clone()).unwrap();
    let mut stream_tags = Metadata::new();
    stream_tags.insert("camera".into(), "depth".into());
    writer.set_stream_metadata(id, stream_tags).unwrap();

    writer
        .write(id, &VideoFrame::blank(PixelFormat::Gray8, 16, 16))
        .unwrap();
    let err = writer.set_metadata(tags).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SetMetadata);
    writer.close().unwrap();

    let input = ffmpeg_next::format::input(&path).unwrap();
    assert_eq!(input.metadata().get("title"), Some("calibration"));
    let stream = input.stream(0).unwrap();
    assert_eq!(stream.metadata().get("camera"), Some("depth"));
}
