/*!
    Stream probing for an opened container.
*/

use ffmpeg_next::{
    codec, ffi,
    format::{context::Input as InputContext, stream::Stream},
    media::Type,
};

use videoio_decode::StreamDecoder;
use videoio_runtime::convert::{
    codec_description, codec_name, metadata_from_dictionary, pixel_name, rational_from_ffmpeg,
    riff_video_tag,
};
use videoio_types::{Rational, StreamDescriptor, StreamKind, estimate_frame_count};

/**
    Container durations below this many seconds are treated as unknown.
*/
const MIN_CONTAINER_DURATION: f64 = 2.5e-5;

/**
    Describe one stream of an opened container.

    `decoder` is the decoder opened for the stream, if any; geometry and
    pixel format come from it when present.
*/
pub(crate) fn describe_stream(
    input: &InputContext,
    stream: &Stream<'_>,
    decoder: Option<&StreamDecoder>,
) -> StreamDescriptor {
    let parameters = stream.parameters();
    let kind = match parameters.medium() {
        Type::Video => StreamKind::Video,
        Type::Audio => StreamKind::Audio,
        _ => StreamKind::Other,
    };
    let id = parameters.id();

    // SAFETY: the parameters belong to a stream of the live input context.
    let (codec_tag, width, height, bit_rate, raw_aspect) = unsafe {
        let p = parameters.as_ptr();
        (
            (*p).codec_tag,
            (*p).width.max(0) as u32,
            (*p).height.max(0) as u32,
            (*p).bit_rate,
            (*p).sample_aspect_ratio,
        )
    };
    let stream_aspect = rational_from_ffmpeg(unsafe { (*stream.as_ptr()).sample_aspect_ratio }.into());
    let sample_aspect_ratio = if stream_aspect.num > 0 && stream_aspect.den > 0 {
        stream_aspect
    } else {
        rational_from_ffmpeg(raw_aspect.into())
    };

    let codec_description = match decoder {
        Some(decoder) => decoder.description(),
        None => codec::Context::from_parameters(stream.parameters())
            .map(|context| codec_description(&context, false))
            .unwrap_or_default(),
    };

    let time_base = rational_from_ffmpeg(stream.time_base());
    let avg_frame_rate = rational_from_ffmpeg(stream.avg_frame_rate());
    let frame_rate = pick_frame_rate(
        rational_from_ffmpeg(stream.rate()),
        decoder.map(|d| d.time_base()),
        avg_frame_rate,
    );
    let duration = stream_duration(input.duration(), stream.duration(), time_base);
    let frame_count = match u64::try_from(stream.frames()) {
        Ok(frames) if frames > 0 => frames,
        _ => estimate_frame_count(duration, frame_rate),
    };
    let (bit_rate_tolerance, gop_size, max_b_frames) =
        decoder.map(StreamDecoder::tuning).unwrap_or_default();

    StreamDescriptor {
        index: stream.index(),
        kind,
        codec_name: codec_name(id),
        codec_description,
        fourcc: riff_video_tag(id).unwrap_or(codec_tag),
        width: decoder.map_or(width, StreamDecoder::width),
        height: decoder.map_or(height, StreamDecoder::height),
        pixel_format: decoder.and_then(|d| pixel_name(d.format())).map(str::to_owned),
        time_base,
        frame_rate,
        avg_frame_rate,
        sample_aspect_ratio,
        duration,
        frame_count,
        bit_rate,
        bit_rate_tolerance,
        gop_size,
        max_b_frames,
        has_decoder: decoder.is_some(),
        metadata: metadata_from_dictionary(stream.metadata()),
    }
}

/**
    Nominal frame rate of a stream.

    The container's real base rate wins; otherwise the inverse of the
    decoder time base, then the average rate.
*/
pub(crate) fn pick_frame_rate(
    real: Rational,
    decoder_time_base: Option<Rational>,
    average: Rational,
) -> Rational {
    let usable = |r: &Rational| r.num > 0 && r.den > 0;
    if usable(&real) {
        return real;
    }
    if let Some(rate) = decoder_time_base.filter(usable).map(Rational::invert) {
        return rate;
    }
    if usable(&average) {
        average
    } else {
        Rational::new(0, 1)
    }
}

/**
    Duration in seconds from the container, falling back to the stream.
*/
pub(crate) fn stream_duration(container: i64, stream: i64, time_base: Rational) -> f64 {
    let seconds = container as f64 / f64::from(ffi::AV_TIME_BASE);
    if container != ffi::AV_NOPTS_VALUE && seconds >= MIN_CONTAINER_DURATION {
        return seconds;
    }
    if stream == ffi::AV_NOPTS_VALUE || stream <= 0 {
        return 0.0;
    }
    stream as f64 * time_base.to_f64()
}
