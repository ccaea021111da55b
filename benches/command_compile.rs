//! Benchmarks for job validation and command compilation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fj_av::job::{compile, filters, JobBuilder, StreamDestination};
use fj_core::{AudioCodec, ChannelLayout, SampleRate};
use std::path::Path;

fn file_job() -> JobBuilder {
    JobBuilder::new("/music/in.wav")
        .output("/music/out/track.mp3")
        .with_codec(AudioCodec::LibMp3Lame)
        .with_sample_rate(SampleRate::Hz44100)
        .with_channels(ChannelLayout::Stereo)
        .add_filter(filters::trim(10.0, 30.0))
        .add_filter(filters::resample(SampleRate::Hz44100))
        .with_metadata("title", "Track")
        .with_metadata("artist", "Someone")
}

fn stream_job() -> JobBuilder {
    JobBuilder::new("/music/in.wav")
        .as_live_source()
        .to_stream(StreamDestination::rtp("239.0.0.1", 5004))
        .with_codec(AudioCodec::LibOpus)
        .with_instant_startup()
        .save_sdp_to("/tmp/stream.sdp")
}

fn bench_compile(c: &mut Criterion) {
    let ffmpeg = Path::new("/usr/bin/ffmpeg");

    for (name, builder) in [("compile_file_job", file_job()), ("compile_stream_job", stream_job())] {
        let spec = builder.spec().clone();
        let target = spec.validate().unwrap();
        c.bench_function(name, |b| {
            b.iter(|| compile(black_box(&spec), ffmpeg, target.clone()))
        });
    }
}

fn bench_destination_parse(c: &mut Criterion) {
    c.bench_function("stream_destination_parse", |b| {
        b.iter(|| StreamDestination::parse(black_box("srt://10.0.0.5:9000?latency=200")))
    });
}

criterion_group!(benches, bench_compile, bench_destination_parse);
criterion_main!(benches);
