//! Benchmarks for relaykit packet encoding and framing

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relaykit::protocol::{write_frame, Message, Packet, PacketCodec, StringMap, Value};

fn sample_message() -> Message {
    Message::new("player-update")
        .with(Value::U32(42))
        .with(Value::F32(12.5))
        .with(Value::F32(-3.25))
        .with(Value::Str("Madeline".to_string()))
        .with(Value::Bool(true))
}

fn codec_benchmarks(c: &mut Criterion) {
    let codec = PacketCodec::new(4096);
    let packet: Packet = sample_message().into();

    c.bench_function("encode_message_interned", |b| {
        let mut strings = StringMap::new(1024, 2);
        let mut scratch = BytesMut::with_capacity(4096);
        b.iter(|| {
            scratch.clear();
            codec.encode(black_box(&packet), &mut strings, &mut scratch).unwrap();
        })
    });

    c.bench_function("encode_message_literal", |b| {
        let mut strings = StringMap::disabled();
        let mut scratch = BytesMut::with_capacity(4096);
        b.iter(|| {
            scratch.clear();
            codec.encode(black_box(&packet), &mut strings, &mut scratch).unwrap();
        })
    });

    let blob = codec.preserialize(&sample_message()).unwrap();
    c.bench_function("encode_blob", |b| {
        let mut strings = StringMap::disabled();
        let mut scratch = BytesMut::with_capacity(4096);
        b.iter(|| {
            scratch.clear();
            codec.encode(black_box(&blob), &mut strings, &mut scratch).unwrap();
        })
    });

    c.bench_function("write_frame_batch_64", |b| {
        let mut strings = StringMap::new(1024, 2);
        let mut scratch = BytesMut::with_capacity(4096);
        let mut out = Vec::with_capacity(64 * 64);
        b.iter(|| {
            out.clear();
            for _ in 0..64 {
                scratch.clear();
                codec.encode(&packet, &mut strings, &mut scratch).unwrap();
                write_frame(&mut out, &scratch).unwrap();
            }
            black_box(out.len())
        })
    });
}

criterion_group!(benches, codec_benchmarks);
criterion_main!(benches);
