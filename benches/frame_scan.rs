//! Benchmarks for the frame scanner hot path
//!
//! Tracks the cost of resynchronizing and draining a serial read buffer:
//! - clean bursts of back-to-back report frames
//! - bursts interleaved with NMEA chatter the scanner must skip
//! - per-frame payload decode once framing is done
//!
//! Run with `cargo bench --features benchmark`.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use ubxlink::messages::Message;
use ubxlink::test_utils::{fix_pvt, nav_sat, nav_status, wire};
use ubxlink::FrameScanner;

const BURST_FRAMES: usize = 64;

fn report(index: usize) -> Message {
    match index % 3 {
        0 => Message::NavPvt(fix_pvt(376_551_811, -1_224_926_436)),
        1 => Message::NavSat(nav_sat(&[12, 48, 33, 27, 41, 9, 38, 22])),
        _ => Message::NavStatus(nav_status(true, 23_160)),
    }
}

/// Back-to-back frames, the way a healthy receiver streams them
fn clean_burst(frames: usize) -> Vec<u8> {
    let messages: Vec<Message> = (0..frames).map(report).collect();
    wire(&messages)
}

/// The same frames with an NMEA sentence wedged between each pair
fn noisy_burst(frames: usize) -> Vec<u8> {
    let sentence = b"$GPGSV,3,1,11,03,03,111,00,04,15,270,00*74\r\n";
    let mut stream = Vec::new();
    for index in 0..frames {
        stream.extend_from_slice(sentence);
        stream.extend(wire(&[report(index)]));
    }
    stream
}

fn drain(scanner: &mut FrameScanner) -> usize {
    let mut frames = 0;
    while let Some(frame) = scanner.next_frame() {
        black_box(frame);
        frames += 1;
    }
    frames
}

fn bench_burst_scan(c: &mut Criterion) {
    let clean = clean_burst(BURST_FRAMES);
    let noisy = noisy_burst(BURST_FRAMES);

    let mut group = c.benchmark_group("frame_scan");
    group.throughput(Throughput::Bytes(clean.len() as u64));

    group.bench_function("clean_burst", |b| {
        b.iter(|| {
            let mut scanner = FrameScanner::new();
            scanner.push(black_box(&clean));
            black_box(drain(&mut scanner))
        })
    });

    group.throughput(Throughput::Bytes(noisy.len() as u64));
    group.bench_function("nmea_interleaved", |b| {
        b.iter(|| {
            let mut scanner = FrameScanner::new();
            scanner.push(black_box(&noisy));
            black_box(drain(&mut scanner))
        })
    });

    group.finish();
}

fn bench_chunked_feed(c: &mut Criterion) {
    let stream = clean_burst(BURST_FRAMES);

    let mut group = c.benchmark_group("serial_chunks");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    // Mimics draining after every small serial read
    group.bench_function("push_64b_chunks", |b| {
        b.iter(|| {
            let mut scanner = FrameScanner::new();
            let mut frames = 0;
            for chunk in stream.chunks(64) {
                scanner.push(black_box(chunk));
                frames += drain(&mut scanner);
            }
            black_box(frames)
        })
    });

    group.finish();
}

fn bench_frame_codec(c: &mut Criterion) {
    let pvt = report(0).to_frame();
    let sat = report(1).to_frame();
    let encoded = pvt.encode();

    let mut group = c.benchmark_group("frame_codec");
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode_nav_pvt", |b| {
        b.iter(|| black_box(black_box(&pvt).encode()))
    });

    group.bench_function("decode_nav_pvt", |b| {
        b.iter(|| black_box(Message::from_frame(black_box(&pvt))))
    });

    group.bench_function("decode_nav_sat", |b| {
        b.iter(|| black_box(Message::from_frame(black_box(&sat))))
    });

    group.finish();
}

criterion_group!(benches, bench_burst_scan, bench_chunked_feed, bench_frame_codec);
criterion_main!(benches);
