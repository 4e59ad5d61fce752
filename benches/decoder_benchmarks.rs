//! Decoder throughput over a realistic mix of zserv log lines
//!
//! Measures single-line decoding per rule family and whole-buffer parsing
//! through `LogParser`, which is what the tailer does on every poll.

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use zstack::decoder::LineDecoder;
use zstack::tailer::{system_clock, LogParser};

const MIXED_LOG: &[&str] = &[
    "map01: Entryway",
    "> Alice (10.0.0.1:10666) has connected.",
    "> Alice has joined the game.",
    "> Alice is now on the Red team.",
    "> Bob (10.0.0.2:10666) has connected.",
    "> Bob is now on the Blue team.",
    "> Alice has taken the Blue flag.",
    "> Alice was splattered by Bob's BFG.",
    "> Alice lost the Blue flag.",
    "> Bob returned the Blue flag.",
    "<Alice> > gg",
    "<<!> Ladna> > hi all",
    "> Bob fell too far.",
    "> RCON access for Bob is granted!",
    "1:  Alice (10.0.0.1:10666)",
    "\"sv_hostname\" is \"Friday CTF\"",
    "> Server is ready.",
    "W_GetNumForName: SKY3 not found",
];

fn bench_single_lines(c: &mut Criterion) {
    let decoder = LineDecoder::new();
    let now = Utc::now();
    let mut group = c.benchmark_group("decode_line");

    for (name, line) in [
        ("map_change", MIXED_LOG[0]),
        ("frag", MIXED_LOG[7]),
        ("chat", MIXED_LOG[11]),
        ("command_echo", MIXED_LOG[14]),
        ("junk", MIXED_LOG[17]),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &line, |b, line| {
            b.iter(|| decoder.decode(black_box(*line), now))
        });
    }
    group.finish();
}

fn bench_buffer_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_buffer");

    for repeats in [10usize, 100, 1000] {
        let mut log = String::new();
        for _ in 0..repeats {
            for line in MIXED_LOG {
                log.push_str(line);
                log.push('\n');
            }
        }
        let bytes = log.into_bytes();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(repeats), &bytes, |b, bytes| {
            b.iter(|| {
                let mut parser = LogParser::new(LineDecoder::new(), system_clock());
                black_box(parser.feed(bytes))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_lines, bench_buffer_parsing);
criterion_main!(benches);
