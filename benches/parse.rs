use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

const LINES: [&str; 4] = [
    "KEY=value\n",
    "export QUOTED=\"hello world\" # comment\n",
    "  PADDED  =  padded trailing words\n",
    "# just a comment\n",
];

fn bench_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_key_value");
    for line in LINES {
        let line = line.trim_end();
        group.bench_with_input(BenchmarkId::from_parameter(line), line, |b, line| {
            b.iter(|| envline::parse_key_value(black_box(line)));
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_str");
    for size in [1_024usize, 10_240, 102_400] {
        let input = make_input(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| envline::parse_str(black_box(input)).expect("parse should succeed"));
        });
    }
    group.finish();
}

fn make_input(bytes: usize) -> String {
    let mut out = String::with_capacity(bytes + 64);
    let mut idx = 0usize;
    while out.len() < bytes {
        out.push_str(&LINES[idx % LINES.len()].replace("KEY", &format!("KEY_{idx}")));
        idx += 1;
    }
    out
}

criterion_group!(benches, bench_parse_line, bench_parse);
criterion_main!(benches);
