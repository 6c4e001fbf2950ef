//! 调度相关基准测试
//!
//! 测试到期判断、历史记录写入和统计计算的性能

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use uptime_sentinel::health::CheckResult;
use uptime_sentinel::monitor::{normalize_url, Monitor, MonitorStatus, Stats};

fn monitors(count: usize) -> Vec<Monitor> {
    (0..count)
        .map(|i| {
            let mut monitor = Monitor::new(&format!("site{i}.example.com/health"), None, 0);
            if i % 3 == 0 {
                monitor.interval = Some(30);
            }
            monitor.record_check(
                &CheckResult::new(MonitorStatus::Up, (i as i64) * 1_000)
                    .with_status_code(200)
                    .with_latency(i as u64 % 500),
            );
            monitor
        })
        .collect()
}

/// 到期选择基准测试
fn due_selection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("due_selection");
    for count in [100usize, 1_000, 10_000] {
        let monitors = monitors(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &monitors, |b, monitors| {
            b.iter(|| {
                let due = monitors
                    .iter()
                    .filter(|m| m.is_due(black_box(600_000), 3600))
                    .count();
                black_box(due)
            });
        });
    }
    group.finish();
}

/// 历史记录写入基准测试
fn record_check_benchmark(c: &mut Criterion) {
    c.bench_function("record_check_with_full_history", |b| {
        let mut monitor = Monitor::new("example.com", None, 0);
        let mut at = 0i64;
        b.iter(|| {
            at += 1;
            monitor.record_check(black_box(
                &CheckResult::new(MonitorStatus::Up, at)
                    .with_status_code(200)
                    .with_latency(120),
            ));
        });
    });

    c.bench_function("normalize_url", |b| {
        b.iter(|| black_box(normalize_url(black_box("Example.COM/status"))));
    });
}

/// 统计计算基准测试
fn stats_benchmark(c: &mut Criterion) {
    let monitors = monitors(1_000);
    c.bench_function("stats_from_1000_monitors", |b| {
        b.iter(|| black_box(Stats::from_monitors(black_box(&monitors))));
    });
}

criterion_group!(
    benches,
    due_selection_benchmark,
    record_check_benchmark,
    stats_benchmark
);
criterion_main!(benches);
