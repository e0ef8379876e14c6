use criterion::{Criterion, criterion_group, criterion_main};
use relaylog::config::{ConsoleConfig, RollingFileConfig};
use relaylog::level::Level;
use relaylog::output::{ConsoleOutput, Output, RollingFileOutput};
use relaylog::{LogRecord, ProcessIdentity};
use serde_json::json;
use std::hint::black_box;
use tempfile::TempDir;

fn make_record() -> LogRecord {
    let identity = ProcessIdentity::new("bench-host", "10.0.0.2", "bench", "bench-app", 4242);
    LogRecord::new(
        &identity,
        "master.bench",
        Level::Info,
        json!({"msg": "benchmark log message", "requestId": "a1b2c3", "ms": 12}),
    )
}

fn bench_rolling_file_write(c: &mut Criterion) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let config = RollingFileConfig {
        auto_archive: false,
        log_dir: tmp.path().to_string_lossy().to_string(),
        max_size_mb: 0,
        ..RollingFileConfig::default()
    };
    let output = RollingFileOutput::new(&config).expect("failed to create output");
    let record = make_record();
    let line = record.to_json_line().expect("serialize failed");

    c.bench_function("RollingFileOutput::write", |b| {
        b.iter(|| {
            output
                .write(Level::Info, black_box(&line), black_box(&record))
                .expect("write failed");
        });
    });

    output.end();
}

fn bench_record_serialize(c: &mut Criterion) {
    let record = make_record();

    c.bench_function("LogRecord::to_json_line", |b| {
        b.iter(|| black_box(&record).to_json_line().expect("serialize failed"));
    });
}

fn bench_console_render(c: &mut Criterion) {
    let output = ConsoleOutput::new(&ConsoleConfig::default());
    let record = make_record();

    c.bench_function("ConsoleOutput::render_record", |b| {
        b.iter(|| output.render_record(black_box(&record)).expect("render failed"));
    });
}

criterion_group!(
    benches,
    bench_rolling_file_write,
    bench_record_serialize,
    bench_console_render,
);
criterion_main!(benches);
