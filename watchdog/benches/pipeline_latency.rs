//! Per-frame pipeline latency
//!
//! ```bash
//! cargo bench -p watchdog --bench pipeline_latency
//! ```

use anomaly_scorer::{train, ModelBank, TrainerConfig};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use golden_features::{CanonicalRecord, Feature};
use link_layer::{encode_frame, Identity, RawFrame};
use telemetry_decoders::formats::bugsat1::{self, BugSat1Raw};
use watchdog::{build_pipeline, Pipeline, WatchdogConfig};

fn pipeline(with_model: bool) -> Pipeline {
    let identity = bugsat1::identity().unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut bank = ModelBank::default();
    if with_model {
        let records: Vec<CanonicalRecord> = (0..200)
            .map(|i| {
                let current = 0.1 + 0.001 * (i % 100) as f64;
                CanonicalRecord::new(identity, bugsat1::NORAD_ID, t0 + Duration::seconds(i))
                    .with(Feature::BattVoltage, 8.0 + 4.0 * (current - 0.1) + 0.01 * (i % 3) as f64)
                    .with(Feature::BattCurrent, current)
                    .with(Feature::TempObc, 10.0 + (i % 7) as f64 * 0.5)
            })
            .collect();
        let features = [Feature::BattVoltage, Feature::BattCurrent, Feature::TempObc];
        let artifact = train(identity, &features, &records, &TrainerConfig::default()).unwrap();
        bank.insert(artifact).unwrap();
    }

    build_pipeline(&WatchdogConfig::default(), bank).unwrap()
}

fn frame(corrupt: bool) -> RawFrame {
    let raw = BugSat1Raw {
        cpu_temp_raw: Some(105),
        ..BugSat1Raw::power(820, 15)
    };
    let dest: Identity = "CQ".parse().unwrap();
    let mut bytes = encode_frame(&dest, &bugsat1::identity().unwrap(), &raw.encode());
    if corrupt {
        bytes[20] ^= 0x01;
    }
    RawFrame::new(bytes, Utc::now())
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/process");

    for (name, with_model, corrupt) in [
        ("scored", true, false),
        ("decode_only", false, false),
        ("bad_fcs", true, true),
    ] {
        let p = pipeline(with_model);
        let f = frame(corrupt);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(p.process(black_box(&f))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
