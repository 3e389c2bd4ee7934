//! Benchmarks for the detection pipeline and signal conditioning

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opencv::core::{Mat, Point, Scalar, Size, CV_8UC3};
use opencv::imgproc;
use pupilometer::config::{DetectionConfig, SignalConfig};
use pupilometer::history::History;
use pupilometer::pupil_detection::PupilDetector;
use pupilometer::signal_filter::SignalConditioner;

fn synthetic_eye_frame() -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(200.0))
        .expect("frame allocation");
    imgproc::ellipse(
        &mut frame,
        Point::new(320, 240),
        Size::new(40, 30),
        0.0,
        0.0,
        360.0,
        Scalar::all(20.0),
        -1,
        imgproc::LINE_8,
        0,
    )
    .expect("ellipse drawing");
    frame
}

fn benchmark_detection(c: &mut Criterion) {
    let detector = PupilDetector::new(DetectionConfig::default());
    let frame = synthetic_eye_frame();

    c.bench_function("detect_full_frame", |b| {
        b.iter(|| detector.detect(black_box(&frame)).expect("detection"));
    });
}

fn benchmark_signal_conditioning(c: &mut Criterion) {
    // Noisy diameter stream with occasional dropouts
    let readings: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            if i % 37 == 0 {
                (0.0, 0.0)
            } else {
                let mm = 4.0 + 0.5 * (i as f64 * 0.1).sin() + 0.2 * rand::random::<f64>();
                (mm, mm * 18.0)
            }
        })
        .collect();

    c.bench_function("signal_conditioning_1k", |b| {
        b.iter(|| {
            let mut signal = SignalConditioner::new(&SignalConfig::default());
            for &(mm, px) in &readings {
                black_box(signal.process(mm, px));
            }
        });
    });
}

fn benchmark_report_build(c: &mut Criterion) {
    let mut history = History::new();
    for i in 0..5000 {
        let raw = if i % 11 == 0 { 0.0 } else { 4.0 + (i as f64 * 0.01).sin() };
        history.push(raw, raw, raw * 18.0);
    }

    c.bench_function("report_build_5k", |b| {
        b.iter(|| black_box(history.build_report(12, 18.0)));
    });
}

criterion_group!(
    benches,
    benchmark_detection,
    benchmark_signal_conditioning,
    benchmark_report_build
);
criterion_main!(benches);
