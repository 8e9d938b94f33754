use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intonation_core::{AudioFrame, EngineConfig, ReferenceSyllable, Session};

fn make_tone_frame(freq_hz: f64, sample_rate: u32, start: f64) -> AudioFrame {
    let len = EngineConfig::default().window_samples(sample_rate);
    let samples = (0..len)
        .map(|i| {
            let t = start + i as f64 / sample_rate as f64;
            (0.5 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as f32
        })
        .collect();
    AudioFrame::new(samples, sample_rate, start).unwrap()
}

fn bench_push_frame_44k(c: &mut Criterion) {
    let mut session = Session::new(EngineConfig::default()).unwrap();
    let frame = make_tone_frame(220.0, 44100, 0.0);

    c.bench_function("session_push_frame_44k_40ms", |b| {
        b.iter(|| {
            let _ = black_box(session.push_frame(black_box(&frame)));
        });
    });
}

fn bench_push_frame_16k(c: &mut Criterion) {
    let mut session = Session::new(EngineConfig::default()).unwrap();
    let frame = make_tone_frame(220.0, 16000, 0.0);

    c.bench_function("session_push_frame_16k_40ms", |b| {
        b.iter(|| {
            let _ = black_box(session.push_frame(black_box(&frame)));
        });
    });
}

fn bench_take_with_reference(c: &mut Criterion) {
    let frames: Vec<AudioFrame> = (0..50)
        .map(|i| make_tone_frame(200.0 + i as f64, 44100, i as f64 * 0.02))
        .collect();
    let reference = vec![
        ReferenceSyllable::new("a", 0.0, 0.4),
        ReferenceSyllable::new("b", 0.4, 0.9),
    ];

    c.bench_function("session_take_1s_with_reference", |b| {
        b.iter(|| {
            let mut session = Session::new(EngineConfig::default()).unwrap();
            session.set_reference(reference.clone());
            for frame in &frames {
                let _ = black_box(session.push_frame(frame));
            }
            black_box(session.summary())
        });
    });
}

criterion_group!(
    benches,
    bench_push_frame_44k,
    bench_push_frame_16k,
    bench_take_with_reference,
);
criterion_main!(benches);
