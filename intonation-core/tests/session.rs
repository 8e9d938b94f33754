use intonation_core::{AudioFrame, EngineConfig, ReferenceSyllable, Session, Unvoiced};

const SR: u32 = 44100;
const HOP: f64 = 0.02;

fn window_len() -> usize {
    EngineConfig::default().window_samples(SR)
}

/// A frame of a continuous-phase tone starting at `start` seconds.
fn tone_frame(freq: f32, amplitude: f32, start: f64) -> AudioFrame {
    let samples = (0..window_len())
        .map(|i| {
            let t = start + i as f64 / SR as f64;
            ((2.0 * std::f64::consts::PI * freq as f64 * t).sin() as f32) * amplitude
        })
        .collect();
    AudioFrame::new(samples, SR, start).unwrap()
}

fn silent_frame(start: f64) -> AudioFrame {
    AudioFrame::new(vec![0.0; window_len()], SR, start).unwrap()
}

fn noise_frame(seed: u32, start: f64) -> AudioFrame {
    let mut state = seed;
    let samples = (0..window_len())
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.6
        })
        .collect();
    AudioFrame::new(samples, SR, start).unwrap()
}

fn session() -> Session {
    Session::new(EngineConfig::default()).unwrap()
}

#[test]
fn test_tones_across_four_octaves() {
    for freq in [100.0f32, 200.0, 400.0, 800.0] {
        let mut s = session();
        let point = s.push_frame(&tone_frame(freq, 0.5, 0.0));
        let est = point.estimate;
        assert!(est.voiced, "freq={} {:?}", freq, est);
        assert!(est.confidence > s.config().confidence_threshold);
        let err = (est.frequency_hz - freq).abs() / freq;
        assert!(err < 0.02, "freq={} got={}", freq, est.frequency_hz);
    }
}

#[test]
fn test_silence_reports_zero() {
    let mut s = session();
    let est = s.push_frame(&silent_frame(0.0)).estimate;
    assert!(!est.voiced);
    assert_eq!(est.frequency_hz, 0.0);
    assert_eq!(est.confidence, 0.0);
}

#[test]
fn test_noise_is_unvoiced() {
    let mut s = session();
    for i in 0..5 {
        let est = s.push_frame(&noise_frame(11 + i, i as f64 * HOP)).estimate;
        assert!(!est.voiced, "{:?}", est);
        assert_eq!(est.frequency_hz, 0.0);
    }
}

#[test]
fn test_noise_is_rejected_on_confidence() {
    let mut s = session();
    let frames = 40;
    let mut low_confidence = 0;
    for i in 0..frames {
        let est = s.push_frame(&noise_frame(101 + i, i as f64 * HOP)).estimate;
        assert!(!est.voiced, "{:?}", est);
        if est.unvoiced_reason == Some(Unvoiced::LowConfidence) {
            low_confidence += 1;
        }
    }
    assert!(low_confidence >= frames / 4, "low_confidence={}", low_confidence);
}

#[test]
fn test_tone_above_ceiling_is_out_of_range() {
    let sr = 16000;
    let samples: Vec<f32> = (0..640)
        .map(|i| (2.0 * std::f32::consts::PI * 1010.0 * i as f32 / sr as f32).sin() * 0.5)
        .collect();
    let est = session().push_samples(&samples, sr, 0.0).unwrap().estimate;
    assert!(!est.voiced);
    assert_eq!(est.frequency_hz, 0.0);
    assert_eq!(est.unvoiced_reason, Some(Unvoiced::OutOfRangeFrequency));
}

#[test]
fn test_short_frames_are_insufficient() {
    let mut s = session();
    let est = s.push_samples(&[0.3; 800], SR, 0.0).unwrap().estimate;
    assert_eq!(est.unvoiced_reason, Some(Unvoiced::InsufficientData));
}

#[test]
fn test_track_never_jumps_more_than_max_change() {
    let mut s = session();
    let max_change = s.config().max_change_fraction;
    let mut prev: Option<f32> = None;
    for i in 0..30 {
        let freq = if i % 3 == 0 { 300.0 } else { 200.0 };
        let est = s.push_frame(&tone_frame(freq, 0.5, i as f64 * HOP)).estimate;
        assert!(est.voiced, "frame {} {:?}", i, est);
        if let Some(p) = prev {
            let change = (est.frequency_hz - p).abs();
            assert!(change <= p * max_change + 1e-3, "frame {}: {} -> {}", i, p, est.frequency_hz);
        }
        prev = Some(est.frequency_hz);
    }
}

#[test]
fn test_brief_dip_does_not_split_segment() {
    // -45 dBFS RMS sits between the onset (-40) and offset (-50) levels.
    let dip_amplitude = std::f32::consts::SQRT_2 * 10f32.powf(-45.0 / 20.0);
    let mut s = session();
    let mut t = 0.0;
    for amplitude in [[0.5; 6].as_slice(), &[dip_amplitude; 3], &[0.5; 6]].concat() {
        s.push_frame(&tone_frame(200.0, amplitude, t));
        t += HOP;
    }
    s.push_frame(&silent_frame(t));

    assert_eq!(s.segments().len(), 1);
    assert!(s.segments()[0].end.is_some());
}

/// Syllable "A" is spoken 1.2x slower than the reference, then "B" starts
/// after one silent hop.
fn two_syllable_take() -> Session {
    let mut s = session();
    s.set_reference(vec![
        ReferenceSyllable::new("A", 0.0, 0.3),
        ReferenceSyllable::new("B", 0.3, 0.6),
    ]);
    for i in 0..18 {
        s.push_frame(&tone_frame(220.0, 0.5, i as f64 * HOP));
    }
    s.push_frame(&silent_frame(0.36));
    for i in 19..30 {
        s.push_frame(&tone_frame(247.0, 0.5, i as f64 * HOP));
    }
    s
}

#[test]
fn test_time_warp_through_session() {
    let s = two_syllable_take();
    let segments = s.segments();
    assert_eq!(segments.len(), 2);
    assert!((segments[0].start - 0.0).abs() < 1e-9);
    assert!((segments[0].end.unwrap() - 0.36).abs() < 1e-9);
    assert!((segments[1].start - 0.38).abs() < 1e-9);
    assert!(segments[1].is_open());

    let mid_a = s.map_time(0.18).unwrap();
    assert!((mid_a - 0.15).abs() < 1e-6, "mid_a={}", mid_a);
    let mid_b = s.map_time(0.38 + 0.15).unwrap();
    assert!((mid_b - 0.45).abs() < 1e-6, "mid_b={}", mid_b);
}

#[test]
fn test_mapping_is_monotonic() {
    let s = two_syllable_take();
    let mut prev = f64::NEG_INFINITY;
    for i in 0..100 {
        let mapped = s.map_time(i as f64 * 0.01).unwrap();
        assert!(mapped >= prev - 1e-12, "t={} mapped={} prev={}", i as f64 * 0.01, mapped, prev);
        prev = mapped;
    }
}

#[test]
fn test_live_points_carry_mapped_time() {
    let mut s = session();
    s.set_reference(vec![ReferenceSyllable::new("A", 0.0, 0.4)]);
    let first = s.push_frame(&tone_frame(200.0, 0.5, 0.0));
    assert_eq!(first.mapped_time, Some(0.0));
    let second = s.push_frame(&tone_frame(200.0, 0.5, 0.1));
    assert!((second.mapped_time.unwrap() - 0.1).abs() < 1e-9);
}

#[test]
fn test_empty_reference_means_no_mapping() {
    let mut s = session();
    s.set_reference(Vec::new());
    let point = s.push_frame(&tone_frame(200.0, 0.5, 0.0));
    assert_eq!(point.mapped_time, None);
    assert_eq!(s.time_warp().map(0.25), 0.25);
}

#[test]
fn test_reset_clears_history() {
    for use_set_reference in [false, true] {
        let mut s = session();
        for i in 0..5 {
            s.push_frame(&tone_frame(200.0, 0.5, i as f64 * HOP));
        }
        if use_set_reference {
            s.set_reference(vec![ReferenceSyllable::new("A", 0.0, 0.3)]);
        } else {
            s.reset();
        }
        assert!(s.segments().is_empty());
        assert_eq!(s.summary().frames, 0);

        // With history, 300 Hz right after 200 Hz would be clamped to 240 Hz.
        let est = s.push_frame(&tone_frame(300.0, 0.5, 0.0)).estimate;
        assert!(est.voiced);
        assert!((est.frequency_hz - 300.0).abs() < 6.0, "got={}", est.frequency_hz);
    }
}

#[test]
fn test_sessions_do_not_share_state() {
    let mut a = session();
    let mut b = session();
    for i in 0..5 {
        a.push_frame(&tone_frame(200.0, 0.5, i as f64 * HOP));
    }
    let est = b.push_frame(&tone_frame(300.0, 0.5, 0.0)).estimate;
    assert!((est.frequency_hz - 300.0).abs() < 6.0);
    assert!(b.segments().len() == 1 && a.segments().len() == 1);
}
