//! Sequencer playback tests
//!
//! `SimClock::new(48)` advances 1 ms every 48 clock reads. The playback
//! loop reads the clock once per sample, so a note runs at exactly 48 kHz.

use std::time::Duration;

use dds_tonegen::audio::{Channel, SinkError};
use dds_tonegen::dds::{
    sfx, Amplitude, CancelToken, PitchClass, PlayState, ToneError, ToneSequencer, WritePolicy,
};
use dds_tonegen::fault::{FaultCode, FaultState};
use dds_tonegen::logging::{LogLevel, LogStream};
use dds_tonegen::sim::{
    estimate_frequency_hz, mean_spacing, rising_zero_crossings, zero_crossings, CaptureSink,
    SimClock,
};

const READS_PER_MS: u64 = 48;

type Seq<'a> = ToneSequencer<'a, SimClock, &'a mut CaptureSink>;

fn sequencer<'a>(clock: &'a SimClock, sink: &'a mut CaptureSink) -> Seq<'a> {
    ToneSequencer::new(clock, sink, WritePolicy::DropOnBackpressure).unwrap()
}

#[test]
fn test_a4_sample_count_and_period() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();

    let report = sequencer(&clock, &mut sink).play_note(PitchClass::A, 4, 125).unwrap();

    assert_eq!(report.state, PlayState::Completed);
    assert_eq!(report.samples, 125 * 48 - 1);
    assert_eq!(report.elapsed_ms, 125);
    assert_eq!(report.dropped, 0);
    assert_eq!(sink.left.len(), report.samples as usize);

    // 48000 / 440 = 109.09 samples per cycle
    let cycle = mean_spacing(&rising_zero_crossings(&sink.left)).unwrap();
    assert!((cycle - 109.09).abs() < 0.5, "cycle = {}", cycle);

    let half = mean_spacing(&zero_crossings(&sink.left)).unwrap();
    assert!((half - 54.55).abs() < 0.5, "half cycle = {}", half);
}

#[test]
fn test_both_channels_identical() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();

    sequencer(&clock, &mut sink).play_note(PitchClass::E, 4, 20).unwrap();

    assert!(!sink.left.is_empty());
    assert_eq!(sink.samples(Channel::Left), sink.samples(Channel::Right));
}

#[test]
fn test_peak_bounded_by_reference() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();

    sequencer(&clock, &mut sink).play_note(PitchClass::A, 4, 50).unwrap();

    let peak = sink.left.iter().map(|s| s.abs()).max().unwrap();
    assert!(peak <= 26_843_545);
    assert!(peak > 26_800_000);
}

#[test]
fn test_octave_up_doubles_frequency() {
    let clock = SimClock::new(READS_PER_MS);

    let mut low = CaptureSink::new();
    sequencer(&clock, &mut low).play_note(PitchClass::C, 4, 125).unwrap();
    let mut high = CaptureSink::new();
    sequencer(&clock, &mut high).play_note(PitchClass::C, 5, 125).unwrap();

    let f_low = estimate_frequency_hz(&low.left, 48_000).unwrap();
    let f_high = estimate_frequency_hz(&high.left, 48_000).unwrap();
    assert!((f_low - 261.63).abs() < 1.0, "C4 = {}", f_low);
    assert!((f_high / f_low - 2.0).abs() < 0.01, "ratio = {}", f_high / f_low);
}

#[test]
fn test_elapsed_within_one_tick_of_duration() {
    for duration in [1, 10, 125, 200] {
        let clock = SimClock::new(READS_PER_MS);
        let mut sink = CaptureSink::new();
        let report = sequencer(&clock, &mut sink)
            .play_note(PitchClass::G, 3, duration)
            .unwrap();
        assert!(report.elapsed_ms >= duration && report.elapsed_ms <= duration + 1);
    }
}

#[test]
fn test_zero_duration_emits_nothing() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();

    let report = sequencer(&clock, &mut sink).play_note(PitchClass::C, 4, 0).unwrap();

    assert_eq!(report.state, PlayState::Completed);
    assert_eq!(report.samples, 0);
    assert!(sink.left.is_empty());
}

#[test]
fn test_playback_across_tick_wrap() {
    let clock = SimClock::starting_at(u32::MAX - 10, READS_PER_MS);
    let mut sink = CaptureSink::new();

    let report = sequencer(&clock, &mut sink).play_note(PitchClass::A, 4, 50).unwrap();

    assert_eq!(report.state, PlayState::Completed);
    assert_eq!(report.elapsed_ms, 50);
    assert_eq!(report.samples, 50 * 48 - 1);
}

#[test]
fn test_invalid_frequency_rejected() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();
    let mut seq = sequencer(&clock, &mut sink);

    assert_eq!(seq.play_frequency(0.0, 10).unwrap_err(), ToneError::InvalidFrequency);
    assert_eq!(seq.play_frequency(24_000.0, 10).unwrap_err(), ToneError::InvalidFrequency);
    assert!(seq.sink().left.is_empty());
}

#[test]
fn test_amplitude_checked_against_sink_width() {
    let clock = SimClock::new(READS_PER_MS);

    let narrow = CaptureSink::new().with_sample_bits(24);
    assert!(matches!(
        ToneSequencer::new(&clock, narrow, WritePolicy::default()),
        Err(ToneError::AmplitudeOutOfRange)
    ));

    let narrow = CaptureSink::new().with_sample_bits(24);
    let amplitude = Amplitude::for_sample_bits(24, 0.8);
    let mut seq =
        ToneSequencer::new_with_amplitude(&clock, narrow, WritePolicy::default(), amplitude)
            .unwrap();
    seq.play_note(PitchClass::A, 4, 10).unwrap();

    let max = Amplitude::max_for_bits(24) as i32;
    assert!(seq.sink().left.iter().all(|s| s.abs() <= max));
}

#[test]
fn test_drop_policy_counts_each_failure() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new().fail_every(10);

    let report = sequencer(&clock, &mut sink).play_note(PitchClass::A, 4, 125).unwrap();

    let attempts = u64::from(report.samples) * 2;
    assert_eq!(sink.attempts(), attempts);
    assert_eq!(u64::from(report.dropped), attempts / 10);
    assert_eq!(report.retries, 0);
    assert_eq!(report.delivered + report.dropped, report.samples * 2);
    assert_eq!(report.last_error, Some(SinkError::FifoFull));
    // Dropped samples are skipped, not delayed
    assert_eq!(report.elapsed_ms, 125);
}

#[test]
fn test_retry_policy_delivers_every_sample() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new().fail_every(10);

    let mut seq = ToneSequencer::new(&clock, &mut sink, WritePolicy::RetryWithBudget(2)).unwrap();
    let report = seq.play_note(PitchClass::A, 4, 50).unwrap();

    assert_eq!(report.dropped, 0);
    assert!(report.retries > 0);
    assert_eq!(report.delivered, report.samples * 2);
    assert_eq!(sink.left.len(), sink.right.len());
    assert_eq!(sink.left.len(), report.samples as usize);
}

#[test]
fn test_retry_budget_exhausted_drops() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();
    sink.set_full(true);

    let mut seq = ToneSequencer::new(&clock, &mut sink, WritePolicy::RetryWithBudget(3)).unwrap();
    let report = seq.play_note(PitchClass::A, 4, 2).unwrap();

    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, report.samples * 2);
    assert_eq!(report.retries, report.samples * 2 * 3);
}

#[test]
fn test_not_initialized_never_retried() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::uninitialized();
    let fault = FaultState::new();

    let mut seq = ToneSequencer::new(&clock, &mut sink, WritePolicy::RetryWithBudget(100))
        .unwrap()
        .with_fault_state(&fault);
    let report = seq.play_note(PitchClass::C, 4, 5).unwrap();

    assert_eq!(report.state, PlayState::Completed);
    assert_eq!(report.retries, 0);
    assert_eq!(report.dropped, report.samples * 2);
    assert_eq!(report.last_error, Some(SinkError::NotInitialized));
    assert!(sink.left.is_empty());

    assert!(fault.is_active());
    assert_eq!(fault.code(), FaultCode::SinkNotInitialized);
    assert_eq!(fault.dropped(), report.dropped);
}

#[test]
fn test_backpressure_sets_fault() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new().fail_every(4);
    let fault = FaultState::new();

    sequencer(&clock, &mut sink)
        .with_fault_state(&fault)
        .play_note(PitchClass::A, 4, 5)
        .unwrap();

    assert_eq!(fault.code(), FaultCode::Backpressure);
    assert!(fault.dropped() > 0);
}

#[test]
fn test_clean_playback_leaves_fault_clear() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();
    let fault = FaultState::new();

    sequencer(&clock, &mut sink)
        .with_fault_state(&fault)
        .play_note(PitchClass::A, 4, 5)
        .unwrap();

    assert!(!fault.is_active());
}

#[test]
fn test_sequence_plays_notes_in_order() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();

    let report = sequencer(&clock, &mut sink).play_sequence(&sfx::SFX2).unwrap();

    assert_eq!(report.completed, 3);
    assert!(!report.cancelled);
    assert_eq!(report.dropped, 0);

    // 450 ms at 48 kHz, give or take one tick per note boundary
    let expected = 450 * 48;
    assert!(report.samples <= expected && report.samples >= expected - 3 * 48);
    assert_eq!(sink.left.len(), report.samples as usize);

    // First note (C4) is lower than the last (C5)
    let first = estimate_frequency_hz(&sink.left[..5000], 48_000).unwrap();
    let last = estimate_frequency_hz(&sink.left[sink.left.len() - 9000..], 48_000).unwrap();
    assert!((first - 261.63).abs() < 2.0, "first = {}", first);
    assert!((last - 523.26).abs() < 2.0, "last = {}", last);
}

#[test]
fn test_cancel_before_start() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();
    let token = CancelToken::new();
    token.cancel();

    let report = sequencer(&clock, &mut sink)
        .with_cancel(&token)
        .play_sequence(&sfx::SFX1)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.completed, 0);
    assert_eq!(report.samples, 0);
    assert!(sink.left.is_empty());
}

#[test]
fn test_cancel_from_another_thread() {
    // Clock never reaches the duration on its own
    let clock = SimClock::new(u64::MAX);
    let mut sink = CaptureSink::new();
    let token = CancelToken::new();

    let report = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        sequencer(&clock, &mut sink)
            .with_cancel(&token)
            .play_note(PitchClass::A, 4, 1000)
            .unwrap()
    });

    assert_eq!(report.state, PlayState::Cancelled);
    assert!(report.samples > 0);
    assert_eq!(sink.left.len(), report.samples as usize);
}

#[test]
fn test_logs_note_summary() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new();
    let log: LogStream = LogStream::new();

    sequencer(&clock, &mut sink)
        .with_log(&log)
        .play_note(PitchClass::A, 4, 10)
        .unwrap();

    let mut lines = Vec::new();
    log.drain_each(|e| lines.push((e.level, e.text().to_string())));
    assert_eq!(lines.len(), 1, "debug start line is filtered at Info");
    assert_eq!(lines[0].0, LogLevel::Info);
    assert!(lines[0].1.contains("Completed"));
    assert!(lines[0].1.contains("479 samples"));
}

#[test]
fn test_logs_drops_as_warning() {
    let clock = SimClock::new(READS_PER_MS);
    let mut sink = CaptureSink::new().fail_every(2);
    let log: LogStream = LogStream::new();
    log.set_level(LogLevel::Debug);

    sequencer(&clock, &mut sink)
        .with_log(&log)
        .play_note(PitchClass::A, 4, 10)
        .unwrap();

    let mut levels = Vec::new();
    log.drain_each(|e| levels.push(e.level));
    assert_eq!(levels, [LogLevel::Debug, LogLevel::Warn, LogLevel::Info]);
}
