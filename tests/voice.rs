//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use persona_voicebot::config::ListenConfig;
use persona_voicebot::voice::{
    CHUNK_SAMPLES, ListenerState, PhraseDetector, PhraseEvent, SAMPLE_RATE, play_then_discard,
    samples_to_wav, write_speech_file,
};
use persona_voicebot::Error;

/// One chunk of constant-amplitude audio
fn chunk(amplitude: f32) -> Vec<f32> {
    vec![amplitude; CHUNK_SAMPLES]
}

fn silence() -> Vec<f32> {
    chunk(0.0)
}

fn speech() -> Vec<f32> {
    chunk(0.5)
}

/// Feed ambient audio until calibration ends
///
/// The chunk that ends calibration is already counted as waiting time.
fn calibrate(detector: &mut PhraseDetector, ambient: f32) {
    while detector.state() == ListenerState::Calibrating {
        assert_eq!(detector.push(&chunk(ambient)), PhraseEvent::Pending);
    }
}

fn default_detector() -> PhraseDetector {
    PhraseDetector::new(ListenConfig::default(), SAMPLE_RATE)
}

#[test]
fn test_detector_starts_calibrating() {
    let detector = default_detector();
    assert_eq!(detector.state(), ListenerState::Calibrating);
    assert!((detector.threshold().level() - 300.0).abs() < f32::EPSILON);
}

#[test]
fn test_phrase_completes_after_pause() {
    let mut detector = default_detector();
    calibrate(&mut detector, 0.0);

    for _ in 0..10 {
        assert_eq!(detector.push(&silence()), PhraseEvent::Pending);
    }
    for _ in 0..20 {
        assert_eq!(detector.push(&speech()), PhraseEvent::Pending);
    }
    assert_eq!(detector.state(), ListenerState::Capturing);

    let mut result = PhraseEvent::Pending;
    for _ in 0..14 {
        result = detector.push(&silence());
        if result != PhraseEvent::Pending {
            break;
        }
    }

    // 8 chunks of lead-in (ending with the first loud chunk), 19 more loud
    // chunks, and 8 of the 14 trailing silent chunks
    match result {
        PhraseEvent::Complete(phrase) => assert_eq!(phrase.len(), 35 * CHUNK_SAMPLES),
        other => panic!("expected a phrase, got {other:?}"),
    }
}

#[test]
fn test_silence_times_out_after_start_window() {
    let mut detector = default_detector();
    calibrate(&mut detector, 0.0);
    let mut waited = 1;

    loop {
        match detector.push(&silence()) {
            PhraseEvent::Pending => waited += 1,
            PhraseEvent::TimedOut => break,
            PhraseEvent::Complete(_) => panic!("silence produced a phrase"),
        }
        assert!(waited < 1000, "never timed out");
    }

    #[allow(clippy::cast_precision_loss)]
    let secs = (waited * CHUNK_SAMPLES) as f32 / SAMPLE_RATE as f32;
    assert!((9.5..=10.5).contains(&secs), "timed out after {secs}s");
}

#[test]
fn test_short_blip_is_discarded() {
    let mut detector = default_detector();
    calibrate(&mut detector, 0.0);

    for _ in 0..3 {
        detector.push(&speech());
    }
    assert_eq!(detector.state(), ListenerState::Capturing);

    for _ in 0..14 {
        assert_eq!(detector.push(&silence()), PhraseEvent::Pending);
    }
    assert_eq!(detector.state(), ListenerState::Waiting);

    // The start timeout keeps running across the discarded blip
    let mut outcome = PhraseEvent::Pending;
    for _ in 0..200 {
        outcome = detector.push(&silence());
        if outcome != PhraseEvent::Pending {
            break;
        }
    }
    assert_eq!(outcome, PhraseEvent::TimedOut);
}

#[test]
fn test_phrase_limit_cuts_long_speech() {
    let mut detector = default_detector();
    calibrate(&mut detector, 0.0);

    for _ in 0..10 {
        detector.push(&silence());
    }

    let mut pushed = 0;
    let phrase = loop {
        pushed += 1;
        match detector.push(&speech()) {
            PhraseEvent::Pending => {}
            PhraseEvent::Complete(phrase) => break phrase,
            PhraseEvent::TimedOut => panic!("timed out while speaking"),
        }
        assert!(pushed < 1000, "phrase never ended");
    };

    #[allow(clippy::cast_precision_loss)]
    let secs = phrase.len() as f32 / SAMPLE_RATE as f32;
    assert!((7.0..8.0).contains(&secs), "phrase lasted {secs}s");
}

#[test]
fn test_threshold_calibrates_to_room_noise() {
    let mut detector = default_detector();
    let hum = 0.0305;

    calibrate(&mut detector, hum);
    assert!(detector.threshold().level() > 1000.0);

    for _ in 0..50 {
        assert_eq!(detector.push(&chunk(hum)), PhraseEvent::Pending);
    }
    assert_eq!(detector.state(), ListenerState::Waiting);

    detector.push(&speech());
    assert_eq!(detector.state(), ListenerState::Capturing);
}

#[test]
fn test_captured_phrase_encodes_as_wav() {
    let mut detector = default_detector();
    calibrate(&mut detector, 0.0);

    for _ in 0..10 {
        detector.push(&speech());
    }
    let phrase = loop {
        if let PhraseEvent::Complete(phrase) = detector.push(&silence()) {
            break phrase;
        }
    };

    let wav = samples_to_wav(&phrase, SAMPLE_RATE).unwrap();
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();

    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as usize, phrase.len());
}

#[test]
fn test_speech_file_removed_even_when_playback_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_speech_file(b"not really mp3", dir.path()).unwrap();
    let path = file.path().to_path_buf();

    let result = play_then_discard(file, |p| {
        assert!(p.exists());
        Err(Error::Audio("no output device available".to_string()))
    });

    assert!(result.is_err());
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
