//! Projection tests driven through encoded datagrams
//!
//! Each test builds the bytes a device would send, decodes them with the
//! codec and checks the events and state the projector produces.

use osc_codec::{decode, encode, Argument, Message};
use proptest::prelude::*;
use rstest::rstest;
use show_state::{
    DeviceKind, MeterTap, Projector, ShowEvent, StateStore, TimerPhase, TimerValue,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn projector() -> Projector {
    Projector::new(StateStore::new())
}

/// Bytes of an X32 `meters/6` datagram carrying `samples`.
fn meter_datagram(samples: &[f32]) -> Vec<u8> {
    let mut blob = (samples.len() as i32).to_le_bytes().to_vec();
    for s in samples {
        blob.extend_from_slice(&s.to_le_bytes());
    }
    let mut packet = b"/meters/6\0\0\0,b\0\0".to_vec();
    packet.extend_from_slice(&(blob.len() as i32).to_be_bytes());
    packet.extend_from_slice(&blob);
    packet
}

fn over_the_wire(message: Message) -> Message {
    decode(&encode(&message).unwrap()).into_message()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every fader report is published, rounded to three decimals.
    #[test]
    fn prop_fader_levels_rounded(level in 0.0f32..=1.0f32, channel in 1u8..=32) {
        let projector = projector();
        let message = over_the_wire(
            Message::new(["ch".to_string(), format!("{channel:02}"), "mix".into(), "fader".into()])
                .with_arg(level),
        );

        let events = projector.mixer(&message, Some(channel));
        prop_assert_eq!(events.len(), 1);
        let ShowEvent::LevelChanged { value } = &events[0] else {
            return Err(TestCaseError::fail("expected level-changed"));
        };
        prop_assert!((0.0..=1.0).contains(value));
        prop_assert!(((value * 1000.0).round() - value * 1000.0).abs() < 1e-6);
    }

    /// Repeated ticks are all published; repeated phases only once.
    #[test]
    fn prop_timer_ticks_always_published(ticks in prop::collection::vec(0i32..3600, 1..20)) {
        let projector = projector();
        for tick in &ticks {
            let events = projector.timer(&Message::new(["state"]).with_arg(*tick));
            prop_assert_eq!(events.len(), 1);
        }
        let paused = Message::new(["state"]).with_arg("paused");
        prop_assert_eq!(projector.timer(&paused).len(), 1);
        prop_assert_eq!(projector.timer(&paused).len(), 0);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[rstest]
#[case::mono(MeterTap::Mono(0), 0.25)]
#[case::post_fader(MeterTap::Mono(3), 0.125)]
#[case::stereo(MeterTap::Stereo(0, 1), 0.5)]
fn test_meter_datagram(#[case] tap: MeterTap, #[case] expected: f64) {
    let projector = projector().with_meter_tap(tap);
    let decoded = decode(&meter_datagram(&[0.25, 0.75, 0.0, 0.125]));
    assert!(decoded.is_clean());

    assert_eq!(
        projector.mixer(&decoded.message, Some(1)),
        vec![ShowEvent::Meter { value: expected }]
    );
}

#[test]
fn test_timer_sequence() {
    let projector = projector();
    let mut published = Vec::new();
    for arg in [
        Argument::from("ready"),
        Argument::Int(1),
        Argument::Int(2),
        Argument::from("paused"),
        Argument::from("paused"),
        Argument::from("finished"),
    ] {
        let mut message = Message::new(["state"]);
        message.arguments.push(arg);
        published.extend(projector.timer(&over_the_wire(message)));
    }

    let values: Vec<TimerValue> = published
        .into_iter()
        .map(|event| match event {
            ShowEvent::TimerState { value } => value,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        values,
        vec![
            TimerValue::Running(1),
            TimerValue::Running(2),
            TimerValue::Phase(TimerPhase::Paused),
            TimerValue::Phase(TimerPhase::Finished),
        ]
    );
}

#[test]
fn test_snapshot_collects_everything() {
    let projector = projector();
    projector.fader_sent(0.5);
    projector.connection(DeviceKind::Mixer, true);
    projector.cues(&over_the_wire(
        Message::new(["reply", "cueLists", "cues"]).with_arg(
            r#"{"status":"ok","data":[{"listName":"Main","uniqueID":"X","type":"Cue List","cues":[]}]}"#,
        ),
    ));

    let state = projector.store().snapshot();
    assert_eq!(state.mixer.level, Some(0.5));
    assert!(state.mixer.connected);
    assert!(!state.cues.connected);
    assert_eq!(state.cues.tree.len(), 1);

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["timer"]["value"], "ready");
    assert_eq!(json["cues"]["tree"][0]["uniqueID"], "X");
}

#[test]
fn test_malformed_payloads_publish_nothing() {
    let projector = projector();
    assert!(projector.timer(&Message::new(["state"]).with_arg(1.5f32)).is_empty());
    assert!(projector
        .cues(&Message::new(["reply", "cueLists", "cues"]).with_arg("{"))
        .is_empty());
    assert!(projector
        .mixer(&Message::new(["meters", "6"]).with_arg(Argument::Blob(vec![1])), None)
        .is_empty());
    assert_eq!(projector.store().snapshot(), Default::default());
}
