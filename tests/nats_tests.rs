use acoustic_trigger::event::EventNotice;
use acoustic_trigger::nats::client::{event_message, event_subject};
use acoustic_trigger::nats::messages::{EventMessage, StatusMessage};
use base64::Engine;
use chrono::{TimeZone, Utc};

fn notice(samples: Option<Vec<i16>>) -> EventNotice {
    EventNotice {
        handle: "sensor-1_20251027-143000.wav".to_string(),
        trigger_amplitude: 552,
        device_id: "sensor-1".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 10, 27, 14, 30, 0).unwrap(),
        sample_rate: 8000,
        sample_count: 24000,
        samples,
    }
}

#[test]
fn test_event_message_from_notice() {
    let msg = event_message(&notice(None));

    assert_eq!(msg.device_id, "sensor-1");
    assert_eq!(msg.file, "sensor-1_20251027-143000.wav");
    assert_eq!(msg.amplitude, 552);
    assert_eq!(msg.timestamp, "2025-10-27T14:30:00+00:00");
    assert_eq!(msg.sample_rate, 8000);
    assert_eq!(msg.samples, 24000);
    assert_eq!(msg.duration_secs, 3.0);
    assert!(msg.pcm.is_none());
}

#[test]
fn test_event_serialization_omits_missing_pcm() {
    let json = serde_json::to_string(&event_message(&notice(None))).unwrap();

    assert!(json.contains("\"device_id\":\"sensor-1\""));
    assert!(json.contains("\"amplitude\":552"));
    assert!(!json.contains("pcm"));

    let deserialized: EventMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.file, "sensor-1_20251027-143000.wav");
    assert!(deserialized.pcm.is_none());
}

#[test]
fn test_event_pcm_is_little_endian_base64() {
    let msg = event_message(&notice(Some(vec![1, -2, 256])));

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(msg.pcm.unwrap())
        .unwrap();

    assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x00, 0x01]);
}

#[test]
fn test_status_deserialization() {
    let json = r#"{
        "device_id": "sensor-1",
        "status": "online",
        "dc_offset": 2048,
        "threshold": 500,
        "timestamp": "2025-10-27T14:30:00Z"
    }"#;

    let msg: StatusMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.status, "online");
    assert_eq!(msg.dc_offset, Some(2048));
    assert_eq!(msg.threshold, 500);
}

#[test]
fn test_subject_layout() {
    assert_eq!(
        event_subject("acoustic", "sensor-1", "event"),
        "acoustic.sensor-1.event"
    );
}
