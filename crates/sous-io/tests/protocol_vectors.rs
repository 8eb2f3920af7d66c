use sous_core::{ControlError, CookerState};
use sous_io::protocol::{encode_error, encode_state, tunable_keys, ProtocolError, StateUpdate};

fn state() -> CookerState {
    CookerState {
        sample_time: Some(1_700_000_000.0),
        temperature: Some(76.5),
        target: 78.0,
        setting: 0.3,
        proportional: 0.3,
        offset: 0.0,
        kp: 0.2,
        ki: 0.004,
    }
}

#[test]
fn parses_form_update() {
    let update = StateUpdate::parse(None, "target=80.5&kp=0.3&ki=1e-3").expect("form should parse");
    assert_eq!(
        update.fields,
        vec![
            ("target".to_string(), 80.5),
            ("kp".to_string(), 0.3),
            ("ki".to_string(), 0.001),
        ]
    );
}

#[test]
fn parses_percent_encoded_form() {
    let update = StateUpdate::from_form("target=%2B79&offset=0%2E25").expect("form should parse");
    assert_eq!(
        update.fields,
        vec![("target".to_string(), 79.0), ("offset".to_string(), 0.25)]
    );
}

#[test]
fn parses_json_update() {
    let raw = r#"{"target": 81, "offset": 0.1}"#;
    let update = StateUpdate::parse(Some("application/json"), raw).expect("json should parse");
    assert_eq!(update.fields.len(), 2);
    assert!(update.fields.contains(&("target".to_string(), 81.0)));
}

#[test]
fn rejects_non_numeric_values() {
    assert!(matches!(
        StateUpdate::from_form("target=warm"),
        Err(ProtocolError::NotANumber { .. })
    ));
    assert!(matches!(
        StateUpdate::from_json(r#"{"target": "warm"}"#),
        Err(ProtocolError::NotANumber { .. })
    ));
    assert!(matches!(
        StateUpdate::from_json("[1, 2]"),
        Err(ProtocolError::Json(_))
    ));
}

#[test]
fn rejects_pair_without_value() {
    assert!(matches!(
        StateUpdate::from_form("target"),
        Err(ProtocolError::MalformedPair(_))
    ));
}

#[test]
fn apply_rejects_read_only_fields() {
    let mut current = state();
    let update = StateUpdate::from_form("setting=1").unwrap();
    let err = update.apply(&mut current).unwrap_err();
    assert!(matches!(err, ControlError::UnknownStateField { ref key } if key == "setting"));
}

#[test]
fn apply_rejects_non_finite_values() {
    let mut current = state();
    let update = StateUpdate::from_form("kp=inf").unwrap();
    assert!(matches!(
        update.apply(&mut current),
        Err(ControlError::InvalidStateValue { .. })
    ));
}

#[test]
fn encoded_state_is_flat_mapping() {
    let encoded = encode_state(&state());
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    let object = value.as_object().unwrap();
    for key in [
        "sample_time",
        "temperature",
        "target",
        "setting",
        "proportional",
        "offset",
        "kp",
        "ki",
    ] {
        assert!(object.contains_key(key), "missing {key}");
    }
    assert_eq!(object.len(), 8);
}

#[test]
fn error_body_lists_tunable_keys() {
    let body = encode_error("bad field", tunable_keys());
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["error"], "bad field");
    assert_eq!(value["accepted"].as_array().unwrap().len(), 5);
}
