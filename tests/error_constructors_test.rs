use obolus::error::{FetchError, FetchFault, ObolusError};

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ObolusError::config("x"),
        ObolusError::Config { .. }
    ));
    assert!(matches!(ObolusError::web("x"), ObolusError::Web { .. }));
    assert!(matches!(ObolusError::io("x"), ObolusError::Io { .. }));
}

#[test]
fn error_constructors_group_2() {
    let ser = ObolusError::Serialization {
        message: "s".into(),
    };
    assert!(matches!(ser, ObolusError::Serialization { .. }));
    assert!(matches!(
        ObolusError::network("x"),
        ObolusError::Network { .. }
    ));
    assert!(matches!(ObolusError::api("x"), ObolusError::Api { .. }));
    assert!(matches!(
        ObolusError::validation("f", "m"),
        ObolusError::Validation { .. }
    ));
    assert!(matches!(
        ObolusError::generic("x"),
        ObolusError::Generic { .. }
    ));
}

#[test]
fn fetch_error_terminal_and_retryable_split() {
    assert!(FetchError::unauthorized("x").is_terminal());
    assert!(FetchError::not_found("x").is_terminal());
    assert!(!FetchError::transient("x").is_terminal());
    assert!(!FetchError::malformed("x").is_terminal());

    assert!(FetchError::transient("x").is_retryable());
    assert!(!FetchError::unauthorized("x").is_retryable());
    assert!(!FetchError::malformed("x").is_retryable());
}

#[test]
fn fault_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(FetchFault::NotFound).unwrap(),
        serde_json::json!("not_found")
    );
}

#[test]
fn display_messages() {
    let e = ObolusError::validation("field", "bad");
    let s = format!("{}", e);
    assert!(s.contains("Validation error"));
}
