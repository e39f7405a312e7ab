use crate::error::FetchError;
use serde_json::Value;

/// Reject payloads whose envelope reports a non-ok status.
///
/// The API wraps both success and business-level failure in HTTP 200, so the
/// envelope has to be checked before the slot list is parsed.
pub fn ensure_ok(payload: &Value) -> Result<(), FetchError> {
    match payload.get("status").and_then(Value::as_str) {
        Some("ok") | None => Ok(()),
        Some(other) => {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown API error");
            Err(FetchError::malformed(format!(
                "API status {}: {}",
                other, message
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_and_missing_status_pass() {
        assert!(ensure_ok(&json!({"status": "ok", "prices": []})).is_ok());
        assert!(ensure_ok(&json!({"prices": []})).is_ok());
    }

    #[test]
    fn error_status_is_malformed() {
        let err = ensure_ok(&json!({"status": "error", "message": "no tariff"})).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
        assert!(err.to_string().contains("no tariff"));
    }
}
