use obolus::config::{AuthMethod, Config};
use std::fs;

fn anonymous_config() -> Config {
    let mut cfg = Config::default();
    cfg.api.tariff_name = Some("vario_plus".to_string());
    cfg
}

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = anonymous_config();
    cfg.timezone = "Europe/Zurich".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.timezone, "Europe/Zurich");
    assert_eq!(loaded.api.tariff_name.as_deref(), Some("vario_plus"));
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn config_validation_errors() {
    // No credentials at all
    let cfg = Config::default();
    assert!(cfg.validate().is_err());

    // Metering-code mode without a metering code
    let mut cfg = Config::default();
    cfg.api.method = AuthMethod::MeteringCode;
    assert!(cfg.validate().is_err());

    // Both credential modes filled
    let mut cfg = anonymous_config();
    cfg.api.metering_code = Some("CH1018601234500000000000000012345".to_string());
    assert!(cfg.validate().is_err());

    // No tariff types selected
    let mut cfg = anonymous_config();
    cfg.tariffs.types.clear();
    assert!(cfg.validate().is_err());

    // Poll interval zero
    let mut cfg = anonymous_config();
    cfg.polling.update_interval_minutes = 0;
    assert!(cfg.validate().is_err());

    // Unknown timezone
    let mut cfg = anonymous_config();
    cfg.timezone = "Atlantis/Poseidonis".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn partial_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        b"api:\n  tariff_name: vario_plus\ntariffs:\n  types: [electricity, grid]\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.tariffs.types.len(), 2);
    assert_eq!(cfg.polling.update_interval_minutes, 60);
    assert_eq!(cfg.timezone, "UTC");
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
