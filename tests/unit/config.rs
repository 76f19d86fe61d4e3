use super::*;

use crate::denoise::params::RegressionGuide;

#[test]
fn empty_document_yields_defaults() {
    let config = DeviceConfig::from_json_str("{}").unwrap();
    assert_eq!(config, DeviceConfig::default());
    assert_eq!(config.threads, None);
    assert_eq!(config.max_kernel_tier, None);
}

#[test]
fn partial_document_keeps_other_defaults() {
    let config = DeviceConfig::from_json_str(
        r#"{
            "threads": 3,
            "max_kernel_tier": "sse41",
            "denoise": { "half_window": 5, "guide": "color" }
        }"#,
    )
    .unwrap();
    assert_eq!(config.threads, Some(3));
    assert_eq!(config.max_kernel_tier, Some(CpuTier::Sse41));
    assert_eq!(config.denoise.half_window, 5);
    assert_eq!(config.denoise.guide, RegressionGuide::Color);
    assert_eq!(
        config.denoise.patch_radius,
        DenoiseParams::default().patch_radius
    );
}

#[test]
fn invalid_values_are_config_errors() {
    for json in [
        r#"{ "threads": 0 }"#,
        r#"{ "denoise": { "half_window": -1 } }"#,
        r#"{ "max_kernel_tier": "sse5" }"#,
        "not json",
    ] {
        let err = DeviceConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, EmberError::Config(_)), "{json}: {err}");
    }
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let err = DeviceConfig::from_path("/nonexistent/ember-device.json").unwrap_err();
    assert!(err.to_string().contains("ember-device.json"));
}

#[test]
fn round_trips_through_json() {
    let config = DeviceConfig {
        threads: Some(2),
        max_kernel_tier: Some(CpuTier::Baseline),
        denoise: DenoiseParams::default(),
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(DeviceConfig::from_json_str(&json).unwrap(), config);
}
