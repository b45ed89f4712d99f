//! Unit tests for data models module
//!
//! Validates snapshot capture, folding a snapshot back into the persisted
//! configuration, bounds checks and report serialization.

use super::*;

fn sample_configuration() -> AgentConfiguration {
    let mut config = AgentConfiguration::default();
    config.primary.host = "logs.example.com".to_string();
    config.primary.api_key = "a".repeat(48);
    config.secondary.host = "backup.example.com:8080".to_string();
    config.forwarding.max_batch_size = 500;
    config.diagnostics.tail_filename = "app.log".to_string();
    config.diagnostics.tail_program_name = "app".to_string();
    config.channels.selected = vec!["Application".to_string()];
    config
}

#[test]
fn test_validated_field_starts_valid() {
    let field = ValidatedField::new("  value ");
    assert!(field.is_valid);
    assert_eq!(field.trimmed(), "value");
}

#[test]
fn test_validated_field_mark_returns_verdict() {
    let mut field = ValidatedField::from("x");
    assert!(!field.mark(false));
    assert!(!field.is_valid);
    assert!(field.mark(true));
    assert!(field.is_valid);
}

#[test]
fn test_snapshot_captures_configuration() {
    let config = sample_configuration();
    let snapshot = ConfigurationSnapshot::from_configuration(&config, vec!["System".to_string()]);

    assert_eq!(snapshot.primary.host.content, "logs.example.com");
    assert_eq!(snapshot.secondary.host.content, "backup.example.com:8080");
    assert_eq!(snapshot.max_batch_size.content, "500");
    assert_eq!(snapshot.selected_channels, vec!["System".to_string()]);
    assert!(snapshot.invalid_fields().is_empty());
}

#[test]
fn test_snapshot_round_trips_into_configuration() {
    let config = sample_configuration();
    let snapshot =
        ConfigurationSnapshot::from_configuration(&config, config.channels.selected.clone());

    let restored = snapshot.apply_to(&config).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_apply_to_keeps_fields_the_snapshot_does_not_carry() {
    let mut base = sample_configuration();
    base.forwarding.facility = 3;
    base.forwarding.severity = 5;

    let mut snapshot = ConfigurationSnapshot::from_configuration(&base, Vec::new());
    snapshot.max_batch_age.content = " 2500 ".to_string();

    let updated = snapshot.apply_to(&base).unwrap();
    assert_eq!(updated.forwarding.facility, 3);
    assert_eq!(updated.forwarding.severity, 5);
    assert_eq!(updated.forwarding.max_batch_age, 2500);
    assert!(updated.channels.selected.is_empty());
}

#[test]
fn test_apply_to_rejects_unparsed_numbers() {
    let base = sample_configuration();
    let mut snapshot = ConfigurationSnapshot::from_configuration(&base, Vec::new());
    snapshot.batch_interval.content = "soon".to_string();

    let err = snapshot.apply_to(&base).unwrap_err();
    assert!(err.to_string().contains("batch_interval"));
    assert!(err.to_string().contains("soon"));
}

#[test]
fn test_apply_to_rejects_out_of_range_numbers() {
    let base = sample_configuration();
    let mut snapshot = ConfigurationSnapshot::from_configuration(&base, Vec::new());
    snapshot.max_batch_size.content = "100001".to_string();

    let err = snapshot.apply_to(&base).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { field: "forwarding.max_batch_size", .. }));
}

#[test]
fn test_invalid_fields_lists_marked_fields() {
    let mut snapshot = ConfigurationSnapshot::default();
    snapshot.primary.host.mark(false);
    snapshot.suffix.mark(false);

    assert_eq!(snapshot.invalid_fields(), vec!["primary.host", "suffix"]);
}

#[test]
fn test_configuration_bounds() {
    let mut config = AgentConfiguration::default();
    assert!(config.validate().is_ok());

    config.forwarding.facility = 24;
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("forwarding.facility"));
    assert!(message.contains("Must be between 0 and 23"));

    config.forwarding.facility = 23;
    config.forwarding.severity = 9;
    assert!(config.validate().is_err());
}

#[test]
fn test_destination_labels_and_certificates() {
    assert_eq!(Destination::Primary.label(), "Primary");
    assert_eq!(Destination::Secondary.cert_filename(), "secondary.cert");
}

#[test]
fn test_report_serialization() {
    let report = ValidationReport {
        run_id: Uuid::nil(),
        outcome: ValidationOutcome::Failed(StepFailure {
            ordinal: 2,
            name: "Primary Host Connectivity".to_string(),
            message: "Primary host refused".to_string(),
        }),
        passed: vec![1],
        skipped: vec![],
        duration_ms: 12,
    };

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["status"], "failed");
    assert_eq!(json["outcome"]["ordinal"], 2);
    assert_eq!(json["passed"], serde_json::json!([1]));
    assert!(!report.is_success());
    assert_eq!(report.failure().map(|f| f.ordinal), Some(2));
}

#[test]
fn test_configuration_toml_defaults_fill_missing_sections() {
    let config: AgentConfiguration = toml::from_str(
        r#"
[primary]
host = "logs.example.com"
use_tls = true
"#,
    )
    .unwrap();

    assert!(config.primary.use_tls);
    assert_eq!(config.forwarding.facility, 20);
    assert_eq!(config.diagnostics.debug_log_filename, "syslogagent.log");
    assert!(config.channels.selected.is_empty());
}
