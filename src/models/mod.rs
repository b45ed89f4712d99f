//! Data models module
//!
//! Defines core data structures:
//! - ValidatedField: field content paired with its validity marker
//! - ConfigurationSnapshot: the UI state captured before a validation run
//! - AgentConfiguration: the persisted, typed configuration
//! - ValidationReport: outcome of one pipeline run
//!
//! Snapshots are built fresh for every run and discarded afterwards; the
//! persisted configuration is the system of record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEBUG_LEVEL_MAX, FACILITY_MAX, MAX_BATCH_AGE_MAX, MAX_BATCH_AGE_MIN, MAX_BATCH_SIZE_MAX,
    MAX_BATCH_SIZE_MIN, PRIMARY_CERT_FILENAME, SECONDARY_CERT_FILENAME, SEVERITY_MAX,
};

#[cfg(test)]
mod tests;

/// Field content together with the marker a view uses for error highlighting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedField {
    /// Raw text as entered
    pub content: String,
    /// Set by format-checking steps; `true` until a step says otherwise
    pub is_valid: bool,
}

impl ValidatedField {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_valid: true,
        }
    }

    /// Content with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.content.trim()
    }

    /// Record the verdict of a format check and hand it back
    pub fn mark(&mut self, valid: bool) -> bool {
        self.is_valid = valid;
        valid
    }
}

impl Default for ValidatedField {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl From<&str> for ValidatedField {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ValidatedField {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Which forwarding destination a step is checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Primary,
    Secondary,
}

impl Destination {
    /// Capitalized label used in step names ("Primary", "Secondary")
    pub fn label(self) -> &'static str {
        match self {
            Destination::Primary => "Primary",
            Destination::Secondary => "Secondary",
        }
    }

    /// Certificate file the destination's server is expected to present
    pub fn cert_filename(self) -> &'static str {
        match self {
            Destination::Primary => PRIMARY_CERT_FILENAME,
            Destination::Secondary => SECONDARY_CERT_FILENAME,
        }
    }
}

/// Host, API key and TLS flag of one destination, as entered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSnapshot {
    pub host: ValidatedField,
    pub api_key: ValidatedField,
    pub use_tls: bool,
}

/// In-memory configuration state captured immediately before a validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    pub primary: DestinationSnapshot,
    pub secondary: DestinationSnapshot,
    /// Gates the secondary destination checks
    pub send_to_secondary: bool,
    pub event_id_filter: ValidatedField,
    pub include_event_ids: bool,
    pub batch_interval: ValidatedField,
    pub max_batch_size: ValidatedField,
    pub max_batch_age: ValidatedField,
    pub debug_log_filename: ValidatedField,
    pub tail_filename: ValidatedField,
    pub tail_program_name: ValidatedField,
    /// Free-form JSON fragment appended to every message
    pub suffix: ValidatedField,
    /// Selected channel paths taken from the selection tree
    pub selected_channels: Vec<String>,
}

impl ConfigurationSnapshot {
    /// Capture a snapshot of a persisted configuration and the current selection
    pub fn from_configuration(config: &AgentConfiguration, selected_channels: Vec<String>) -> Self {
        Self {
            primary: DestinationSnapshot::from(&config.primary),
            secondary: DestinationSnapshot::from(&config.secondary),
            send_to_secondary: config.forwarding.send_to_secondary,
            event_id_filter: config.filters.event_id_filter.as_str().into(),
            include_event_ids: config.filters.include_event_ids,
            batch_interval: config.forwarding.batch_interval.to_string().into(),
            max_batch_size: config.forwarding.max_batch_size.to_string().into(),
            max_batch_age: config.forwarding.max_batch_age.to_string().into(),
            debug_log_filename: config.diagnostics.debug_log_filename.as_str().into(),
            tail_filename: config.diagnostics.tail_filename.as_str().into(),
            tail_program_name: config.diagnostics.tail_program_name.as_str().into(),
            suffix: config.forwarding.suffix.as_str().into(),
            selected_channels,
        }
    }

    pub fn destination(&self, which: Destination) -> &DestinationSnapshot {
        match which {
            Destination::Primary => &self.primary,
            Destination::Secondary => &self.secondary,
        }
    }

    pub fn destination_mut(&mut self, which: Destination) -> &mut DestinationSnapshot {
        match which {
            Destination::Primary => &mut self.primary,
            Destination::Secondary => &mut self.secondary,
        }
    }

    /// Names of fields whose validity marker is currently false
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &ValidatedField); 12] = [
            ("primary.host", &self.primary.host),
            ("primary.api_key", &self.primary.api_key),
            ("secondary.host", &self.secondary.host),
            ("secondary.api_key", &self.secondary.api_key),
            ("event_id_filter", &self.event_id_filter),
            ("batch_interval", &self.batch_interval),
            ("max_batch_size", &self.max_batch_size),
            ("max_batch_age", &self.max_batch_age),
            ("debug_log_filename", &self.debug_log_filename),
            ("tail_filename", &self.tail_filename),
            ("tail_program_name", &self.tail_program_name),
            ("suffix", &self.suffix),
        ];
        fields
            .iter()
            .filter(|(_, field)| !field.is_valid)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Fold a validated snapshot back into the persisted configuration
    ///
    /// Fields the snapshot does not carry (facility, severity, ...) are taken
    /// from `base`. Numeric fields are re-parsed here, so a snapshot whose
    /// range steps were skipped can still be rejected.
    pub fn apply_to(&self, base: &AgentConfiguration) -> Result<AgentConfiguration, ConfigError> {
        let mut config = base.clone();
        config.primary = DestinationConfig::from(&self.primary);
        config.secondary = DestinationConfig::from(&self.secondary);
        config.forwarding.send_to_secondary = self.send_to_secondary;
        config.forwarding.suffix = self.suffix.content.clone();
        config.forwarding.batch_interval = parse_u32("batch_interval", &self.batch_interval)?;
        config.forwarding.max_batch_size = parse_u32("max_batch_size", &self.max_batch_size)?;
        config.forwarding.max_batch_age = parse_u32("max_batch_age", &self.max_batch_age)?;
        config.filters.event_id_filter = self.event_id_filter.content.clone();
        config.filters.include_event_ids = self.include_event_ids;
        config.diagnostics.debug_log_filename = self.debug_log_filename.content.trim().to_string();
        config.diagnostics.tail_filename = self.tail_filename.content.trim().to_string();
        config.diagnostics.tail_program_name = self.tail_program_name.content.trim().to_string();
        config.channels.selected = self.selected_channels.clone();
        config.validate()?;
        Ok(config)
    }
}

fn parse_u32(field: &'static str, value: &ValidatedField) -> Result<u32, ConfigError> {
    value
        .trimmed()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber {
            field,
            value: value.content.clone(),
        })
}

impl From<&DestinationConfig> for DestinationSnapshot {
    fn from(config: &DestinationConfig) -> Self {
        Self {
            host: config.host.as_str().into(),
            api_key: config.api_key.as_str().into(),
            use_tls: config.use_tls,
        }
    }
}

impl From<&DestinationSnapshot> for DestinationConfig {
    fn from(snapshot: &DestinationSnapshot) -> Self {
        Self {
            host: snapshot.host.content.trim().to_string(),
            api_key: snapshot.api_key.content.trim().to_string(),
            use_tls: snapshot.use_tls,
        }
    }
}

/// Persisted agent configuration (TOML document)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfiguration {
    pub primary: DestinationConfig,
    pub secondary: DestinationConfig,
    pub forwarding: ForwardingSettings,
    pub filters: FilterSettings,
    pub diagnostics: DiagnosticSettings,
    pub channels: ChannelSettings,
}

/// Where and how one destination receives events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub host: String,
    pub api_key: String,
    pub use_tls: bool,
}

/// Message shaping and batching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingSettings {
    pub send_to_secondary: bool,
    /// Syslog facility (0-23)
    pub facility: u8,
    /// Syslog severity (0-7, 8 = derived from the event level)
    pub severity: u8,
    pub suffix: String,
    pub lookup_accounts: bool,
    /// Forward only events raised while the agent runs (no catch-up)
    pub only_while_running: bool,
    pub batch_interval: u32,
    pub max_batch_size: u32,
    /// Milliseconds
    pub max_batch_age: u32,
}

impl Default for ForwardingSettings {
    fn default() -> Self {
        Self {
            send_to_secondary: false,
            facility: 20,
            severity: 8,
            suffix: String::new(),
            lookup_accounts: true,
            only_while_running: false,
            batch_interval: 1000,
            max_batch_size: 1000,
            max_batch_age: 1000,
        }
    }
}

/// Event id include/ignore list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub event_id_filter: String,
    /// `true` forwards only the listed ids, `false` ignores them
    pub include_event_ids: bool,
}

/// Agent debug log and tail-file settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticSettings {
    pub debug_level: u8,
    pub debug_log_filename: String,
    pub tail_filename: String,
    pub tail_program_name: String,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            debug_level: 0,
            debug_log_filename: "syslogagent.log".to_string(),
            tail_filename: String::new(),
            tail_program_name: String::new(),
        }
    }
}

/// Persisted channel selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub selected: Vec<String>,
}

impl AgentConfiguration {
    /// Check the enumerated fields against their bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bound("forwarding.facility", self.forwarding.facility, FACILITY_MAX)?;
        check_bound("forwarding.severity", self.forwarding.severity, SEVERITY_MAX)?;
        check_bound("diagnostics.debug_level", self.diagnostics.debug_level, DEBUG_LEVEL_MAX)?;
        check_range(
            "forwarding.max_batch_size",
            i64::from(self.forwarding.max_batch_size),
            MAX_BATCH_SIZE_MIN,
            MAX_BATCH_SIZE_MAX,
        )?;
        check_range(
            "forwarding.max_batch_age",
            i64::from(self.forwarding.max_batch_age),
            MAX_BATCH_AGE_MIN,
            MAX_BATCH_AGE_MAX,
        )?;
        Ok(())
    }
}

fn check_bound(field: &'static str, value: u8, max: u8) -> Result<(), ConfigError> {
    check_range(field, i64::from(value), 0, i64::from(max))
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Errors raised when a configuration cannot be accepted
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value}. Must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// The step that stopped a run and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub ordinal: usize,
    pub name: String,
    pub message: String,
}

/// Either every non-skipped step passed, or exactly one failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Passed,
    Failed(StepFailure),
}

/// Complete record of one pipeline run for logging and output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Correlates the log lines of one run
    pub run_id: Uuid,
    pub outcome: ValidationOutcome,
    /// Ordinals whose checks ran and passed, in order
    pub passed: Vec<usize>,
    /// Ordinals bypassed through the skip set, in order
    pub skipped: Vec<usize>,
    pub duration_ms: u64,
}

impl ValidationReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Passed)
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.outcome {
            ValidationOutcome::Passed => None,
            ValidationOutcome::Failed(failure) => Some(failure),
        }
    }
}
