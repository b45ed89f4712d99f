//! Global constants for logagent-config
//!
//! Centralized location for application-wide constants

use std::time::Duration;

/// Application name used for the config directory and log lines
pub const APP_NAME: &str = "logagent";

/// Configuration file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default HTTP port used when a host URL carries no explicit port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port used when a host URL carries no explicit port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Certificate the primary server is expected to present
pub const PRIMARY_CERT_FILENAME: &str = "primary.cert";

/// Certificate the secondary server is expected to present
pub const SECONDARY_CERT_FILENAME: &str = "secondary.cert";

/// Path appended to the server URL for API key checks
pub const API_PATH: &str = "/api/";

/// Bound applied to every network-bound validation step
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Steps that open a connection (connectivity, certificate, API key per destination)
pub const NETWORK_STEP_COUNT: u32 = 6;

/// Slack added on top of the network steps when bounding a whole run
pub const RUN_DEADLINE_MARGIN: Duration = Duration::from_secs(30);

/// Max batch size bounds (inclusive)
pub const MAX_BATCH_SIZE_MIN: i64 = 1;
pub const MAX_BATCH_SIZE_MAX: i64 = 100_000;

/// Max batch age bounds in milliseconds (inclusive, 24 hours)
pub const MAX_BATCH_AGE_MIN: i64 = 0;
pub const MAX_BATCH_AGE_MAX: i64 = 86_400_000;

/// Note: bounds must match the ranges enforced in models::AgentConfiguration::validate
pub const FACILITY_MAX: u8 = 23;
pub const SEVERITY_MAX: u8 = 8;
pub const DEBUG_LEVEL_MAX: u8 = 8;

/// Number of steps in the standard validation pipeline
pub const STANDARD_STEP_COUNT: u8 = 15;
