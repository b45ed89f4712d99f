//! Pure format checks used by the standard validation steps
//!
//! None of these touch the network or the snapshot; the steps in
//! `validation::standard` decide which field marker to update.

use std::sync::LazyLock;

use regex::Regex;

static IPV4_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])\.){3}([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])(:\d{1,5})?$",
    )
    .expect("ipv4 host regex")
});

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])(:\d{1,5})?$",
    )
    .expect("hostname regex")
});

static EVENT_IDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,5},)*([0-9]{1,5})?$").expect("event id regex"));

static BARE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-. ]+$").expect("filename regex"));

static FULL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]:\\[\\\w\-. ]+$").expect("full path regex"));

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{48}$").expect("api key regex"));

/// Drop a leading `http://` or `https://` (case-insensitive)
pub fn strip_scheme(host: &str) -> &str {
    for scheme in ["http://", "https://"] {
        if host
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        {
            return &host[scheme.len()..];
        }
    }
    host
}

/// IPv4 or hostname, each with an optional `:port`, after stripping the scheme
pub fn is_valid_host(host: &str) -> bool {
    let bare = strip_scheme(host.trim());
    !bare.is_empty() && (IPV4_HOST.is_match(bare) || HOSTNAME.is_match(bare))
}

/// Comma separated ids of one to five digits; empty is allowed
pub fn is_valid_event_ids(text: &str) -> bool {
    EVENT_IDS.is_match(text.trim())
}

/// Empty, a bare file name, or an absolute drive path
pub fn is_valid_filename(text: &str) -> bool {
    let name = text.trim();
    if name.is_empty() {
        return true;
    }
    if name.contains(['\\', '/']) {
        FULL_PATH.is_match(name)
    } else {
        BARE_FILENAME.is_match(name)
    }
}

/// Exactly 48 ASCII letters or digits
pub fn is_valid_api_key(key: &str) -> bool {
    API_KEY.is_match(key.trim())
}

/// Parse an integer and check it against an inclusive range
pub fn parse_in_range(text: &str, min: i64, max: i64) -> Option<i64> {
    text.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| (min..=max).contains(value))
}

/// Empty, or a fragment that forms a JSON object once wrapped in braces
pub fn check_json_suffix(suffix: &str) -> Result<(), String> {
    let trimmed = suffix.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&format!("{{{}}}", trimmed))
        .map(|_| ())
        .map_err(|err| format!("Invalid JSON body: {}", err))
}
