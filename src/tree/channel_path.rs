//! Channel path decomposition
//!
//! Event channel names look like `Microsoft-Windows-Sysmon/Operational`: a
//! provider made of `-`-separated parts, optionally followed by `/` and an
//! instance name. The selection tree only sees the resulting key parts.

/// Separates the parts of the provider segment
pub const PROVIDER_DELIMITER: char = '-';

/// Separates the provider segment from the instance segment
pub const INSTANCE_DELIMITER: char = '/';

/// Split a channel path into the ordered key parts used by the tree
///
/// The instance segment is everything after the first `/`, kept whole.
/// An empty path yields no parts.
pub fn decompose(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }

    let (provider, instance) = match path.split_once(INSTANCE_DELIMITER) {
        Some((provider, instance)) => (provider, Some(instance)),
        None => (path, None),
    };

    let mut parts: Vec<&str> = provider.split(PROVIDER_DELIMITER).collect();
    parts.extend(instance);
    parts
}
