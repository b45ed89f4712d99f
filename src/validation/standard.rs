//! The canonical ordered step list
//!
//! Ordinals are part of the operator interface (`-s <N>` skips step N), so
//! new steps are only ever appended.
//!
//! | # | Step |
//! |---|------|
//! | 1-4 | Primary host, connectivity, TLS certificate, API key |
//! | 5-8 | Secondary host, connectivity, TLS certificate, API key |
//! | 9 | Event IDs |
//! | 10 | Filenames |
//! | 11 | Tail program name |
//! | 12 | Max batch size |
//! | 13 | Max batch age |
//! | 14 | Batch interval |
//! | 15 | JSON suffix |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::debug;

use super::rules;
use super::ValidationPipeline;
use crate::constants::{
    MAX_BATCH_AGE_MAX, MAX_BATCH_AGE_MIN, MAX_BATCH_SIZE_MAX, MAX_BATCH_SIZE_MIN, NETWORK_STEP_COUNT,
    RUN_DEADLINE_MARGIN,
};
use crate::models::{ConfigurationSnapshot, Destination, DestinationSnapshot, ValidatedField};
use crate::net::endpoint::base_url;
use crate::net::{
    CertificateVerifier, Endpoint, HostProbe, HttpKeyAuthenticator, KeyAuthenticator, MatcherVerifier,
    RustlsPeerFetcher, TcpHostProbe,
};

/// External checks the destination steps delegate to
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn HostProbe>,
    pub certificates: Arc<dyn CertificateVerifier>,
    pub keys: Arc<dyn KeyAuthenticator>,
    /// Directory holding `primary.cert` and `secondary.cert`
    pub cert_dir: PathBuf,
}

impl Collaborators {
    /// Real TCP, TLS and HTTP collaborators sharing one timeout
    pub fn live(timeout: Duration, cert_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            probe: Arc::new(TcpHostProbe::new(timeout)),
            certificates: Arc::new(MatcherVerifier::new(Arc::new(RustlsPeerFetcher::new(timeout)))),
            keys: Arc::new(HttpKeyAuthenticator::new(timeout)?),
            cert_dir,
        })
    }
}

/// Outer bound for a background run where each network step may take `step_timeout`
pub fn run_deadline(step_timeout: Duration) -> Duration {
    step_timeout.saturating_mul(NETWORK_STEP_COUNT).saturating_add(RUN_DEADLINE_MARGIN)
}

/// Build the fifteen standard steps
pub fn standard_pipeline(collaborators: &Collaborators) -> ValidationPipeline<'static> {
    let pipeline = destination_steps(ValidationPipeline::new(), Destination::Primary, collaborators);
    destination_steps(pipeline, Destination::Secondary, collaborators)
        .step("Event IDs", |snapshot: &mut ConfigurationSnapshot| {
            let valid = rules::is_valid_event_ids(&snapshot.event_id_filter.content);
            Ok(verdict(&mut snapshot.event_id_filter, valid, "Invalid event ID filter"))
        })
        .step("Filenames", |snapshot: &mut ConfigurationSnapshot| {
            let debug_valid = rules::is_valid_filename(&snapshot.debug_log_filename.content);
            if let Some(message) = verdict(
                &mut snapshot.debug_log_filename,
                debug_valid,
                "Invalid debug log filename",
            ) {
                return Ok(Some(message));
            }
            let tail_valid = rules::is_valid_filename(&snapshot.tail_filename.content);
            Ok(verdict(&mut snapshot.tail_filename, tail_valid, "Invalid tail filename"))
        })
        .step("Tail Program Name", |snapshot: &mut ConfigurationSnapshot| {
            let valid = snapshot.tail_filename.trimmed().is_empty()
                || !snapshot.tail_program_name.trimmed().is_empty();
            Ok(verdict(
                &mut snapshot.tail_program_name,
                valid,
                "Set a short program name for the tail log messages",
            ))
        })
        .step("Max Batch Size", |snapshot: &mut ConfigurationSnapshot| {
            Ok(range_check(
                &mut snapshot.max_batch_size,
                MAX_BATCH_SIZE_MIN,
                MAX_BATCH_SIZE_MAX,
                "Max Batch Size must be between 1 and 100000",
            ))
        })
        .step("Max Batch Age", |snapshot: &mut ConfigurationSnapshot| {
            Ok(range_check(
                &mut snapshot.max_batch_age,
                MAX_BATCH_AGE_MIN,
                MAX_BATCH_AGE_MAX,
                "Max Batch Age must be between 0 and 86400000 milliseconds (24 hours)",
            ))
        })
        .step("Batch Interval", |snapshot: &mut ConfigurationSnapshot| {
            Ok(range_check(
                &mut snapshot.batch_interval,
                1,
                i64::from(u32::MAX),
                "Invalid batch interval",
            ))
        })
        .step("JSON Suffix", |snapshot: &mut ConfigurationSnapshot| {
            let result = rules::check_json_suffix(&snapshot.suffix.content);
            snapshot.suffix.mark(result.is_ok());
            Ok(result.err())
        })
}

fn destination_steps(
    pipeline: ValidationPipeline<'static>,
    which: Destination,
    collaborators: &Collaborators,
) -> ValidationPipeline<'static> {
    let label = which.label();
    let probe = Arc::clone(&collaborators.probe);
    let certificates = Arc::clone(&collaborators.certificates);
    let keys = Arc::clone(&collaborators.keys);
    let cert_path = collaborators.cert_dir.join(which.cert_filename());

    pipeline
        .step(format!("{} Host", label), move |snapshot: &mut ConfigurationSnapshot| {
            let required = is_required(snapshot, which);
            Ok(check_host_format(&mut snapshot.destination_mut(which).host, required, which))
        })
        .step(
            format!("{} Host Connectivity", label),
            move |snapshot: &mut ConfigurationSnapshot| {
                if !is_required(snapshot, which) {
                    return Ok(None);
                }
                Ok(check_connectivity(snapshot.destination(which), which, probe.as_ref()))
            },
        )
        .step(format!("{} TLS Certificate", label), move |snapshot: &mut ConfigurationSnapshot| {
            let destination = snapshot.destination(which);
            if !is_required(snapshot, which) || !destination.use_tls {
                return Ok(None);
            }
            let remote_url = base_url(&destination.host.content, true);
            debug!("Comparing {} with {}", cert_path.display(), remote_url);
            let matched = certificates.verify(&cert_path, &remote_url)?;
            Ok((!matched).then(|| {
                format!(
                    "{} host certificate does not match {}",
                    label,
                    which.cert_filename()
                )
            }))
        })
        .step(format!("{} API Key", label), move |snapshot: &mut ConfigurationSnapshot| {
            if !is_required(snapshot, which) {
                return Ok(None);
            }
            Ok(check_api_key(snapshot.destination(which), which, keys.as_ref()))
        })
}

/// Secondary checks only apply when forwarding to the secondary is on
fn is_required(snapshot: &ConfigurationSnapshot, which: Destination) -> bool {
    match which {
        Destination::Primary => true,
        Destination::Secondary => snapshot.send_to_secondary,
    }
}

fn verdict(field: &mut ValidatedField, valid: bool, failure: &str) -> Option<String> {
    (!field.mark(valid)).then(|| failure.to_string())
}

fn range_check(field: &mut ValidatedField, min: i64, max: i64, failure: &str) -> Option<String> {
    let valid = rules::parse_in_range(&field.content, min, max).is_some();
    verdict(field, valid, failure)
}

/// Empty text fails only when the destination is required; other text is
/// always format checked
fn check_host_format(host: &mut ValidatedField, required: bool, which: Destination) -> Option<String> {
    let failure = format!("Invalid {} host", which.label().to_lowercase());
    if host.trimmed().is_empty() {
        return verdict(host, !required, &failure);
    }
    let valid = rules::is_valid_host(&host.content);
    verdict(host, valid, &failure)
}

fn check_connectivity(
    destination: &DestinationSnapshot,
    which: Destination,
    probe: &dyn HostProbe,
) -> Option<String> {
    let failure = format!("{} host", which.label());
    let endpoint = match Endpoint::parse(&destination.host.content, destination.use_tls) {
        Ok(endpoint) => endpoint,
        Err(err) => return Some(format!("{} {}", failure, err)),
    };

    if endpoint.scheme.is_tls() != destination.use_tls {
        return Some(format!(
            "{} uses {} but TLS is {}",
            failure,
            endpoint.scheme.as_str(),
            if destination.use_tls { "enabled" } else { "disabled" }
        ));
    }

    probe
        .probe(&endpoint.host, u32::from(endpoint.port))
        .map(|reason| format!("{} {}", failure, reason))
}

fn check_api_key(
    destination: &DestinationSnapshot,
    which: Destination,
    keys: &dyn KeyAuthenticator,
) -> Option<String> {
    let key = destination.api_key.trimmed();
    if !rules::is_valid_api_key(key) {
        return Some(format!("Invalid {} API key", which.label().to_lowercase()));
    }
    keys.authenticate(&base_url(&destination.host.content, destination.use_tls), key)
        .err()
        .map(|err| err.to_string())
}
