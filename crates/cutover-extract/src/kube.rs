//! Cluster tool (`kubectl`, `oc`) name listings and command confirmations.

use crate::classify::ErrorMarkers;
use crate::error::Result;

/// Parse `get <kind> -o name` output into bare names.
///
/// Each line looks like `pod/api-7d9f8-x2k`; the `kind/` prefix is
/// dropped and blank lines are skipped. `stderr` is classified with
/// `markers` first.
///
/// # Errors
///
/// Remote errors when `stderr` carries an error marker.
pub fn parse_resource_names(stdout: &str, stderr: &str, markers: &ErrorMarkers) -> Result<Vec<String>> {
    markers.check(stderr)?;
    Ok(resource_names(stdout))
}

/// [`parse_resource_names`] without classification.
#[must_use]
pub fn resource_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_once('/').map_or(line, |(_, name)| name).to_string())
        .collect()
}

/// Service name a pod belongs to: the pod name without the trailing
/// replica-set hash and pod suffix (`orders-db-5d8f-x2k` → `orders-db`).
///
/// `None` when the name has fewer than three dash-separated segments.
#[must_use]
pub fn pod_to_service_name(pod: &str) -> Option<String> {
    let segments: Vec<&str> = pod.split('-').collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments[..segments.len() - 2].join("-"))
}

/// Whether `scale` output confirms the change.
#[must_use]
pub fn scaled_confirmed(stdout: &str) -> bool {
    stdout.contains("scaled")
}
