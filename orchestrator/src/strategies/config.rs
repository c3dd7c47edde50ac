//! Strategy option parsing
//!
//! Options arrive as a string-to-string map. Unknown keys are ignored and
//! malformed values fall back to their defaults; option parsing never fails
//! a deployment.

use std::collections::HashMap;
use std::time::Duration;

/// Parse a duration option ("30s", "2m", "500ms")
pub fn duration_option(
    config: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Duration {
    config
        .get(key)
        .and_then(|raw| humantime::parse_duration(raw.trim()).ok())
        .unwrap_or(default)
}

/// Parse a boolean option ("true"/"1" and "false"/"0")
pub fn bool_option(config: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match config.get(key).map(String::as_str) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

/// Whether automatic rollback is enabled (default true)
pub fn rollback_enabled(config: &HashMap<String, String>) -> bool {
    bool_option(config, "enable_rollback", true)
}

/// Canary stage weights.
///
/// `canary_stages` is a comma-separated list of percentages, each at most
/// 100 and non-decreasing; `canary_percent` is a single-stage fallback that
/// expands to `[percent, 100]`. Anything malformed yields the default
/// `[20, 50, 100]`.
pub fn canary_stages(config: &HashMap<String, String>) -> Vec<u32> {
    if let Some(raw) = config.get("canary_stages") {
        if let Some(stages) = parse_stage_list(raw) {
            return stages;
        }
    }

    if let Some(raw) = config.get("canary_percent") {
        if let Ok(percent) = raw.trim().parse::<u32>() {
            if percent <= 100 {
                return vec![percent, 100];
            }
        }
    }

    vec![20, 50, 100]
}

fn parse_stage_list(raw: &str) -> Option<Vec<u32>> {
    let mut stages = Vec::new();
    for part in raw.split(',') {
        let percent = part.trim().parse::<u32>().ok()?;
        if percent > 100 {
            return None;
        }
        if let Some(&last) = stages.last() {
            if percent < last {
                return None;
            }
        }
        stages.push(percent);
    }
    if stages.is_empty() {
        None
    } else {
        Some(stages)
    }
}

/// Rolling batch size as a percentage, 1..=100 (default 25)
pub fn batch_size(config: &HashMap<String, String>) -> u32 {
    config
        .get("batch_size")
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|size| (1..=100).contains(size))
        .unwrap_or(25)
}
