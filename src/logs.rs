//! Log mining: zarr version strings and pytest failures from raw CI logs.
//!
//! The log text is uncontrolled free-form output, so everything here is an
//! ordered list of independent matchers tried left to right, each a pure
//! function of the text. Patterns earlier in a list take priority over later
//! ones regardless of where in the log they match.
use regex::Regex;
use std::collections::BTreeSet;

use crate::schema::FailureReport;

/// Version patterns in priority order. The first pattern with any match
/// decides; within a pattern the most frequent capture wins.
const VERSION_PATTERNS: [&str; 4] = [
    // zarr: 3.1.3.dev23+g62d1a6abc
    r"(?i)zarr:\s+(\d+\.\d+\.\d+[\w.+-]*)",
    // zarr 2.18.3
    r"(?i)zarr\s+(\d+\.\d+\.\d+[\w.+-]*)",
    // Installing zarr-python-2.18.3
    r"(?i)Installing.*zarr[_-]?(?:python)?.*?(\d+\.\d+\.\d+[\w.+-]*)",
    // pip install output
    r"(?i)(?:Successfully installed|Requirement already satisfied).*zarr[_-]?(?:python)?[^\d]*(\d+\.\d+\.\d+[\w.+-]*)",
];

/// Test ids whose lowercased text contains any of these count as
/// zarr-related; everything else is attributed to other upstream packages.
const ZARR_KEYWORDS: [&str; 10] = [
    "zarr",
    "chunk",
    "codec",
    "storage",
    "blosc",
    "zlib",
    "gzip",
    "compression",
    "array_api",
    "buffer",
];

/// Extract the zarr version the job actually installed, if it was logged.
///
/// `None` is the expected outcome when the install step did not log a
/// version, never an error.
pub fn extract_zarr_version(logs: &str) -> Option<String> {
    let clean = strip_ansi(logs);
    for pattern in VERSION_PATTERNS {
        let re = Regex::new(pattern).expect("regex for zarr version");
        let mut counts: Vec<(String, usize)> = Vec::new();
        for cap in re.captures_iter(&clean) {
            let version = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            if version.is_empty() {
                continue;
            }
            match counts
                .iter_mut()
                .find(|(seen, _)| seen.as_str() == version)
            {
                Some((_, count)) => *count += 1,
                None => counts.push((version.to_string(), 1)),
            }
        }
        // Strictly-greater comparison keeps the first-encountered capture on
        // frequency ties.
        let mut best: Option<(usize, &str)> = None;
        for (version, count) in &counts {
            let replace = match best {
                Some((best_count, _)) => *count > best_count,
                None => true,
            };
            if replace {
                best = Some((*count, version));
            }
        }
        if let Some((_, version)) = best {
            tracing::debug!("found zarr version {version} in job logs");
            return Some(version.to_string());
        }
    }
    None
}

/// Mine pytest `FAILED` lines into a categorized failure report.
///
/// Duplicates and order of appearance are preserved; `total_failures` counts
/// raw matches, not distinct test ids. Error types are aggregated run-wide,
/// not attributed to individual tests, and every display name carries the
/// full aggregate set.
pub fn extract_test_failures(logs: &str) -> FailureReport {
    let clean = strip_ansi(logs);

    // FAILED test_module.py::TestClass::test_method - ValueError: ...
    let failed =
        Regex::new(r"(?i)FAILED\s+([^:\n]+::[^\n-]+)").expect("regex for FAILED lines");
    let raw_names: Vec<String> = failed
        .captures_iter(&clean)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim_end().to_string())
        .collect();

    let mut error_types: BTreeSet<String> = BTreeSet::new();
    let explicit = Regex::new(r"(?i)FAILED\s+[^\n-]+ - (\w+(?:Error|Exception)):")
        .expect("regex for explicit error types");
    for cap in explicit.captures_iter(&clean) {
        if let Some(m) = cap.get(1) {
            error_types.insert(m.as_str().to_string());
        }
    }
    let asserts =
        Regex::new(r"(?i)FAILED\s+[^\n-]+ - (assert)").expect("regex for assert failures");
    if asserts.is_match(&clean) {
        error_types.insert("assert".to_string());
    }
    // Bare asserts surface as AssertionError for consistency.
    if error_types.remove("assert") {
        error_types.insert("AssertionError".to_string());
    }

    let mut zarr_related = Vec::new();
    let mut other_failures = Vec::new();
    for raw in &raw_names {
        let lowered = raw.to_lowercase();
        let related = ZARR_KEYWORDS.iter().any(|keyword| lowered.contains(keyword));
        let display = display_name(raw, &error_types);
        if related {
            zarr_related.push(display);
        } else {
            other_failures.push(display);
        }
    }

    FailureReport {
        zarr_related,
        other_failures,
        error_types,
        total_failures: raw_names.len(),
    }
}

/// Keep at most the last two `::` segments (class and method), dropping the
/// file-path prefix, then append the aggregate error types when present.
fn display_name(raw: &str, error_types: &BTreeSet<String>) -> String {
    let segments: Vec<&str> = raw.split("::").collect();
    let short = if segments.len() > 2 {
        segments[segments.len() - 2..].join("::")
    } else {
        raw.to_string()
    };
    if error_types.is_empty() {
        short
    } else {
        let joined = error_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{short} ({joined})")
    }
}

/// Strip terminal color escapes. The capture source sometimes drops the ESC
/// byte, so the bare `[0m`-style remnant is stripped too.
fn strip_ansi(text: &str) -> String {
    let re = Regex::new(r"\x1b\[[0-9;]*m|\[[0-9;]*m").expect("regex for ANSI escapes");
    re.replace_all(text, "").into_owned()
}
