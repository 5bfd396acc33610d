//! Schema versioning and compatibility.

/// Current schema version for the snapshot document and history lines.
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (field removals, type changes)
/// - MINOR: Additive changes (new optional fields)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Check if a schema version is compatible with current.
pub fn is_compatible(version: &str) -> bool {
    same_major(SCHEMA_VERSION, version)
}

/// Whether `version` shares the major version of `current`.
pub fn same_major(current: &str, version: &str) -> bool {
    let current_major = major(current);
    current_major.is_some() && current_major == major(version)
}

fn major(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|s| s.parse::<u32>().ok())
}
