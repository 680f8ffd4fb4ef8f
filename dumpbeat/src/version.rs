//! Build identification.

use std::sync::OnceLock;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Set by the release build, `unknown` otherwise.
pub const BUILD_TIME: &str = match option_env!("DUMPBEAT_BUILD_TIME") {
    Some(v) => v,
    None => "unknown",
};

pub const COMMIT: &str = match option_env!("DUMPBEAT_COMMIT") {
    Some(v) => v,
    None => "unknown",
};

static LONG_VERSION: OnceLock<String> = OnceLock::new();

/// One-line version banner, e.g. `1.0.0 (commit abc123, built 2024-03-15T10:00:00Z)`.
pub fn long_version() -> &'static str {
    LONG_VERSION.get_or_init(|| format!("{} (commit {}, built {})", VERSION, COMMIT, BUILD_TIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_version_starts_with_package_version() {
        let v = long_version();
        assert!(v.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(v.contains("commit "));
    }
}
