//! Environment loading helpers

use std::path::PathBuf;

/// Load variables from a `.env` file in the current directory or its parents
///
/// Returns the path of the file that was loaded, if any. A missing file is
/// not an error: deployments usually set real environment variables.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable .env file: {e}");
            None
        }
    }
}

/// Read an environment variable, falling back to `default` when unset or blank
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back() {
        let value = env_or("STOCK_ANALYST_SURELY_UNSET_VARIABLE", "fallback");
        assert_eq!(value, "fallback");
    }

    #[test]
    fn test_env_or_reads_existing() {
        // PATH is set in every test environment we run in
        let value = env_or("PATH", "fallback");
        assert_ne!(value, "fallback");
    }
}
