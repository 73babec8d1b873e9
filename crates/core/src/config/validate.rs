use std::path::{Component, Path};

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Bitrate and duration cap are usable
/// - Batch bounds and retry attempts are at least one
/// - Scratch and archive directories are single relative names
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    // Pipeline validation
    if !(8..=512).contains(&config.pipeline.target_bitrate_kbps) {
        return Err(invalid("pipeline.target_bitrate_kbps must be between 8 and 512"));
    }
    if config.pipeline.max_duration_secs == 0 {
        return Err(invalid("pipeline.max_duration_secs must be greater than 0"));
    }

    // Batch validation
    if config.batch.max_concurrent_jobs == 0 {
        return Err(invalid("batch.max_concurrent_jobs must be at least 1"));
    }
    if config.batch.max_jobs_per_batch == 0 {
        return Err(invalid("batch.max_jobs_per_batch must be at least 1"));
    }

    if config.tools.acquire.retry.max_attempts == 0 {
        return Err(invalid("tools.acquire.retry.max_attempts must be at least 1"));
    }

    // Storage validation
    for (key, dir) in [
        ("storage.scratch_dir", &config.storage.scratch_dir),
        ("storage.archive_dir", &config.storage.archive_dir),
    ] {
        if !is_single_component(dir) {
            return Err(invalid(format!(
                "{} must be a single relative directory name, got {:?}",
                key, dir
            )));
        }
    }
    if config.storage.scratch_dir == config.storage.archive_dir {
        return Err(invalid(
            "storage.scratch_dir and storage.archive_dir must differ",
        ));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn is_single_component(dir: &str) -> bool {
    let mut components = Path::new(dir).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_bitrate_range() {
        let mut config = Config::default();
        config.pipeline.target_bitrate_kbps = 4;
        assert!(validate_config(&config).is_err());
        config.pipeline.target_bitrate_kbps = 512;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.batch.max_concurrent_jobs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retry_attempts_fails() {
        let mut config = Config::default();
        config.tools.acquire.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_storage_dirs() {
        for bad in ["", "../outside", "a/b", "/abs"] {
            let mut config = Config::default();
            config.storage.archive_dir = bad.to_string();
            assert!(validate_config(&config).is_err(), "{:?} accepted", bad);
        }

        let mut config = Config::default();
        config.storage.archive_dir = ".scratch".to_string();
        assert!(validate_config(&config).is_err());
    }
}
