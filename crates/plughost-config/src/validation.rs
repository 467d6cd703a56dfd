// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::PlughostConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &PlughostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.host.log_level.as_str()) {
        invalid(format!(
            "host.log_level `{}` must be one of: {}",
            config.host.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.plugins.directory.as_os_str().is_empty() {
        invalid("plugins.directory must not be empty".to_string());
    }

    let ext = config.plugins.bundle_extension.as_str();
    if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
        invalid(format!(
            "plugins.bundle_extension `{ext}` must be a bare extension such as `bundle`"
        ));
    }

    let manifest = config.plugins.manifest_file.as_str();
    if manifest.is_empty() || manifest.contains('/') {
        invalid(format!(
            "plugins.manifest_file `{manifest}` must be a file name at the bundle root"
        ));
    }

    if config.plugins.candidate_token.trim().is_empty() {
        invalid("plugins.candidate_token must not be empty".to_string());
    }

    if config.plugins.max_memory_mb == 0 {
        invalid("plugins.max_memory_mb must be greater than zero".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        invalid("gateway.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        invalid(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if config.gateway.port == 0 {
        invalid("gateway.port must not be 0".to_string());
    }

    if config.gateway.max_upload_mb == 0 {
        invalid("gateway.max_upload_mb must be greater than zero".to_string());
    }

    if let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        invalid("gateway.bearer_token must not be blank when set".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&PlughostConfig::default()).is_ok());
    }

    #[test]
    fn dotted_extension_is_rejected() {
        let mut config = PlughostConfig::default();
        config.plugins.bundle_extension = ".bundle".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("bundle_extension"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = PlughostConfig::default();
        config.host.log_level = "loud".to_string();
        config.gateway.port = 0;
        config.plugins.max_memory_mb = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn blank_bearer_token_is_rejected() {
        let mut config = PlughostConfig::default();
        config.gateway.bearer_token = Some("   ".to_string());
        assert!(validate_config(&config).is_err());
    }
}
