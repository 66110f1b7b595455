use crate::config::Config;
use crate::error::ConfigError;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut reject = |field: &str, message: String| {
        errors.push(ConfigError::Validation {
            field: field.to_string(),
            message,
        });
    };

    // address: host:port
    match config.backend.address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
        _ => reject(
            "backend.address",
            format!("must be host:port, got {:?}", config.backend.address),
        ),
    }

    if config.backend.channel_capacity == 0 {
        reject("backend.channel_capacity", "must be at least 1".to_string());
    }

    if config.session.cwd.is_empty() {
        reject("session.cwd", "must not be empty".to_string());
    }

    if config.session.adapter_id.trim().is_empty() {
        reject("session.adapter_id", "must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// First violation of [`validate`], for callers that report one error.
pub(crate) fn validate_first(config: &Config) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: &ConfigError) -> &str {
        match err {
            ConfigError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn address_without_port_rejected() {
        let mut cfg = Config::default();
        cfg.backend.address = "localhost".into();
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(field_of(&errs[0]), "backend.address");
    }

    #[test]
    fn address_with_bad_port_rejected() {
        let mut cfg = Config::default();
        cfg.backend.address = "localhost:99999".into();
        assert_eq!(field_of(&validate(&cfg).unwrap_err()[0]), "backend.address");

        cfg.backend.address = ":5678".into();
        assert_eq!(field_of(&validate(&cfg).unwrap_err()[0]), "backend.address");
    }

    #[test]
    fn hostname_address_allowed() {
        let mut cfg = Config::default();
        cfg.backend.address = "kernel.internal:5678".into();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.backend.channel_capacity = 0;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(field_of(&errs[0]), "backend.channel_capacity");
    }

    #[test]
    fn empty_cwd_rejected() {
        let mut cfg = Config::default();
        cfg.session.cwd = String::new();
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(field_of(&errs[0]), "session.cwd");
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.backend.address = String::new();
        cfg.backend.channel_capacity = 0;
        cfg.session.cwd = String::new();
        cfg.session.adapter_id = " ".into();
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 4);
    }

    #[test]
    fn validate_first_reports_first_field() {
        let mut cfg = Config::default();
        cfg.backend.channel_capacity = 0;
        cfg.session.cwd = String::new();
        let err = validate_first(&cfg).unwrap_err();
        assert_eq!(field_of(&err), "backend.channel_capacity");
    }
}
