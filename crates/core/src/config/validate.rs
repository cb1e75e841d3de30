use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Both API keys are set
/// - Orchestrator limits and retry budget are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return fail("server.port cannot be 0");
    }

    if config.analyzer.api_key.trim().is_empty() {
        return fail("analyzer.api_key is required");
    }
    if config.image.api_key.trim().is_empty() {
        return fail("image.api_key is required");
    }
    if config.analyzer.timeout_secs == 0 || config.image.timeout_secs == 0 {
        return fail("timeouts must be at least 1 second");
    }

    if let Some(ref telegram) = config.notifier.telegram {
        if telegram.bot_token.is_empty() || telegram.chat_id.is_empty() {
            return fail("notifier.telegram needs bot_token and chat_id");
        }
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.max_input_chars == 0 {
        return fail("orchestrator.max_input_chars cannot be 0");
    }
    if orchestrator.retry.max_attempts == 0 {
        return fail("orchestrator.retry.max_attempts cannot be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config() -> Config {
        load_config_from_str(
            r#"
[analyzer]
api_key = "a"

[image]
api_key = "b"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = config();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_blank_api_key_fails() {
        let mut config = config();
        config.image.api_key = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("image.api_key"));
    }

    #[test]
    fn test_validate_zero_retry_budget_fails() {
        let mut config = config();
        config.orchestrator.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }
}
