//! LLM Provider implementations for tinyreact.
//!
//! All providers implement the `tinyreact_core::Provider` trait.
//! [`build_from_config`] selects the provider named by the configuration.

pub mod command;
pub mod openai_compat;
pub mod retry;

pub use command::CommandProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryProvider};

use std::sync::Arc;
use std::time::Duration;
use tinyreact_config::{AppConfig, ProviderKind};
use tinyreact_core::error::ProviderError;
use tinyreact_core::provider::Provider;

/// Build the provider described by `config`.
///
/// The result is not wrapped in a [`RetryProvider`]; the agent applies its
/// own retry policy.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let timeout = Duration::from_secs(config.agent.llm_timeout_secs.max(1));
    match config.provider {
        ProviderKind::OpenaiCompat => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "No API key. Set api_key in ~/.tinyreact/config.toml or TINYREACT_API_KEY".into(),
                )
            })?;
            let name = OpenAiCompatProvider::name_for_url(&config.base_url);
            let provider = OpenAiCompatProvider::new(name, &config.base_url, api_key, timeout)?;
            Ok(Arc::new(provider))
        }
        ProviderKind::Command => {
            if config.command.program.trim().is_empty() {
                return Err(ProviderError::NotConfigured(
                    "command.program is not set".into(),
                ));
            }
            let provider = CommandProvider::new(&config.command.program, config.command.args.clone())
                .with_timeout(timeout);
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_provider_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn http_provider_named_after_endpoint() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "deepseek");
    }

    #[test]
    fn command_provider_from_config() {
        let mut config = AppConfig::default();
        config.provider = ProviderKind::Command;
        config.command.program = "gemini".into();
        config.command.args = vec!["-p".into()];
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }
}
