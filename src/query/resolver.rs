use crate::config::{AppConfig, Provider};
use crate::query::GenerateError;
use std::fmt;
use tracing::{info, warn};

/// Where the credential handed to the client adapter came from. Emitted in
/// trace events for operability; never affects behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Parameter,
    Configured,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Parameter => f.write_str("parameter"),
            CredentialSource::Configured => f.write_str("config"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub api_key: String,
    pub source: CredentialSource,
}

/// Selects the provider and credential for one request.
///
/// An explicit preference pins the provider, with the inline credential
/// falling back to that provider's configured key. Otherwise an inline
/// credential selects OpenAI (the first-class default), and with neither,
/// configured providers are probed in fixed priority order: OpenAI, then
/// Anthropic.
pub fn resolve(
    config: &AppConfig,
    preference: Option<&str>,
    inline_key: Option<&str>,
) -> Result<ResolvedProvider, GenerateError> {
    let preference = preference.map(Provider::parse).unwrap_or(Provider::Unknown);
    let inline_key = inline_key.unwrap_or("");

    match preference {
        Provider::OpenAi | Provider::Anthropic => {
            info!(
                "Explicit {} provider selection from parameter",
                preference.as_str()
            );
            resolve_explicit(config, preference, inline_key)
        }
        Provider::Unknown => {
            if !inline_key.is_empty() {
                info!("Auto-selecting OpenAI provider (API key provided, no provider specified)");
                return Ok(ResolvedProvider {
                    provider: Provider::OpenAi,
                    api_key: inline_key.to_string(),
                    source: CredentialSource::Parameter,
                });
            }

            for candidate in [Provider::OpenAi, Provider::Anthropic] {
                if let Some(profile) = config.provider_profile(candidate) {
                    if !profile.api_key.is_empty() {
                        info!(
                            "Auto-selecting {} provider based on configuration",
                            candidate.as_str()
                        );
                        return Ok(ResolvedProvider {
                            provider: candidate,
                            api_key: profile.api_key.clone(),
                            source: CredentialSource::Configured,
                        });
                    }
                }
            }

            warn!("No API key found in config");
            Err(GenerateError::NoCredential(
                "API key required. Pass api_key with the request or configure an OpenAI or \
                 Anthropic API key in the configuration file."
                    .to_string(),
            ))
        }
    }
}

fn resolve_explicit(
    config: &AppConfig,
    provider: Provider,
    inline_key: &str,
) -> Result<ResolvedProvider, GenerateError> {
    if !inline_key.is_empty() {
        return Ok(ResolvedProvider {
            provider,
            api_key: inline_key.to_string(),
            source: CredentialSource::Parameter,
        });
    }

    if let Some(profile) = config.provider_profile(provider) {
        if !profile.api_key.is_empty() {
            info!("Using {} API key from configuration", provider.as_str());
            return Ok(ResolvedProvider {
                provider,
                api_key: profile.api_key.clone(),
                source: CredentialSource::Configured,
            });
        }
    }

    Err(GenerateError::NoCredential(format!(
        "No API key available for {} provider. Pass api_key with the request or set it in \
         the [{}] section of the configuration file.",
        provider.as_str(),
        provider.as_str()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(openai: &str, anthropic: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.openai.api_key = openai.to_string();
        config.anthropic.api_key = anthropic.to_string();
        config
    }

    #[test]
    fn explicit_preference_uses_configured_credential() {
        let config = config_with_keys("sk-openai", "sk-ant");
        let resolved = resolve(&config, Some("anthropic"), None).unwrap();
        assert_eq!(resolved.provider, Provider::Anthropic);
        assert_eq!(resolved.api_key, "sk-ant");
        assert_eq!(resolved.source, CredentialSource::Configured);
    }

    #[test]
    fn explicit_preference_never_falls_back_to_other_provider() {
        // anthropic has a key, but openai was requested without one
        let config = config_with_keys("", "sk-ant");
        let error = resolve(&config, Some("openai"), None).unwrap_err();
        match error {
            GenerateError::NoCredential(message) => {
                assert!(message.contains("openai"));
                assert!(message.contains("api_key"));
            }
            other => panic!("expected NoCredential, got {:?}", other),
        }
    }

    #[test]
    fn inline_credential_wins_over_configured_for_explicit_provider() {
        let config = config_with_keys("sk-config", "");
        let resolved = resolve(&config, Some("openai"), Some("sk-inline")).unwrap();
        assert_eq!(resolved.api_key, "sk-inline");
        assert_eq!(resolved.source, CredentialSource::Parameter);
    }

    #[test]
    fn auto_with_inline_credential_defaults_to_openai() {
        let config = config_with_keys("", "sk-ant");
        let resolved = resolve(&config, None, Some("sk-inline")).unwrap();
        assert_eq!(resolved.provider, Provider::OpenAi);
        assert_eq!(resolved.api_key, "sk-inline");
    }

    #[test]
    fn auto_probes_openai_before_anthropic() {
        let config = config_with_keys("sk-openai", "sk-ant");
        let resolved = resolve(&config, None, None).unwrap();
        assert_eq!(resolved.provider, Provider::OpenAi);

        let config = config_with_keys("", "sk-ant");
        let resolved = resolve(&config, Some("auto"), None).unwrap();
        assert_eq!(resolved.provider, Provider::Anthropic);
        assert_eq!(resolved.api_key, "sk-ant");
    }

    #[test]
    fn no_credential_anywhere_fails_with_supply_paths() {
        let config = config_with_keys("", "");
        let error = resolve(&config, None, None).unwrap_err();
        match error {
            GenerateError::NoCredential(message) => {
                assert!(message.contains("api_key"));
                assert!(message.contains("configuration file"));
            }
            other => panic!("expected NoCredential, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_preference_is_treated_as_auto() {
        let config = config_with_keys("sk-openai", "");
        let resolved = resolve(&config, Some("gemini"), None).unwrap();
        assert_eq!(resolved.provider, Provider::OpenAi);
        assert_eq!(resolved.source, CredentialSource::Configured);
    }
}
