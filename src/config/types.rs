use super::defaults::*;
use super::env::EnvSnapshot;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Model Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelApi {
    AnthropicMessages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinitionConfig {
    pub id: String,
    pub name: String,
    pub context_window: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProviderConfig {
    pub base_url: String,
    pub api: ModelApi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelDefinitionConfig>,
}

impl ModelProviderConfig {
    /// The fixed Anthropic catalog served from an overridden base URL.
    pub fn anthropic_catalog(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api: ModelApi::AnthropicMessages,
            api_key: api_key.map(String::from),
            models: ANTHROPIC_MODEL_CATALOG
                .iter()
                .map(|(id, name)| ModelDefinitionConfig {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                    context_window: ANTHROPIC_CONTEXT_WINDOW,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Channel Configuration
// ============================================================================

/// Chat platforms the bootstrap can enable from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Discord,
    Slack,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [Self::Telegram, Self::Discord, Self::Slack];

    /// Key under `channels` in the config document.
    pub fn key(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Slack => "slack",
        }
    }

    /// Config field name paired with each required env variable.
    fn credential_vars(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Telegram => &[("botToken", ENV_TELEGRAM_BOT_TOKEN)],
            Self::Discord => &[("token", ENV_DISCORD_BOT_TOKEN)],
            Self::Slack => &[
                ("botToken", ENV_SLACK_BOT_TOKEN),
                ("appToken", ENV_SLACK_APP_TOKEN),
            ],
        }
    }

    fn dm_policy_var(self) -> &'static str {
        match self {
            Self::Telegram => ENV_TELEGRAM_DM_POLICY,
            Self::Discord => ENV_DISCORD_DM_POLICY,
            Self::Slack => ENV_SLACK_DM_POLICY,
        }
    }

    /// Resolve credentials for this channel.
    ///
    /// Returns `None` unless every required variable is set; partial
    /// credentials count as absent.
    pub fn credentials(self, env: &EnvSnapshot) -> Option<ChannelCredentials> {
        let fields = self
            .credential_vars()
            .iter()
            .map(|(field, var)| env.get(var).map(|v| (*field, v.to_string())))
            .collect::<Option<Vec<_>>>()?;

        let dm_policy = match env.get(self.dm_policy_var()) {
            Some(policy) => {
                if !KNOWN_DM_POLICIES.contains(&policy) {
                    warn!(
                        channel = self.key(),
                        policy, "Unrecognized DM policy, passing it through to the gateway"
                    );
                }
                policy.to_string()
            }
            None => DEFAULT_DM_POLICY.to_string(),
        };

        Some(ChannelCredentials { fields, dm_policy })
    }
}

/// Credentials and DM policy resolved for one channel.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelCredentials {
    pub fields: Vec<(&'static str, String)>,
    pub dm_policy: String,
}

impl std::fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ChannelCredentials")
            .field("fields", &names)
            .field("dm_policy", &self.dm_policy)
            .finish()
    }
}

// ============================================================================
// Default Document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultModelConfig {
    pub primary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultAgentConfig {
    pub workspace: String,
    pub model: DefaultModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultAgentsConfig {
    pub defaults: DefaultAgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultGatewayConfig {
    pub port: u16,
    pub mode: String,
}

/// Minimal document written when neither a config file nor a template exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultDocument {
    pub agents: DefaultAgentsConfig,
    pub gateway: DefaultGatewayConfig,
}

impl Default for DefaultDocument {
    fn default() -> Self {
        Self {
            agents: DefaultAgentsConfig {
                defaults: DefaultAgentConfig {
                    workspace: DEFAULT_WORKSPACE.to_string(),
                    model: DefaultModelConfig {
                        primary: DEFAULT_MODEL.to_string(),
                    },
                },
            },
            gateway: DefaultGatewayConfig {
                port: DEFAULT_GATEWAY_PORT,
                mode: DEFAULT_GATEWAY_MODE.to_string(),
            },
        }
    }
}
