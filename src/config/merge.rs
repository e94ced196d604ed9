//! Environment-to-config merge.
//!
//! Folds the environment snapshot into the persisted gateway config. The
//! merge only writes the keys it owns; everything else in the document is
//! carried through untouched, and applying it twice with the same
//! environment yields the same document.

use super::defaults::*;
use super::env::EnvSnapshot;
use super::types::{ChannelKind, ModelProviderConfig};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// What a merge pass changed, for the startup log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub legacy_anthropic_removed: bool,
    pub auth_token_applied: bool,
    pub insecure_auth_enabled: bool,
    pub channels_applied: Vec<&'static str>,
    pub anthropic_override_applied: bool,
}

/// Merge environment-derived settings into `config` in place.
pub fn merge_env_into_config(config: &mut Map<String, Value>, env: &EnvSnapshot) -> MergeSummary {
    let mut summary = MergeSummary::default();

    ensure_object(config, &["gateway"]);
    ensure_object(config, &["channels"]);
    ensure_object(config, &["agents", "defaults", "model"])
        .insert("primary".to_string(), json!(DEFAULT_MODEL));

    summary.legacy_anthropic_removed = remove_legacy_anthropic(config);

    let gateway = ensure_object(config, &["gateway"]);
    gateway.insert("port".to_string(), json!(DEFAULT_GATEWAY_PORT));
    gateway.insert("mode".to_string(), json!(DEFAULT_GATEWAY_MODE));
    gateway.insert("trustedProxies".to_string(), json!(DEFAULT_TRUSTED_PROXIES));

    if let Some(token) = env.gateway_token() {
        ensure_object(config, &["gateway", "auth"]).insert("token".to_string(), json!(token));
        summary.auth_token_applied = true;
    }

    if env.dev_mode() {
        ensure_object(config, &["gateway", "controlUi"])
            .insert("allowInsecureAuth".to_string(), json!(true));
        summary.insecure_auth_enabled = true;
    }

    for kind in ChannelKind::ALL {
        let Some(creds) = kind.credentials(env) else {
            debug!(channel = kind.key(), "No credentials in environment, leaving channel as is");
            continue;
        };

        let channel = ensure_object(config, &["channels", kind.key()]);
        channel.insert("enabled".to_string(), json!(true));
        for (field, value) in &creds.fields {
            channel.insert((*field).to_string(), json!(value));
        }
        ensure_object(channel, &["dm"]).insert("policy".to_string(), json!(creds.dm_policy));
        summary.channels_applied.push(kind.key());
    }

    if let Some(base_url) = env.get(ENV_ANTHROPIC_BASE_URL) {
        let provider = ModelProviderConfig::anthropic_catalog(
            base_url,
            env.get(ENV_ANTHROPIC_API_KEY),
        );
        match serde_json::to_value(&provider) {
            Ok(value) => {
                ensure_object(config, &["models", "providers"])
                    .insert("anthropic".to_string(), value);
                summary.anthropic_override_applied = true;
                info!(base_url, "Configured Anthropic provider from base URL override");
            }
            Err(e) => warn!("Failed to serialize Anthropic provider block: {e}"),
        }
    }

    summary
}

/// Drop `models.providers.anthropic` when any model entry lacks a `name`.
///
/// Returns `true` if the block was removed.
fn remove_legacy_anthropic(config: &mut Map<String, Value>) -> bool {
    let Some(providers) = config
        .get_mut("models")
        .and_then(|m| m.get_mut("providers"))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };

    let is_legacy = providers
        .get("anthropic")
        .and_then(|p| p.get("models"))
        .and_then(Value::as_array)
        .is_some_and(|models| models.iter().any(|m| m.get("name").is_none()));

    if is_legacy {
        providers.remove("anthropic");
        warn!("Removed legacy Anthropic provider block with unnamed model entries");
    }
    is_legacy
}

/// Walk `path` from `root`, creating empty objects for missing segments and
/// replacing non-object values in the way, and return the innermost object.
pub fn ensure_object<'a>(
    root: &'a mut Map<String, Value>,
    path: &[&str],
) -> &'a mut Map<String, Value> {
    let mut current = root;
    for key in path {
        let slot = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            warn!(key, "Replacing non-object config value with an object");
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            unreachable!("slot holds an object");
        };
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn merge(doc: Value, env: &[(&str, &str)]) -> Value {
        let Value::Object(mut map) = doc else {
            panic!("test documents are objects");
        };
        merge_env_into_config(&mut map, &EnvSnapshot::from_pairs(env.iter().copied()));
        Value::Object(map)
    }

    #[test]
    fn empty_doc_gets_pinned_sections() {
        let out = merge(json!({}), &[]);
        assert_eq!(
            out,
            json!({
                "agents": { "defaults": { "model": { "primary": DEFAULT_MODEL } } },
                "gateway": {
                    "port": 18789,
                    "mode": "local",
                    "trustedProxies": ["10.1.0.0"]
                },
                "channels": {}
            })
        );
    }

    #[test]
    fn model_is_always_pinned() {
        let out = merge(
            json!({"agents": {"defaults": {"model": {
                "primary": "openai/gpt-4o",
                "fallbacks": ["x"]
            }}}}),
            &[],
        );
        assert_eq!(out["agents"]["defaults"]["model"]["primary"], DEFAULT_MODEL);
        assert_eq!(out["agents"]["defaults"]["model"]["fallbacks"], json!(["x"]));
    }

    #[test]
    fn unrelated_keys_survive() {
        let doc = json!({
            "custom": {"nested": [1, 2, {"deep": null}]},
            "gateway": {"port": 1, "bind": "loopback", "auth": {"mode": "token"}},
            "channels": {"whatsapp": {"enabled": true}},
            "tools": {"allow": ["bash"]}
        });
        let out = merge(doc.clone(), &[]);
        assert_eq!(out["custom"], doc["custom"]);
        assert_eq!(out["tools"], doc["tools"]);
        assert_eq!(out["channels"]["whatsapp"], doc["channels"]["whatsapp"]);
        assert_eq!(out["gateway"]["bind"], "loopback");
        assert_eq!(out["gateway"]["auth"], json!({"mode": "token"}));
        assert_eq!(out["gateway"]["port"], 18789);
    }

    #[test]
    fn non_object_ancestors_are_replaced() {
        let out = merge(json!({"gateway": "broken", "agents": 3, "channels": []}), &[]);
        assert_eq!(out["gateway"]["port"], 18789);
        assert_eq!(out["agents"]["defaults"]["model"]["primary"], DEFAULT_MODEL);
        assert_eq!(out["channels"], json!({}));
    }

    #[test]
    fn token_sets_auth_without_touching_siblings() {
        let out = merge(
            json!({"gateway": {"auth": {"mode": "token", "token": "old"}}}),
            &[(ENV_GATEWAY_TOKEN, "new-token")],
        );
        assert_eq!(out["gateway"]["auth"], json!({"mode": "token", "token": "new-token"}));
    }

    #[test]
    fn missing_token_keeps_existing_auth() {
        let out = merge(json!({"gateway": {"auth": {"token": "persisted"}}}), &[]);
        assert_eq!(out["gateway"]["auth"]["token"], "persisted");
    }

    #[test]
    fn dev_mode_allows_insecure_auth() {
        let out = merge(json!({}), &[(ENV_DEV_MODE, "true")]);
        assert_eq!(out["gateway"]["controlUi"]["allowInsecureAuth"], true);

        let out = merge(json!({}), &[(ENV_DEV_MODE, "yes")]);
        assert!(out["gateway"].get("controlUi").is_none());
    }

    #[test]
    fn dev_mode_off_leaves_control_ui_untouched() {
        let out = merge(json!({"gateway": {"controlUi": {"allowInsecureAuth": true}}}), &[]);
        assert_eq!(out["gateway"]["controlUi"]["allowInsecureAuth"], true);
    }

    #[test]
    fn telegram_enabled_with_default_policy() {
        let out = merge(json!({}), &[(ENV_TELEGRAM_BOT_TOKEN, "123:abc")]);
        assert_eq!(
            out["channels"]["telegram"],
            json!({"enabled": true, "botToken": "123:abc", "dm": {"policy": "pairing"}})
        );
    }

    #[test]
    fn discord_policy_override_keeps_existing_fields() {
        let out = merge(
            json!({"channels": {"discord": {
                "enabled": false,
                "dm": {"allowFrom": ["42"]},
                "guilds": {}
            }}}),
            &[(ENV_DISCORD_BOT_TOKEN, "tok"), (ENV_DISCORD_DM_POLICY, "allowlist")],
        );
        assert_eq!(
            out["channels"]["discord"],
            json!({
                "enabled": true,
                "token": "tok",
                "guilds": {},
                "dm": {"policy": "allowlist", "allowFrom": ["42"]}
            })
        );
    }

    #[test]
    fn slack_needs_both_tokens() {
        let out = merge(json!({}), &[(ENV_SLACK_BOT_TOKEN, "xoxb")]);
        assert!(out["channels"].get("slack").is_none());

        let out = merge(
            json!({}),
            &[(ENV_SLACK_BOT_TOKEN, "xoxb"), (ENV_SLACK_APP_TOKEN, "xapp")],
        );
        assert_eq!(out["channels"]["slack"]["botToken"], "xoxb");
        assert_eq!(out["channels"]["slack"]["appToken"], "xapp");
        assert_eq!(out["channels"]["slack"]["enabled"], true);
    }

    #[test]
    fn providers_never_disabled_by_omission() {
        let first = merge(json!({}), &[(ENV_TELEGRAM_BOT_TOKEN, "123:abc")]);
        let second = merge(first.clone(), &[]);
        assert_eq!(second["channels"]["telegram"], first["channels"]["telegram"]);
    }

    #[test]
    fn legacy_anthropic_removed() {
        let doc = json!({
            "models": {"providers": {
                "anthropic": {"baseUrl": "x", "models": [{"id": "a", "name": "A"}, {"id": "b"}]},
                "openai": {"baseUrl": "y", "models": [{"id": "c"}]}
            }}
        });
        let out = merge(doc, &[]);
        assert!(out["models"]["providers"].get("anthropic").is_none());
        assert_eq!(out["models"]["providers"]["openai"]["baseUrl"], "y");
    }

    #[test]
    fn named_anthropic_models_are_kept() {
        let doc = json!({
            "models": {"providers": {"anthropic": {
                "baseUrl": "x",
                "models": [{"id": "a", "name": "A"}]
            }}}
        });
        let out = merge(doc.clone(), &[]);
        assert_eq!(out["models"], doc["models"]);
    }

    #[test]
    fn legacy_anthropic_recreated_by_override() {
        let doc = json!({
            "models": {"providers": {"anthropic": {"baseUrl": "old", "models": [{"id": "b"}]}}}
        });
        let out = merge(doc, &[(ENV_ANTHROPIC_BASE_URL, "https://gw.example/anthropic")]);
        let anthropic = &out["models"]["providers"]["anthropic"];
        assert_eq!(anthropic["baseUrl"], "https://gw.example/anthropic");
        assert_eq!(anthropic["models"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn anthropic_override_without_key() {
        let out = merge(json!({}), &[(ENV_ANTHROPIC_BASE_URL, "https://gw.example")]);
        assert_eq!(
            out["models"]["providers"]["anthropic"],
            json!({
                "baseUrl": "https://gw.example",
                "api": "anthropic-messages",
                "models": [
                    {
                        "id": "claude-sonnet-4-20250514",
                        "name": "Claude Sonnet 4",
                        "contextWindow": 200000
                    },
                    {
                        "id": "claude-opus-4-5-20251101",
                        "name": "Claude Opus 4.5",
                        "contextWindow": 200000
                    },
                    {
                        "id": "claude-3-5-haiku-20241022",
                        "name": "Claude Haiku 3.5",
                        "contextWindow": 200000
                    }
                ]
            })
        );
    }

    #[test]
    fn anthropic_override_with_key() {
        let out = merge(
            json!({}),
            &[(ENV_ANTHROPIC_BASE_URL, "https://gw.example"), (ENV_ANTHROPIC_API_KEY, "sk-ant")],
        );
        assert_eq!(out["models"]["providers"]["anthropic"]["apiKey"], "sk-ant");
    }

    #[test]
    fn api_key_alone_does_nothing() {
        let out = merge(json!({}), &[(ENV_ANTHROPIC_API_KEY, "sk-ant")]);
        assert!(out.get("models").is_none());
    }

    #[test]
    fn merge_is_idempotent() {
        let env = [
            (ENV_GATEWAY_TOKEN, "t"),
            (ENV_DEV_MODE, "true"),
            (ENV_TELEGRAM_BOT_TOKEN, "123:abc"),
            (ENV_SLACK_BOT_TOKEN, "xoxb"),
            (ENV_SLACK_APP_TOKEN, "xapp"),
            (ENV_ANTHROPIC_BASE_URL, "https://gw.example"),
        ];
        let once = merge(json!({"custom": 1}), &env);
        let twice = merge(once.clone(), &env);
        assert_eq!(once, twice);
    }

    #[test]
    fn summary_reports_changes() {
        let mut map = Map::new();
        let env = EnvSnapshot::from_pairs([
            (ENV_GATEWAY_TOKEN, "t"),
            (ENV_DISCORD_BOT_TOKEN, "d"),
        ]);
        let summary = merge_env_into_config(&mut map, &env);
        assert!(summary.auth_token_applied);
        assert!(!summary.insecure_auth_enabled);
        assert_eq!(summary.channels_applied, vec!["discord"]);
        assert!(!summary.anthropic_override_applied);
        assert!(!summary.legacy_anthropic_removed);
    }
}
