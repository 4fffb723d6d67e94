use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rules::{Command, Restriction, Trigger};

/// Rule tables and runtime settings, loaded once before the engine starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotConfig {
    pub commands: BTreeMap<String, Command>,
    pub triggers: BTreeMap<String, Trigger>,
    pub enabled_modules: Vec<String>,
    pub module_config: BTreeMap<String, serde_json::Value>,
    pub database_path: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub main_channel: String,
    pub channels: Vec<String>,
    pub ignored_users: Vec<String>,
    /// Static follower list served by the bundled profile lookup.
    pub followers: Vec<String>,
    pub grants: GrantConfig,
    pub counter_report: CounterReportConfig,
    pub follower_refresh_secs: u64,
    /// Initial stream status; commands not marked `offline` only run while streaming.
    pub streaming: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
            triggers: BTreeMap::new(),
            enabled_modules: Vec::new(),
            module_config: BTreeMap::new(),
            database_path: None,
            media_path: None,
            main_channel: String::new(),
            channels: Vec::new(),
            ignored_users: Vec::new(),
            followers: Vec::new(),
            grants: GrantConfig::default(),
            counter_report: CounterReportConfig::default(),
            follower_refresh_secs: 300,
            streaming: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrantConfig {
    /// Seeded into a user's balance the first time they are seen.
    pub starting: u64,
    /// Earned per non-command chat line.
    pub chat: u64,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            starting: 2500,
            chat: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterReportConfig {
    pub names: Vec<String>,
    pub interval_secs: u64,
    /// Channel reports are sent to; the main channel when unset.
    pub channel: Option<String>,
}

impl Default for CounterReportConfig {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            interval_secs: 30,
            channel: None,
        }
    }
}

impl BotConfig {
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        let config: BotConfig = serde_json::from_reader(reader)?;
        Ok(config.normalized())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let config: BotConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Command names come from their map keys and are matched lower-cased.
    fn normalized(mut self) -> Self {
        self.commands = std::mem::take(&mut self.commands)
            .into_iter()
            .map(|(key, mut cmd)| {
                let name = key.to_lowercase();
                cmd.name = name.clone();
                (name, cmd)
            })
            .collect();
        self
    }

    pub fn is_module_enabled(&self, module: &str) -> bool {
        self.enabled_modules.iter().any(|m| m == module)
    }

    pub fn is_ignored_user(&self, name: &str) -> bool {
        self.ignored_users.iter().any(|u| u.eq_ignore_ascii_case(name))
    }

    /// Restriction tags no predicate understands, as `(command, tag)` pairs.
    pub fn unknown_restrictions(&self) -> Vec<(&str, &str)> {
        self.commands
            .values()
            .flat_map(|cmd| {
                cmd.restrictions.iter().filter_map(move |r| match r {
                    Restriction::Unknown(tag) => Some((cmd.name.as_str(), tag.as_str())),
                    _ => None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ActionName;

    const SAMPLE: &str = r#"{
        "commands": {
            "Hug": {
                "description": "hug the chat",
                "enabled": true,
                "points": 5,
                "actions": [
                    { "name": "reply::Say", "args": { "message": "sends a hug!" } }
                ],
                "restrictions": ["subscriber", "moderator"]
            }
        },
        "triggers": {
            "twitch::raid": { "actions": [ { "name": "reply::Say", "args": { "message": "raid!" } } ] }
        },
        "enabledModules": ["reply"],
        "moduleConfig": { "reply": { "prefix": "> " } },
        "mainChannel": "erikdotdev"
    }"#;

    #[test]
    fn parses_and_normalizes_command_names() {
        let config = BotConfig::from_json(SAMPLE).unwrap();
        let hug = config.commands.get("hug").expect("lower-cased key");
        assert_eq!(hug.name, "hug");
        assert_eq!(hug.points, 5);
        assert_eq!(hug.actions[0].name, ActionName::new("reply", "Say"));
        assert_eq!(config.triggers.len(), 1);
        assert!(config.is_module_enabled("reply"));
        assert!(!config.is_module_enabled("points"));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = BotConfig::from_json("{}").unwrap();
        assert_eq!(config.grants.starting, 2500);
        assert_eq!(config.grants.chat, 10);
        assert_eq!(config.counter_report.interval_secs, 30);
        assert_eq!(config.follower_refresh_secs, 300);
        assert!(config.streaming);
    }

    #[test]
    fn reports_unknown_restriction_tags() {
        let config = BotConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.unknown_restrictions(), vec![("hug", "moderator")]);
    }

    #[test]
    fn rejects_malformed_action_names() {
        let bad = r#"{ "triggers": { "x::y": { "actions": [ { "name": "nope" } ] } } }"#;
        assert!(BotConfig::from_json(bad).is_err());
    }
}
