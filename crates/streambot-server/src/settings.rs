use std::path::PathBuf;

use anyhow::Context;
use streambot_types::config::BotConfig;

/// Process-level settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub db_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub main_channel: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = match var("STREAMBOT_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => var("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join("config.json"),
        };
        let port = var("STREAMBOT_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("STREAMBOT_PORT must be a port number")?;

        Ok(Self {
            config_path,
            db_path: var("STREAMBOT_DB_PATH").map(PathBuf::from),
            host: var("STREAMBOT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            main_channel: var("STREAMBOT_MAIN_CHANNEL"),
        })
    }

    /// Reads the rule file and applies environment overrides.
    pub fn load_config(&self) -> anyhow::Result<BotConfig> {
        let file = std::fs::File::open(&self.config_path)
            .with_context(|| format!("opening config {}", self.config_path.display()))?;
        let mut config = BotConfig::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("parsing config {}", self.config_path.display()))?;
        if let Some(channel) = &self.main_channel {
            config.main_channel = channel.clone();
        }
        Ok(config)
    }

    /// `STREAMBOT_DB_PATH`, then `databasePath`, then `bot.db` beside the executable.
    pub fn database_path(&self, config: &BotConfig) -> PathBuf {
        if let Some(path) = self.db_path.clone().or_else(|| config.database_path.clone()) {
            return path;
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("bot.db")))
            .unwrap_or_else(|| PathBuf::from("bot.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[("HOME", "/home/bot")]).unwrap();
        assert_eq!(s.config_path, PathBuf::from("/home/bot/config.json"));
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 8080);
        assert_eq!(s.db_path, None);
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(settings(&[("STREAMBOT_PORT", "http")]).is_err());
    }

    #[test]
    fn env_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r##"{ "mainChannel": "#file", "databasePath": "/data/file.db" }"##,
        )
        .unwrap();

        let s = settings(&[
            ("STREAMBOT_CONFIG", path.to_str().unwrap()),
            ("STREAMBOT_MAIN_CHANNEL", "#env"),
        ])
        .unwrap();
        let config = s.load_config().unwrap();
        assert_eq!(config.main_channel, "#env");
        assert_eq!(s.database_path(&config), PathBuf::from("/data/file.db"));

        let s = Settings {
            db_path: Some("/tmp/env.db".into()),
            ..s
        };
        assert_eq!(s.database_path(&config), PathBuf::from("/tmp/env.db"));
    }

    #[test]
    fn missing_config_names_the_file() {
        let s = settings(&[("STREAMBOT_CONFIG", "/nonexistent/streambot.json")]).unwrap();
        let err = s.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/streambot.json"));
    }
}
