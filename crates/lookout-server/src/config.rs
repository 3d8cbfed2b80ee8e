use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use lookout_platform::client::DEFAULT_API_BASE;
use lookout_types::GuildId;
use lookout_watchlist::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_base: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Guilds to load at startup. Empty means "ask the platform".
    pub guilds: Vec<GuildId>,
    pub relay_attempts: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bot_token = var("LOOKOUT_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            bail!("LOOKOUT_BOT_TOKEN is unset; set it in your .env file and restart");
        }

        let port = match var("LOOKOUT_PORT") {
            Some(port) => port.parse().context("LOOKOUT_PORT is not a valid port")?,
            None => 3000,
        };
        let relay_attempts = match var("LOOKOUT_RELAY_ATTEMPTS") {
            Some(n) => n
                .parse()
                .context("LOOKOUT_RELAY_ATTEMPTS is not a number")?,
            None => RetryPolicy::default().attempts,
        };
        let guilds = parse_guilds(&var("LOOKOUT_GUILDS").unwrap_or_default())?;

        Ok(Self {
            bot_token: bot_token.trim().to_string(),
            api_base: var("LOOKOUT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            db_path: var("LOOKOUT_DB_PATH")
                .unwrap_or_else(|| "lookout.db".into())
                .into(),
            host: var("LOOKOUT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            guilds,
            relay_attempts: relay_attempts.max(1),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.relay_attempts,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Comma separated guild ids; blanks are ignored.
fn parse_guilds(raw: &str) -> anyhow::Result<Vec<GuildId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("invalid guild id `{s}` in LOOKOUT_GUILDS"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("LOOKOUT_BOT_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn defaults() {
        let config = config(&[("LOOKOUT_BOT_TOKEN", "abc")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.db_path, PathBuf::from("lookout.db"));
        assert!(config.guilds.is_empty());
        assert_eq!(config.relay_attempts, 3);
    }

    #[test]
    fn guild_list_is_parsed() {
        let config = config(&[
            ("LOOKOUT_BOT_TOKEN", "abc"),
            ("LOOKOUT_GUILDS", " 1, 2,,3 "),
            ("LOOKOUT_RELAY_ATTEMPTS", "0"),
        ])
        .unwrap();
        assert_eq!(config.guilds, vec![GuildId(1), GuildId(2), GuildId(3)]);
        assert_eq!(config.relay_attempts, 1);

        assert!(parse_guilds("1,two").is_err());
    }
}
