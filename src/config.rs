// Application configuration, loaded from environment variables and CLI flags.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform auth token. Also guards the inbound message endpoint.
    pub bot_token: String,
    /// Port to bind the HTTP bridge to.
    pub port: u16,
    /// Directory containing creature JSON files.
    pub creatures_dir: PathBuf,
    /// Path of the persisted score file.
    pub userdata_file: PathBuf,
    /// Word users type to catch the active creature.
    pub catch_keyword: String,
    /// Prefix that marks a message as a command.
    pub command_prefix: String,
    /// Range the scheduler draws its spawn interval from, in seconds.
    pub spawn_interval_secs: RangeInclusive<u64>,
    /// Uncaught spawns older than this are cleared. `None` keeps them forever.
    pub spawn_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from the process environment and CLI arguments.
    ///
    /// Environment variables:
    /// - `BOT_TOKEN` - platform auth token (required)
    /// - `PORT` - HTTP bridge port (default: 3000)
    /// - `CREATURES_DIR` - creature definitions (default: `creatures`)
    /// - `USERDATA_FILE` - score file (default: `userdata.json`)
    /// - `CATCH_KEYWORD` - catch phrase (default: `pen`)
    /// - `COMMAND_PREFIX` - command prefix (default: `!`)
    /// - `SPAWN_INTERVAL_MIN_SECS` / `SPAWN_INTERVAL_MAX_SECS` (default: 30 / 90)
    /// - `SPAWN_TIMEOUT_SECS` - expire uncaught spawns (default: never)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a configuration from explicit CLI args and a variable lookup.
    pub fn from_sources<F>(args: &[String], var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = var("BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = match Self::parse_cli_value(args, "--port").or_else(|| var("PORT")) {
            Some(raw) => parse_number("PORT", &raw)?,
            None => 3000,
        };

        let creatures_dir = var("CREATURES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("creatures"));

        let userdata_file = var("USERDATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("userdata.json"));

        let catch_keyword = var("CATCH_KEYWORD")
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "pen".to_string());

        let command_prefix = var("COMMAND_PREFIX")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "!".to_string());

        let min = match var("SPAWN_INTERVAL_MIN_SECS") {
            Some(raw) => parse_number::<u64>("SPAWN_INTERVAL_MIN_SECS", &raw)?,
            None => 30,
        };
        let max = match var("SPAWN_INTERVAL_MAX_SECS") {
            Some(raw) => parse_number::<u64>("SPAWN_INTERVAL_MAX_SECS", &raw)?,
            None => 90,
        };
        if min == 0 {
            return Err(ConfigError::Invalid {
                key: "SPAWN_INTERVAL_MIN_SECS",
                value: min.to_string(),
                reason: "must be at least 1",
            });
        }
        if max < min {
            return Err(ConfigError::Invalid {
                key: "SPAWN_INTERVAL_MAX_SECS",
                value: max.to_string(),
                reason: "must not be below SPAWN_INTERVAL_MIN_SECS",
            });
        }

        let spawn_timeout = match var("SPAWN_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = parse_number::<u64>("SPAWN_TIMEOUT_SECS", &raw)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Config {
            bot_token,
            port,
            creatures_dir,
            userdata_file,
            catch_keyword,
            command_prefix,
            spawn_interval_secs: min..=max,
            spawn_timeout,
        })
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: "not a valid number",
    })
}
