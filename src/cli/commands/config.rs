//! Config command - show and edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{PoolError, PoolResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Execute the config command
pub fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> PoolResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force)?,
        Some(ConfigAction::Set { key, value }) => {
            let mut config = config.clone();
            set_value(&mut config, &key, &value).map_err(|reason| PoolError::ConfigInvalid {
                path: manager.path().to_path_buf(),
                reason,
            })?;
            manager.save(&config)?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }
    Ok(())
}

fn show_config(config: &Config) -> PoolResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn init_config(manager: &ConfigManager, force: bool) -> PoolResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!("Config already exists at {}", path.display()),
        );
        ui::remark(&ctx, "Use --force to overwrite");
        return Ok(());
    }

    manager.save(&Config::default())?;
    ui::step_ok(&ctx, &format!("Configuration initialized ({})", path.display()));
    Ok(())
}

/// Set a dot-separated key
fn set_value(config: &mut Config, key: &str, value: &str) -> Result<(), String> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_level"] => config.general.log_level = value.to_string(),
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => return Err(format!("invalid log format `{}': use text or json", value)),
        },

        ["pool", "dir"] => config.pool.dir = optional(value).map(PathBuf::from),

        ["tools", "git"] => config.tools.git = value.to_string(),
        ["tools", "verseek"] => config.tools.verseek = value.to_string(),
        ["tools", "builder"] => config.tools.builder = value.to_string(),
        ["tools", "builder_args"] => {
            config.tools.builder_args = value.split_whitespace().map(str::to_string).collect()
        }
        ["tools", "dpkg_deb"] => config.tools.dpkg_deb = value.to_string(),
        ["tools", "metadata_cache"] => config.tools.metadata_cache = parse_bool(value)?,
        ["tools", "metadata_cache_dir"] => {
            config.tools.metadata_cache_dir = optional(value).map(PathBuf::from)
        }

        ["privileges", "drop"] => config.privileges.drop = parse_bool(value)?,

        _ => {
            return Err(format!(
                "unknown key `{}' (valid keys: {})",
                key,
                VALID_KEYS.join(", ")
            ))
        }
    }
    Ok(())
}

const VALID_KEYS: &[&str] = &[
    "general.log_level",
    "general.log_format",
    "pool.dir",
    "tools.git",
    "tools.verseek",
    "tools.builder",
    "tools.builder_args",
    "tools.dpkg_deb",
    "tools.metadata_cache",
    "tools.metadata_cache_dir",
    "privileges.drop",
];

/// Empty means unset
fn optional(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("invalid boolean value `{}': use true/false", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_known_keys() {
        let mut config = Config::default();
        set_value(&mut config, "tools.builder", "sbuild").unwrap();
        set_value(&mut config, "tools.builder_args", "--arch-all  --no-clean").unwrap();
        set_value(&mut config, "privileges.drop", "no").unwrap();
        set_value(&mut config, "pool.dir", "/srv/pool").unwrap();

        assert_eq!(config.tools.builder, "sbuild");
        assert_eq!(config.tools.builder_args, vec!["--arch-all", "--no-clean"]);
        assert!(!config.privileges.drop);
        assert_eq!(config.pool.dir, Some(PathBuf::from("/srv/pool")));

        set_value(&mut config, "pool.dir", "").unwrap();
        assert!(config.pool.dir.is_none());
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(set_value(&mut config, "tools.nope", "x").is_err());
        assert!(set_value(&mut config, "privileges.drop", "maybe").is_err());
        assert!(set_value(&mut config, "general.log_format", "xml").is_err());
    }

    #[test]
    fn set_persists_through_manager() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        let args = ConfigArgs {
            action: Some(ConfigAction::Set {
                key: "tools.verseek".to_string(),
                value: "/usr/local/bin/verseek".to_string(),
            }),
        };

        execute(args, &manager, &Config::default()).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.tools.verseek, "/usr/local/bin/verseek");
    }
}
