use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default TOML path and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, the TOML file at
    /// `path` (optional), and `SIMDRIVE_`-prefixed environment variables.
    /// Nested keys use `__`, e.g. `SIMDRIVE_WEBDRIVER__URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if an
    /// environment override has the wrong type.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SIMDRIVE_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {path}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusyPolicy;
    use std::time::Duration;

    #[test]
    fn test_missing_file_yields_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::load_from("config/absent.toml").unwrap();
            assert_eq!(config.server.port, 3000);
            assert_eq!(config.retry.max_date_attempts, 5);
            Ok(())
        });
    }

    #[test]
    fn test_toml_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [server]
                port = 8088

                [timing]
                date_cooldown = "10s"

                [retry]
                busy_policy = "strict"
                "#,
            )?;
            jail.set_env("SIMDRIVE_WEBDRIVER__URL", "http://chromedriver:4444");
            jail.set_env("SIMDRIVE_RETRY__MAX_DATE_ATTEMPTS", "2");

            let config = ConfigLoader::load_from("Config.toml").unwrap();
            assert_eq!(config.server.port, 8088);
            assert_eq!(config.timing.date_cooldown, Duration::from_secs(10));
            assert_eq!(config.timing.ready_timeout, Duration::from_secs(20));
            assert_eq!(config.retry.busy_policy, BusyPolicy::Strict);
            assert_eq!(config.retry.max_date_attempts, 2);
            assert_eq!(config.webdriver.url, "http://chromedriver:4444");
            Ok(())
        });
    }
}
