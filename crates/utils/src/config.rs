use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Prefix of the environment variables which override file based configuration.
///
/// Nested keys are separated by a double underscore, e.g.
/// `ROLLUP_SYNC_BLOCK_SOURCE__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "ROLLUP_SYNC_";

/// Loads the user configuration.
///
/// Values are read from the TOML file at the provided path and then overridden by any
/// environment variables carrying the [`ENV_PREFIX`]. A missing file is treated as empty, so
/// configuration types are expected to provide defaults for every field.
pub fn load_config<T: for<'a> Deserialize<'a>>(
    config_file: impl AsRef<Path>,
) -> figment::Result<T> {
    Figment::from(Toml::file(config_file.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use serde::Deserialize;

    use super::load_config;

    #[derive(Debug, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    struct Example {
        name: String,
        retries: u32,
    }

    impl Default for Example {
        fn default() -> Self {
            Self { name: "default".to_string(), retries: 3 }
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config: Example = load_config("does-not-exist.toml")?;
            assert_eq!(config, Example::default());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("example.toml", "name = \"from-file\"\nretries = 1")?;
            jail.set_env("ROLLUP_SYNC_RETRIES", "7");

            let config: Example = load_config("example.toml")?;
            assert_eq!(config, Example { name: "from-file".to_string(), retries: 7 });
            Ok(())
        });
    }
}
