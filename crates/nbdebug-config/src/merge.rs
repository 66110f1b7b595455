use crate::config::Config;
use crate::error::ConfigError;

/// Layer a TOML fragment over `base`.
///
/// Keys present in `overlay_toml` win; tables are merged key by key so an
/// overlay that sets one field of a section keeps the section's other
/// fields from `base`.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let overlay: toml::Table = overlay_toml.parse().map_err(parse_error)?;
    let toml::Value::Table(mut merged) = toml::Value::try_from(base).map_err(parse_error)? else {
        return Err(ConfigError::Parse("config did not serialize to a table".into()));
    };
    merge_tables(&mut merged, overlay);
    toml::Value::Table(merged).try_into().map_err(parse_error)
}

fn parse_error(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse(e.to_string())
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
