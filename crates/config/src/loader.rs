use std::path::Path;

use tracing::debug;

use crate::{Error, Result, schema::PjmanConfig};

/// Load config from the given path, picking the format by extension.
pub fn load_config(path: &Path) -> Result<PjmanConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    debug!(path = %path.display(), "loading config");
    parse_config(&raw, path)
}

/// Parse config text; `path` only selects the format.
pub fn parse_config(raw: &str, path: &Path) -> Result<PjmanConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match ext {
        "json" => Ok(serde_json::from_str(raw)?),
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        other => Err(Error::unsupported_format(other)),
    }
}

/// Read a config file as an untyped JSON document, for unknown-field checks.
pub fn load_raw(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match ext {
        "json" => Ok(serde_json::from_str(&raw)?),
        "toml" => Ok(toml::from_str(&raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&raw)?),
        other => Err(Error::unsupported_format(other)),
    }
}

/// Serialize `config` in the format implied by `path` and write it there.
///
/// Creates parent directories if needed.
pub fn save_config(config: &PjmanConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let text = match ext {
        "json" => serde_json::to_string_pretty(config)?,
        "toml" => toml::to_string_pretty(config)?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        other => return Err(Error::unsupported_format(other)),
    };
    std::fs::write(path, text)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_format() {
        let json = parse_config(r#"{"options":{"timeout":10}}"#, Path::new("c.json")).unwrap();
        assert_eq!(json.options.timeout, Some(10));

        let toml = parse_config("[options]\ntimeout = 20\n", Path::new("c.toml")).unwrap();
        assert_eq!(toml.options.timeout, Some(20));

        let yaml = parse_config("options:\n  timeout: 30\n", Path::new("c.yml")).unwrap();
        assert_eq!(yaml.options.timeout, Some(30));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = parse_config("", Path::new("c.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/pjman/config.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pjman/config.json"));
    }

    #[test]
    fn save_then_load_preserves_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/config.json");
        let mut config = PjmanConfig::default();
        config.sandbox.insert("fs".into(), true);
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn raw_document_keeps_unknown_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "optoins:\n  timeout: 1\n").unwrap();
        let raw = load_raw(&path).unwrap();
        assert_eq!(raw["optoins"]["timeout"], 1);
    }
}
