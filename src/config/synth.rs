use super::io::{resolve_write_target, write_atomic};
use super::types::DefaultDocument;
use crate::error::{BootstrapError, Result};
use std::path::Path;
use tracing::info;

/// How the config file came to exist before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// A config file was already present (persisted from an earlier run).
    Existing,
    /// Copied from the template file.
    Template,
    /// Written from the built-in default document.
    Default,
}

/// Make sure a config file exists at `config_file`.
///
/// An existing file is never touched. Otherwise the template is copied if
/// present, falling back to [`DefaultDocument`]. A dangling symlink at
/// `config_file` is kept and its target is created.
pub fn ensure_config_file(config_file: &Path, template_file: &Path) -> Result<ConfigOrigin> {
    if std::fs::symlink_metadata(resolve_write_target(config_file)).is_ok() {
        info!("Using existing config at {}", config_file.display());
        return Ok(ConfigOrigin::Existing);
    }

    if template_file.is_file() {
        let template = std::fs::read(template_file)
            .map_err(|e| BootstrapError::io(template_file, e))?;
        write_atomic(config_file, &template)?;
        info!(
            "Initialized config from template {}",
            template_file.display()
        );
        return Ok(ConfigOrigin::Template);
    }

    let mut content = serde_json::to_string_pretty(&DefaultDocument::default())?;
    content.push('\n');
    write_atomic(config_file, content.as_bytes())?;
    info!("No config or template found, wrote default config");
    Ok(ConfigOrigin::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn existing_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("mylobster.json");
        let template = dir.path().join("template.json");
        fs::write(&config, "{\"custom\": true}").unwrap();
        fs::write(&template, "{\"fromTemplate\": true}").unwrap();

        let origin = ensure_config_file(&config, &template).unwrap();
        assert_eq!(origin, ConfigOrigin::Existing);
        assert_eq!(fs::read_to_string(&config).unwrap(), "{\"custom\": true}");
    }

    #[test]
    fn template_is_copied_verbatim() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("cfg").join("mylobster.json");
        let template = dir.path().join("template.json");
        fs::write(&template, "{ fromTemplate: true }").unwrap();

        let origin = ensure_config_file(&config, &template).unwrap();
        assert_eq!(origin, ConfigOrigin::Template);
        assert_eq!(fs::read_to_string(&config).unwrap(), "{ fromTemplate: true }");
    }

    #[test]
    fn default_written_without_template() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("mylobster.json");

        let origin = ensure_config_file(&config, &dir.path().join("missing")).unwrap();
        assert_eq!(origin, ConfigOrigin::Default);

        let written: Value = serde_json::from_str(&fs::read_to_string(&config).unwrap()).unwrap();
        assert_eq!(written["gateway"]["port"], 18789);
        assert_eq!(written["gateway"]["mode"], "local");
        assert_eq!(written["agents"]["defaults"]["workspace"], "/root/mylobster");
    }

    #[test]
    fn dangling_symlink_is_seeded_through() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("bucket").join("mylobster.json");
        let config = dir.path().join("mylobster.json");
        std::os::unix::fs::symlink(&real, &config).unwrap();

        let origin = ensure_config_file(&config, &dir.path().join("missing")).unwrap();

        assert_eq!(origin, ConfigOrigin::Default);
        assert!(fs::symlink_metadata(&config).unwrap().file_type().is_symlink());
        assert!(real.is_file());
        assert_eq!(
            ensure_config_file(&config, &dir.path().join("missing")).unwrap(),
            ConfigOrigin::Existing
        );
    }
}
