//! The project-local `.pjman` directory layout and its bootstrap.

use std::path::{Path, PathBuf};

use {tokio::fs, tracing::info};

use crate::{Result, loader::save_config, schema::PjmanConfig};

/// Environment variable that overrides the layout root.
pub const ROOT_ENV: &str = "PJMAN_DIR";

const DEFAULT_PLUGIN: &str = r#"({
  execute: async (command, progress) => {
    console.log("You can write your code here", command.target);
    return true;
  },
  undo: async (command, progress) => {
    console.log("You can write your code here", command.target);
    return true;
  },
});
"#;

/// Every path pjman reads or writes, derived from one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at `<base>/.pjman`.
    pub fn new(base: &Path) -> Self {
        Self::at(base.join(".pjman"))
    }

    /// Layout rooted exactly at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$PJMAN_DIR` when set, otherwise `<cwd>/.pjman`.
    pub fn discover() -> Result<Self> {
        if let Some(root) = std::env::var_os(ROOT_ENV) {
            return Ok(Self::at(root));
        }
        Ok(Self::new(&std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding `.pjman`; relative command targets resolve here.
    pub fn project_dir(&self) -> &Path {
        self.root.parent().unwrap_or(&self.root)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// The config file to read: the first of `config.json`, `config.toml`,
    /// `config.yaml`, `config.yml` that exists, else `config.json`.
    pub fn find_config_file(&self) -> PathBuf {
        ["config.json", "config.toml", "config.yaml", "config.yml"]
            .iter()
            .map(|name| self.root.join(name))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| self.config_file())
    }

    pub fn default_plugin_file(&self) -> PathBuf {
        self.plugins_dir().join("default.js")
    }

    pub fn commands_file(&self) -> PathBuf {
        self.history_dir().join("commands.json")
    }

    /// Create whatever is missing. Existing files are never overwritten.
    ///
    /// Returns the paths that were created, in creation order.
    pub async fn ensure(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();

        for dir in [
            self.root.clone(),
            self.plugins_dir(),
            self.history_dir(),
            self.backup_dir(),
        ] {
            if !fs::try_exists(&dir).await? {
                fs::create_dir_all(&dir).await?;
                info!(path = %dir.display(), "created directory");
                created.push(dir);
            }
        }

        let config = self.config_file();
        if !fs::try_exists(&config).await? {
            save_config(&PjmanConfig::default(), &config)?;
            info!(path = %config.display(), "created file");
            created.push(config);
        }

        let files = [
            (self.default_plugin_file(), DEFAULT_PLUGIN.to_string()),
            (self.commands_file(), "[]".to_string()),
        ];
        for (path, content) in files {
            if !fs::try_exists(&path).await? {
                fs::write(&path, content).await?;
                info!(path = %path.display(), "created file");
                created.push(path);
            }
        }

        Ok(created)
    }
}
