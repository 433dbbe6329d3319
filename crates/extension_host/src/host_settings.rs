use crate::worktree_store::HostWorktree;
use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

/// Host configuration, read from an optional TOML file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub worktree: WorktreeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorktreeSettings {
    /// Defaults to the current directory.
    pub root: Option<PathBuf>,
    /// Seed the worktree's shell environment from this process.
    pub inherit_env: bool,
    /// Extra variables. These take precedence over inherited ones.
    pub env: BTreeMap<String, String>,
}

impl Default for WorktreeSettings {
    fn default() -> Self {
        Self {
            root: None,
            inherit_env: true,
            env: BTreeMap::new(),
        }
    }
}

impl HostSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {path:?}"))?;
        Self::parse(&content).with_context(|| format!("invalid settings file {path:?}"))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the worktree these settings describe. `root_override` wins over
    /// the configured root.
    pub fn build_worktree(&self, id: u64, root_override: Option<&Path>) -> Result<HostWorktree> {
        let root = match root_override.or(self.worktree.root.as_deref()) {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().context("failed to determine the current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("worktree root {root:?} does not exist"))?;

        let mut shell_env = Vec::new();
        if self.worktree.inherit_env {
            shell_env.extend(
                std::env::vars_os()
                    .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                    .filter(|(key, _)| !self.worktree.env.contains_key(key)),
            );
        }
        shell_env.extend(
            self.worktree
                .env
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Ok(HostWorktree::new(id, root).with_shell_env(shell_env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::formatdoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings = HostSettings::parse("").unwrap();
        assert_eq!(settings, HostSettings::default());
        assert!(settings.worktree.inherit_env);
    }

    #[test]
    fn test_build_worktree_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HostSettings::parse(&formatdoc! {r#"
            [worktree]
            root = {root:?}
            inherit_env = false

            [worktree.env]
            PATH = "/opt/llvm/bin"
            CC = "clang"
        "#,
            root = dir.path().to_string_lossy(),
        })
        .unwrap();

        let worktree = settings.build_worktree(3, None).unwrap();
        assert_eq!(worktree.id(), 3);
        assert_eq!(worktree.root_path(), dir.path().canonicalize().unwrap());
        assert_eq!(
            worktree.shell_env(),
            &vec![
                ("CC".to_string(), "clang".to_string()),
                ("PATH".to_string(), "/opt/llvm/bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_configured_env_overrides_inherited() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = HostSettings::default();
        settings
            .worktree
            .env
            .insert("PATH".to_string(), "/custom/bin".to_string());

        let worktree = settings.build_worktree(1, Some(dir.path())).unwrap();
        let paths = worktree
            .shell_env()
            .iter()
            .filter(|(key, _)| key == "PATH")
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["/custom/bin"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let settings = HostSettings::default();
        let error = settings
            .build_worktree(1, Some(Path::new("/definitely/not/a/real/dir")))
            .unwrap_err();
        assert!(format!("{error:#}").contains("does not exist"));
    }
}
