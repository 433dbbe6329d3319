use anyhow::{ensure, Context as _, Result};
use klyx_extension_api::{abi::ExtensionBorrowWorktree, EnvVars};
use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
    rc::Rc,
};

/// A project directory exposed to extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostWorktree {
    id: u64,
    root_path: PathBuf,
    shell_env: EnvVars,
}

impl HostWorktree {
    pub fn new(id: u64, root_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            root_path: root_path.into(),
            shell_env: Vec::new(),
        }
    }

    pub fn with_shell_env(mut self, shell_env: EnvVars) -> Self {
        self.shell_env = shell_env;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn shell_env(&self) -> &EnvVars {
        &self.shell_env
    }

    fn env_var(&self, name: &str) -> Option<&str> {
        self.shell_env
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Reads a file relative to the worktree root.
    pub fn read_text_file(&self, path: &str) -> Result<String> {
        let relative_path = Path::new(path);
        ensure!(
            relative_path
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir)),
            "path {path:?} is not inside the worktree"
        );

        let abs_path = self.root_path.join(relative_path);
        fs::read_to_string(&abs_path).with_context(|| format!("failed to read {abs_path:?}"))
    }

    /// Resolves `binary_name` against the worktree's `PATH`.
    pub fn which(&self, binary_name: &str) -> Option<PathBuf> {
        let search_path = self.env_var("PATH")?;
        match which::which_in(binary_name, Some(search_path), &self.root_path) {
            Ok(path) => Some(path),
            Err(error) => {
                log::debug!("{binary_name} not found in worktree {}: {error}", self.id);
                None
            }
        }
    }
}

/// Hands out borrow handles for the worktrees known to the host.
#[derive(Debug, Default)]
pub struct WorktreeStore {
    worktrees: BTreeMap<ExtensionBorrowWorktree, Rc<HostWorktree>>,
    next_handle: u32,
}

impl WorktreeStore {
    pub fn add(&mut self, worktree: HostWorktree) -> ExtensionBorrowWorktree {
        self.next_handle += 1;
        let handle = ExtensionBorrowWorktree(self.next_handle);
        self.worktrees.insert(handle, Rc::new(worktree));
        handle
    }

    pub fn remove(&mut self, handle: ExtensionBorrowWorktree) -> Option<Rc<HostWorktree>> {
        self.worktrees.remove(&handle)
    }

    pub fn get(&self, handle: ExtensionBorrowWorktree) -> Option<Rc<HostWorktree>> {
        self.worktrees.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.worktrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worktrees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_text_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.cpp"), "int main() {}\n").unwrap();
        let worktree = HostWorktree::new(1, dir.path());

        assert_eq!(
            worktree.read_text_file("src/main.cpp").unwrap(),
            "int main() {}\n"
        );
        assert_eq!(
            worktree.read_text_file("./src/main.cpp").unwrap(),
            "int main() {}\n"
        );
        assert!(worktree.read_text_file("missing.txt").is_err());
        assert!(worktree.read_text_file("../outside.txt").is_err());
        assert!(worktree.read_text_file("/etc/hostname").is_err());
    }

    #[test]
    fn test_later_env_entries_win() {
        let worktree = HostWorktree::new(1, "/tmp").with_shell_env(vec![
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("PATH".to_string(), "/opt/bin".to_string()),
        ]);
        assert_eq!(worktree.env_var("PATH"), Some("/opt/bin"));
        assert_eq!(worktree.env_var("HOME"), None);
    }

    #[test]
    fn test_which_without_path() {
        let worktree = HostWorktree::new(1, "/tmp");
        assert_eq!(worktree.which("sh"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_which_uses_worktree_path() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        fs::create_dir(&bin_dir).unwrap();
        let server_path = bin_dir.join("fake-server");
        fs::write(&server_path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&server_path, fs::Permissions::from_mode(0o755)).unwrap();

        let worktree = HostWorktree::new(1, dir.path()).with_shell_env(vec![(
            "PATH".to_string(),
            bin_dir.to_string_lossy().to_string(),
        )]);
        assert_eq!(worktree.which("fake-server"), Some(server_path));
        assert_eq!(worktree.which("missing-server"), None);
    }

    #[test]
    fn test_store_handles() {
        let mut store = WorktreeStore::default();
        let first = store.add(HostWorktree::new(10, "/a"));
        let second = store.add(HostWorktree::new(20, "/b"));
        assert_ne!(first, second);
        assert_eq!(store.get(second).unwrap().id(), 20);

        store.remove(first);
        assert!(store.get(first).is_none());
        assert_eq!(store.len(), 1);
    }
}
