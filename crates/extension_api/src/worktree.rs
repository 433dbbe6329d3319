use crate::{
    abi::{AbiFree, ExtensionBorrowWorktree, ExtensionEnvVars, ExtensionString},
    host, EnvVars, Result,
};

/// A project directory owned by the host.
///
/// This is only a borrowed handle: every accessor is a fresh synchronous call
/// into the host and nothing is cached on the extension side.
#[derive(Debug)]
pub struct Worktree {
    handle: ExtensionBorrowWorktree,
}

impl Worktree {
    #[doc(hidden)]
    pub fn from_handle(handle: ExtensionBorrowWorktree) -> Self {
        Self { handle }
    }

    pub fn id(&self) -> u64 {
        unsafe { host::extension_method_worktree_id(self.handle) }
    }

    pub fn root_path(&self) -> String {
        let mut root_path = ExtensionString::empty();
        unsafe { host::extension_method_worktree_root_path(self.handle, &mut root_path) };
        root_path.take()
    }

    /// Reads a file relative to the worktree root.
    pub fn read_text_file(&self, path: &str) -> Result<String> {
        let mut path = ExtensionString::dup(path);
        let mut contents = ExtensionString::empty();
        let mut error = ExtensionString::empty();

        let success = unsafe {
            host::extension_method_worktree_read_text_file(
                self.handle,
                &mut path,
                &mut contents,
                &mut error,
            )
        };
        path.free();

        // Both start out empty, so releasing the one the host left alone is a no-op.
        let contents = contents.take();
        let error = error.take();
        if success {
            Ok(contents)
        } else {
            Err(error)
        }
    }

    /// Returns the path to `binary_name` if it is on the worktree's `PATH`.
    pub fn which(&self, binary_name: &str) -> Option<String> {
        let mut binary_name = ExtensionString::dup(binary_name);
        let mut path = ExtensionString::empty();

        let found =
            unsafe { host::extension_method_worktree_which(self.handle, &mut binary_name, &mut path) };
        binary_name.free();

        let path = path.take();
        found.then_some(path)
    }

    /// The environment of a login shell started in the worktree root.
    pub fn shell_env(&self) -> EnvVars {
        let mut env = ExtensionEnvVars::empty();
        unsafe { host::extension_method_worktree_shell_env(self.handle, &mut env) };
        let vars = env.to_vec();
        env.free();
        vars
    }
}
