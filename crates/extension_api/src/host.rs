//! Functions provided by the extension host.
//!
//! String and list arguments are borrowed for the duration of the call.
//! Buffers written through `ret` and `err` are owned by the extension.

#[cfg(not(target_arch = "wasm32"))]
pub(crate) use crate::native::imports::*;

#[cfg(target_arch = "wasm32")]
pub(crate) use imports::*;

#[cfg(target_arch = "wasm32")]
mod imports {
    use crate::abi::{
        ExtensionBorrowWorktree, ExtensionEnvVars, ExtensionString, ExtensionToastDuration,
    };

    #[link(wasm_import_module = "klyx:extension")]
    extern "C" {
        pub(crate) fn extension_method_worktree_root_path(
            worktree: ExtensionBorrowWorktree,
            ret: *mut ExtensionString,
        );

        pub(crate) fn extension_method_worktree_id(worktree: ExtensionBorrowWorktree) -> u64;

        pub(crate) fn extension_method_worktree_read_text_file(
            worktree: ExtensionBorrowWorktree,
            path: *mut ExtensionString,
            ret: *mut ExtensionString,
            err: *mut ExtensionString,
        ) -> bool;

        pub(crate) fn extension_method_worktree_which(
            worktree: ExtensionBorrowWorktree,
            binary_name: *mut ExtensionString,
            ret: *mut ExtensionString,
        ) -> bool;

        pub(crate) fn extension_method_worktree_shell_env(
            worktree: ExtensionBorrowWorktree,
            ret: *mut ExtensionEnvVars,
        );

        pub(crate) fn klyx_extension_system_show_toast(
            message: *mut ExtensionString,
            duration: ExtensionToastDuration,
        );
    }
}
