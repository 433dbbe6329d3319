//! Native stand-ins for the host imports.
//!
//! Outside of wasm there is no extension runtime to link against, so the
//! imports forward to a [`NativeHost`] installed on the calling thread. Results
//! are duplicated into the out-pointers exactly as a real host would write
//! them, which keeps the ownership discipline identical on every target.

use crate::{abi::ExtensionBorrowWorktree, system::ToastDuration, EnvVars};
use std::{cell::RefCell, rc::Rc};

/// The capabilities a host exposes to an extension.
pub trait NativeHost {
    fn worktree_id(&self, worktree: ExtensionBorrowWorktree) -> u64;

    fn worktree_root_path(&self, worktree: ExtensionBorrowWorktree) -> String;

    fn worktree_read_text_file(
        &self,
        worktree: ExtensionBorrowWorktree,
        path: &str,
    ) -> Result<String, String>;

    fn worktree_which(&self, worktree: ExtensionBorrowWorktree, binary_name: &str)
        -> Option<String>;

    fn worktree_shell_env(&self, worktree: ExtensionBorrowWorktree) -> EnvVars;

    fn show_toast(&self, message: &str, duration: ToastDuration);
}

thread_local! {
    static NATIVE_HOST: RefCell<Option<Rc<dyn NativeHost>>> = const { RefCell::new(None) };
}

/// Installs `host` for the current thread, returning the previous one.
pub fn set_native_host(host: Rc<dyn NativeHost>) -> Option<Rc<dyn NativeHost>> {
    NATIVE_HOST.with(|slot| slot.borrow_mut().replace(host))
}

pub fn native_host_installed() -> bool {
    NATIVE_HOST.with(|slot| slot.borrow().is_some())
}

pub fn clear_native_host() -> Option<Rc<dyn NativeHost>> {
    NATIVE_HOST.with(|slot| slot.borrow_mut().take())
}

fn native_host() -> Rc<dyn NativeHost> {
    NATIVE_HOST
        .with(|slot| slot.borrow().clone())
        .expect("no native extension host is installed on this thread")
}

pub(crate) mod imports {
    use super::native_host;
    use crate::{
        abi::{
            ExtensionBorrowWorktree, ExtensionEnvVars, ExtensionString, ExtensionToastDuration,
        },
        system::ToastDuration,
    };

    pub(crate) unsafe fn extension_method_worktree_root_path(
        worktree: ExtensionBorrowWorktree,
        ret: *mut ExtensionString,
    ) {
        let root_path = native_host().worktree_root_path(worktree);
        ret.write(ExtensionString::dup(&root_path));
    }

    pub(crate) unsafe fn extension_method_worktree_id(worktree: ExtensionBorrowWorktree) -> u64 {
        native_host().worktree_id(worktree)
    }

    pub(crate) unsafe fn extension_method_worktree_read_text_file(
        worktree: ExtensionBorrowWorktree,
        path: *mut ExtensionString,
        ret: *mut ExtensionString,
        err: *mut ExtensionString,
    ) -> bool {
        let path = (*path).to_string_lossy();
        match native_host().worktree_read_text_file(worktree, &path) {
            Ok(contents) => {
                ret.write(ExtensionString::dup(&contents));
                true
            }
            Err(error) => {
                err.write(ExtensionString::dup(&error));
                false
            }
        }
    }

    pub(crate) unsafe fn extension_method_worktree_which(
        worktree: ExtensionBorrowWorktree,
        binary_name: *mut ExtensionString,
        ret: *mut ExtensionString,
    ) -> bool {
        let binary_name = (*binary_name).to_string_lossy();
        match native_host().worktree_which(worktree, &binary_name) {
            Some(path) => {
                ret.write(ExtensionString::dup(&path));
                true
            }
            None => false,
        }
    }

    pub(crate) unsafe fn extension_method_worktree_shell_env(
        worktree: ExtensionBorrowWorktree,
        ret: *mut ExtensionEnvVars,
    ) {
        let env = native_host().worktree_shell_env(worktree);
        ret.write(ExtensionEnvVars::dup_pairs(&env));
    }

    pub(crate) unsafe fn klyx_extension_system_show_toast(
        message: *mut ExtensionString,
        duration: ExtensionToastDuration,
    ) {
        let message = (*message).to_string_lossy();
        let duration = ToastDuration::from_raw(duration).unwrap_or_else(|| {
            log::warn!("unknown toast duration {duration}, showing a short toast");
            ToastDuration::Short
        });
        native_host().show_toast(&message, duration);
    }
}
