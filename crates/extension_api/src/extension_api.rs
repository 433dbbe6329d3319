//! The Klyx extension API.
//!
//! Implement [`Extension`] and export it with [`register_extension!`]. The
//! host then drives the extension through the `exports_extension_*` entry
//! points in [`exports`].

pub mod abi;
pub mod exports;
mod host;
#[cfg(not(target_arch = "wasm32"))]
mod native;
pub mod system;
mod worktree;

#[cfg(test)]
mod extension_api_tests;

use std::{cell::RefCell, fmt};

#[cfg(not(target_arch = "wasm32"))]
pub use native::{clear_native_host, native_host_installed, set_native_host, NativeHost};
pub use serde_json;
pub use worktree::Worktree;

pub type Result<T, E = String> = core::result::Result<T, E>;

/// Environment variables, in the order the host reported them.
pub type EnvVars = Vec<(String, String)>;

/// The version of this API, as embedded in compiled extensions.
pub const API_VERSION: semver::Version = semver::Version {
    major: parse_version_part(env!("CARGO_PKG_VERSION_MAJOR")),
    minor: parse_version_part(env!("CARGO_PKG_VERSION_MINOR")),
    patch: parse_version_part(env!("CARGO_PKG_VERSION_PATCH")),
    pre: semver::Prerelease::EMPTY,
    build: semver::BuildMetadata::EMPTY,
};

const fn parse_version_part(part: &str) -> u64 {
    let bytes = part.as_bytes();
    let mut value = 0;
    let mut ix = 0;
    while ix < bytes.len() {
        value = value * 10 + (bytes[ix] - b'0') as u64;
        ix += 1;
    }
    value
}

#[cfg(target_arch = "wasm32")]
#[link_section = "klyx:api-version"]
#[doc(hidden)]
pub static KLYX_API_VERSION: [u8; 6] =
    *include_bytes!(concat!(env!("OUT_DIR"), "/version_bytes"));

/// The id of a language server, as declared in the extension manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageServerId(String);

impl LanguageServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for LanguageServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A command used to start a language server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub command: String,
    pub args: Vec<String>,
    pub env: EnvVars,
}

/// A Klyx extension.
pub trait Extension: Send + Sync {
    /// Returns a new instance of the extension.
    fn new() -> Self
    where
        Self: Sized;

    /// Called once, right after the extension is registered.
    fn init(&mut self) {}

    /// Called when the host unloads the extension.
    fn uninstall(&mut self) {}

    /// Returns the command used to start the language server.
    fn language_server_command(
        &mut self,
        _language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> Result<Command> {
        Err("`language_server_command` not implemented".to_string())
    }

    /// Returns the initialization options to pass to the language server.
    fn language_server_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Returns the workspace configuration options to pass to the language server.
    fn language_server_workspace_configuration(
        &mut self,
        _language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Returns the initialization options to pass to another language server.
    fn language_server_additional_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        _target_language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Returns the workspace configuration options to pass to another language server.
    fn language_server_additional_workspace_configuration(
        &mut self,
        _language_server_id: &LanguageServerId,
        _target_language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}

/// Registers the provided type as a Klyx extension.
///
/// The extension will be constructed and initialized when the host calls
/// `exports_extension_init_extension`.
#[macro_export]
macro_rules! register_extension {
    ($extension_type:ty) => {
        #[no_mangle]
        pub extern "C" fn exports_extension_init_extension() {
            $crate::init_extension(|| {
                Box::new(<$extension_type as $crate::Extension>::new())
            });
        }
    };
}

// The host calls in one export at a time, always from the thread that loaded
// the extension.
thread_local! {
    static EXTENSION: RefCell<Option<Box<dyn Extension>>> = const { RefCell::new(None) };
}

#[doc(hidden)]
pub fn register_extension(build_extension: fn() -> Box<dyn Extension>) {
    let extension = build_extension();
    EXTENSION.with(|slot| *slot.borrow_mut() = Some(extension));
}

#[doc(hidden)]
pub fn init_extension(build_extension: fn() -> Box<dyn Extension>) {
    register_extension(build_extension);
    with_extension(|extension| extension.init());
}

/// Drops the registered extension, if any.
#[doc(hidden)]
pub fn unregister_extension() {
    let extension = EXTENSION.with(|slot| slot.borrow_mut().take());
    drop(extension);
}

pub(crate) fn with_extension<R>(
    f: impl FnOnce(&mut (dyn Extension + 'static)) -> R,
) -> Option<R> {
    EXTENSION.with(|slot| slot.borrow_mut().as_deref_mut().map(f))
}
