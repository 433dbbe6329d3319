//! A native host for Klyx extensions.
//!
//! The host owns the worktrees and the toast sink. It drives an extension
//! through its exported entry points: arguments are duplicated into ABI
//! buffers, the export is called, and every buffer is released afterwards.

mod extension_manifest;
mod host_settings;
mod worktree_store;

#[cfg(test)]
mod extension_host_tests;

use anyhow::{anyhow, bail, ensure, Context as _, Result};
use klyx_extension_api::{
    abi::{
        AbiFree, ExtensionBorrowWorktree, ExtensionCommand, ExtensionListOptionCodeLabel,
        ExtensionOptionString, ExtensionString,
    },
    clear_native_host, exports, native_host_installed, set_native_host,
    system::ToastDuration,
    unregister_extension, EnvVars, NativeHost, API_VERSION,
};
use std::{cell::RefCell, ptr, rc::Rc};

pub use extension_manifest::{
    ExtensionLibraryKind, ExtensionManifest, LanguageServerManifestEntry, LibManifestEntry,
    SchemaVersion,
};
pub use host_settings::{HostSettings, WorktreeSettings};
pub use klyx_extension_api::Command;
pub use worktree_store::{HostWorktree, WorktreeStore};

/// The `exports_extension_init_extension` entry point of an extension.
pub type InitExtension = extern "C" fn();

/// A toast an extension asked the host to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub duration: ToastDuration,
}

#[derive(Default)]
struct HostState {
    worktrees: RefCell<WorktreeStore>,
    toasts: RefCell<Vec<Toast>>,
}

impl HostState {
    fn worktree(&self, handle: ExtensionBorrowWorktree) -> Option<Rc<HostWorktree>> {
        let worktree = self.worktrees.borrow().get(handle);
        if worktree.is_none() {
            log::error!("extension used unknown worktree handle {}", handle.0);
        }
        worktree
    }
}

impl NativeHost for HostState {
    fn worktree_id(&self, worktree: ExtensionBorrowWorktree) -> u64 {
        self.worktree(worktree).map_or(0, |worktree| worktree.id())
    }

    fn worktree_root_path(&self, worktree: ExtensionBorrowWorktree) -> String {
        self.worktree(worktree)
            .map(|worktree| worktree.root_path().to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn worktree_read_text_file(
        &self,
        worktree: ExtensionBorrowWorktree,
        path: &str,
    ) -> Result<String, String> {
        let worktree = self
            .worktree(worktree)
            .ok_or_else(|| format!("unknown worktree {}", worktree.0))?;
        worktree
            .read_text_file(path)
            .map_err(|error| format!("{error:#}"))
    }

    fn worktree_which(
        &self,
        worktree: ExtensionBorrowWorktree,
        binary_name: &str,
    ) -> Option<String> {
        let path = self.worktree(worktree)?.which(binary_name)?;
        Some(path.to_string_lossy().to_string())
    }

    fn worktree_shell_env(&self, worktree: ExtensionBorrowWorktree) -> EnvVars {
        self.worktree(worktree)
            .map(|worktree| worktree.shell_env().clone())
            .unwrap_or_default()
    }

    fn show_toast(&self, message: &str, duration: ToastDuration) {
        log::info!("toast ({duration:?}): {message}");
        self.toasts.borrow_mut().push(Toast {
            message: message.to_string(),
            duration,
        });
    }
}

/// A loaded extension together with the host state it calls into.
///
/// Extensions are driven from the thread that loaded them, one call at a time.
/// Only one host can be loaded on a thread at a time. Dropping the host
/// unregisters the extension.
pub struct ExtensionHost {
    manifest: ExtensionManifest,
    state: Rc<HostState>,
}

impl ExtensionHost {
    /// Installs the host on this thread and initializes the extension.
    pub fn load(manifest: ExtensionManifest, init_extension: InitExtension) -> Result<Self> {
        if native_host_installed() {
            bail!(
                "cannot load extension {}: another extension host is loaded on this thread",
                manifest.id
            );
        }

        if let Some(version) = &manifest.lib.version {
            let requirement = semver::VersionReq::parse(&format!("^{version}"))
                .with_context(|| format!("invalid API version {version}"))?;
            ensure!(
                requirement.matches(&API_VERSION),
                "extension {} requires API version {version}, but the host provides {API_VERSION}",
                manifest.id,
            );
        }

        let state = Rc::new(HostState::default());
        set_native_host(state.clone());

        log::info!("loading extension {} {}", manifest.id, manifest.version);
        init_extension();

        Ok(Self { manifest, state })
    }

    pub fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    pub fn add_worktree(&self, worktree: HostWorktree) -> ExtensionBorrowWorktree {
        self.state.worktrees.borrow_mut().add(worktree)
    }

    pub fn remove_worktree(&self, handle: ExtensionBorrowWorktree) -> Option<Rc<HostWorktree>> {
        self.state.worktrees.borrow_mut().remove(handle)
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.state.toasts.borrow().clone()
    }

    pub fn uninstall(&self) {
        log::info!("uninstalling extension {}", self.manifest.id);
        exports::exports_extension_uninstall();
    }

    pub fn language_server_command(
        &self,
        language_server_id: &str,
        worktree: ExtensionBorrowWorktree,
    ) -> Result<Command> {
        self.check_language_server(language_server_id)?;

        let mut language_server_id = ExtensionString::dup(language_server_id);
        let mut ret = ExtensionCommand::empty();
        let mut err = ExtensionString::empty();
        let success = unsafe {
            exports::exports_extension_language_server_command(
                &mut language_server_id,
                worktree,
                &mut ret,
                &mut err,
            )
        };
        language_server_id.free();

        let command = Command {
            command: ret.command.to_string_lossy(),
            args: ret.args.to_vec(),
            env: ret.env.to_vec(),
        };
        ret.free();
        let error = err.take();

        if success {
            Ok(command)
        } else {
            Err(anyhow!(error)).context("failed to get language server command")
        }
    }

    pub fn language_server_initialization_options(
        &self,
        language_server_id: &str,
        worktree: ExtensionBorrowWorktree,
    ) -> Result<Option<String>> {
        self.call_option(
            "initialization options",
            language_server_id,
            |language_server_id, ret, err| unsafe {
                exports::exports_extension_language_server_initialization_options(
                    language_server_id,
                    worktree,
                    ret,
                    err,
                )
            },
        )
    }

    pub fn language_server_workspace_configuration(
        &self,
        language_server_id: &str,
        worktree: ExtensionBorrowWorktree,
    ) -> Result<Option<String>> {
        self.call_option(
            "workspace configuration",
            language_server_id,
            |language_server_id, ret, err| unsafe {
                exports::exports_extension_language_server_workspace_configuration(
                    language_server_id,
                    worktree,
                    ret,
                    err,
                )
            },
        )
    }

    pub fn language_server_additional_initialization_options(
        &self,
        language_server_id: &str,
        target_language_server_id: &str,
        worktree: ExtensionBorrowWorktree,
    ) -> Result<Option<String>> {
        let mut target_language_server_id = ExtensionString::dup(target_language_server_id);
        let result = self.call_option(
            "additional initialization options",
            language_server_id,
            |language_server_id, ret, err| unsafe {
                exports::exports_extension_language_server_additional_initialization_options(
                    language_server_id,
                    &mut target_language_server_id,
                    worktree,
                    ret,
                    err,
                )
            },
        );
        target_language_server_id.free();
        result
    }

    pub fn language_server_additional_workspace_configuration(
        &self,
        language_server_id: &str,
        target_language_server_id: &str,
        worktree: ExtensionBorrowWorktree,
    ) -> Result<Option<String>> {
        let mut target_language_server_id = ExtensionString::dup(target_language_server_id);
        let result = self.call_option(
            "additional workspace configuration",
            language_server_id,
            |language_server_id, ret, err| unsafe {
                exports::exports_extension_language_server_additional_workspace_configuration(
                    language_server_id,
                    &mut target_language_server_id,
                    worktree,
                    ret,
                    err,
                )
            },
        );
        target_language_server_id.free();
        result
    }

    /// Always fails; extensions cannot label completions.
    pub fn labels_for_completions(&self, language_server_id: &str) -> Result<()> {
        self.call_labels(language_server_id, |language_server_id, ret, err| unsafe {
            exports::exports_extension_labels_for_completions(
                language_server_id,
                ptr::null_mut(),
                ret,
                err,
            )
        })
    }

    /// Always fails; extensions cannot label symbols.
    pub fn labels_for_symbols(&self, language_server_id: &str) -> Result<()> {
        self.call_labels(language_server_id, |language_server_id, ret, err| unsafe {
            exports::exports_extension_labels_for_symbols(
                language_server_id,
                ptr::null_mut(),
                ret,
                err,
            )
        })
    }

    fn check_language_server(&self, language_server_id: &str) -> Result<()> {
        ensure!(
            self.manifest.provides_language_server(language_server_id),
            "extension {} does not provide language server {language_server_id}",
            self.manifest.id,
        );
        Ok(())
    }

    fn call_option(
        &self,
        description: &str,
        language_server_id: &str,
        call: impl FnOnce(
            *mut ExtensionString,
            *mut ExtensionOptionString,
            *mut ExtensionString,
        ) -> bool,
    ) -> Result<Option<String>> {
        self.check_language_server(language_server_id)?;

        let mut language_server_id = ExtensionString::dup(language_server_id);
        let mut ret = ExtensionOptionString::none();
        let mut err = ExtensionString::empty();
        let success = call(&mut language_server_id, &mut ret, &mut err);
        language_server_id.free();

        let value = ret.take();
        let error = err.take();
        if success {
            Ok(value)
        } else {
            Err(anyhow!(error)).with_context(|| format!("failed to get {description}"))
        }
    }

    fn call_labels(
        &self,
        language_server_id: &str,
        call: impl FnOnce(
            *mut ExtensionString,
            *mut ExtensionListOptionCodeLabel,
            *mut ExtensionString,
        ) -> bool,
    ) -> Result<()> {
        let mut language_server_id = ExtensionString::dup(language_server_id);
        let mut ret = ExtensionListOptionCodeLabel::empty();
        let mut err = ExtensionString::empty();
        let success = call(&mut language_server_id, &mut ret, &mut err);
        language_server_id.free();

        let error = err.take();
        ensure!(success, "failed to get labels: {error}");
        Ok(())
    }
}

impl Drop for ExtensionHost {
    fn drop(&mut self) {
        unregister_extension();
        clear_native_host();
    }
}
