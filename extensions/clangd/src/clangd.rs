use klyx::{
    serde_json::{self, json},
    system::{self, ToastDuration},
};
use klyx_extension_api::{self as klyx, LanguageServerId, Result};

const SERVER_BINARY: &str = "clangd";

/// The manifest the extension is published with.
pub const EXTENSION_MANIFEST: &str = include_str!("../extension.toml");

const SERVER_ARGS: &[&str] = &[
    "--background-index",
    "--clang-tidy",
    "--completion-style=detailed",
    "--header-insertion=iwyu",
    "--pch-storage=memory",
    "--function-arg-placeholders",
    "--pretty",
];

pub struct ClangdExtension {
    cached_settings: Option<serde_json::Value>,
}

impl ClangdExtension {
    fn server_command(&self, clangd_path: String) -> klyx::Command {
        klyx::Command {
            command: clangd_path,
            args: SERVER_ARGS.iter().map(|arg| arg.to_string()).collect(),
            env: vec![(
                "CLANGD_FLAGS".to_string(),
                "--background-index".to_string(),
            )],
        }
    }

    fn workspace_settings() -> serde_json::Value {
        json!({
            "clangd": {
                "arguments": [
                    "--background-index",
                    "--clang-tidy",
                    "--completion-style=detailed",
                    "--header-insertion=iwyu",
                    "--pch-storage=memory",
                    "--function-arg-placeholders",
                    "--log=verbose"
                ],
                "fallbackFlags": ["-std=c++17", "-Wall", "-Wextra"]
            }
        })
    }
}

impl klyx::Extension for ClangdExtension {
    fn new() -> Self {
        Self {
            cached_settings: None,
        }
    }

    fn init(&mut self) {
        system::show_toast("CppExtension loaded!", ToastDuration::Short);
    }

    fn uninstall(&mut self) {
        self.cached_settings = None;
    }

    fn language_server_command(
        &mut self,
        _language_server_id: &LanguageServerId,
        worktree: &klyx::Worktree,
    ) -> Result<klyx::Command> {
        let clangd_path = worktree.which(SERVER_BINARY).ok_or_else(|| {
            "clangd not found. Please install clangd using: sudo apt install clangd".to_string()
        })?;
        Ok(self.server_command(clangd_path))
    }

    fn language_server_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        _worktree: &klyx::Worktree,
    ) -> Result<Option<serde_json::Value>> {
        Ok(Some(json!({
            "clangdFileStatus": true,
            "usePlaceholders": true,
            "completeUnimported": true,
            "semanticHighlighting": true,
            "compilationDatabaseChanges": true
        })))
    }

    fn language_server_workspace_configuration(
        &mut self,
        _language_server_id: &LanguageServerId,
        _worktree: &klyx::Worktree,
    ) -> Result<Option<serde_json::Value>> {
        let settings = self
            .cached_settings
            .get_or_insert_with(Self::workspace_settings);
        Ok(Some(settings.clone()))
    }
}

klyx::register_extension!(ClangdExtension);

#[cfg(test)]
mod clangd_tests;
