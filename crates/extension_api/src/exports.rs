//! Entry points called by the host.
//!
//! Each one decodes its arguments, dispatches to the registered extension and
//! encodes the outcome into the host's out-pointers. Arguments stay owned by
//! the host. On success `ret` is written and owned by the host. On failure only
//! `err` is written.

use crate::{
    abi::{
        ExtensionBorrowWorktree, ExtensionCommand, ExtensionEnvVars, ExtensionListCompletion,
        ExtensionListOptionCodeLabel, ExtensionListString, ExtensionListSymbol,
        ExtensionOptionString, ExtensionString,
    },
    with_extension, Command, Extension, LanguageServerId, Result, Worktree,
};

const NOT_INITIALIZED: &str = "extension not initialized";

#[no_mangle]
pub extern "C" fn exports_extension_uninstall() {
    with_extension(|extension| extension.uninstall());
}

/// # Safety
///
/// All pointers must be valid; `ret` and `err` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_language_server_command(
    language_server_id: *mut ExtensionString,
    worktree: ExtensionBorrowWorktree,
    ret: *mut ExtensionCommand,
    err: *mut ExtensionString,
) -> bool {
    let language_server_id = read_language_server_id(language_server_id);
    let worktree = Worktree::from_handle(worktree);

    let result = dispatch("language_server_command", &language_server_id, |extension| {
        extension.language_server_command(&language_server_id, &worktree)
    });
    match result {
        Ok(command) => {
            ret.write(encode_command(&command));
            true
        }
        Err(error) => {
            write_err(err, &error);
            false
        }
    }
}

/// # Safety
///
/// All pointers must be valid; `ret` and `err` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_language_server_initialization_options(
    language_server_id: *mut ExtensionString,
    worktree: ExtensionBorrowWorktree,
    ret: *mut ExtensionOptionString,
    err: *mut ExtensionString,
) -> bool {
    let language_server_id = read_language_server_id(language_server_id);
    let worktree = Worktree::from_handle(worktree);

    let result = dispatch(
        "language_server_initialization_options",
        &language_server_id,
        |extension| extension.language_server_initialization_options(&language_server_id, &worktree),
    );
    write_json_option(result, ret, err)
}

/// # Safety
///
/// All pointers must be valid; `ret` and `err` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_language_server_workspace_configuration(
    language_server_id: *mut ExtensionString,
    worktree: ExtensionBorrowWorktree,
    ret: *mut ExtensionOptionString,
    err: *mut ExtensionString,
) -> bool {
    let language_server_id = read_language_server_id(language_server_id);
    let worktree = Worktree::from_handle(worktree);

    let result = dispatch(
        "language_server_workspace_configuration",
        &language_server_id,
        |extension| extension.language_server_workspace_configuration(&language_server_id, &worktree),
    );
    write_json_option(result, ret, err)
}

/// # Safety
///
/// All pointers must be valid; `ret` and `err` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_language_server_additional_initialization_options(
    language_server_id: *mut ExtensionString,
    target_language_server_id: *mut ExtensionString,
    worktree: ExtensionBorrowWorktree,
    ret: *mut ExtensionOptionString,
    err: *mut ExtensionString,
) -> bool {
    let language_server_id = read_language_server_id(language_server_id);
    let target_language_server_id = read_language_server_id(target_language_server_id);
    let worktree = Worktree::from_handle(worktree);

    let result = dispatch(
        "language_server_additional_initialization_options",
        &language_server_id,
        |extension| {
            extension.language_server_additional_initialization_options(
                &language_server_id,
                &target_language_server_id,
                &worktree,
            )
        },
    );
    write_json_option(result, ret, err)
}

/// # Safety
///
/// All pointers must be valid; `ret` and `err` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_language_server_additional_workspace_configuration(
    language_server_id: *mut ExtensionString,
    target_language_server_id: *mut ExtensionString,
    worktree: ExtensionBorrowWorktree,
    ret: *mut ExtensionOptionString,
    err: *mut ExtensionString,
) -> bool {
    let language_server_id = read_language_server_id(language_server_id);
    let target_language_server_id = read_language_server_id(target_language_server_id);
    let worktree = Worktree::from_handle(worktree);

    let result = dispatch(
        "language_server_additional_workspace_configuration",
        &language_server_id,
        |extension| {
            extension.language_server_additional_workspace_configuration(
                &language_server_id,
                &target_language_server_id,
                &worktree,
            )
        },
    );
    write_json_option(result, ret, err)
}

/// Completion labels are not supported; this always fails.
///
/// # Safety
///
/// `err` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_labels_for_completions(
    _language_server_id: *mut ExtensionString,
    _completions: *mut ExtensionListCompletion,
    _ret: *mut ExtensionListOptionCodeLabel,
    err: *mut ExtensionString,
) -> bool {
    write_err(err, "`labels_for_completions` not implemented");
    false
}

/// Symbol labels are not supported; this always fails.
///
/// # Safety
///
/// `err` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn exports_extension_labels_for_symbols(
    _language_server_id: *mut ExtensionString,
    _symbols: *mut ExtensionListSymbol,
    _ret: *mut ExtensionListOptionCodeLabel,
    err: *mut ExtensionString,
) -> bool {
    write_err(err, "`labels_for_symbols` not implemented");
    false
}

fn dispatch<T>(
    capability: &str,
    language_server_id: &LanguageServerId,
    f: impl FnOnce(&mut (dyn Extension + 'static)) -> Result<T>,
) -> Result<T> {
    log::debug!("calling {capability} for language server {language_server_id}");
    let result = with_extension(f).unwrap_or_else(|| Err(NOT_INITIALIZED.to_string()));
    if let Err(error) = &result {
        log::error!("{capability} failed for language server {language_server_id}: {error}");
    }
    result
}

unsafe fn read_language_server_id(id: *const ExtensionString) -> LanguageServerId {
    match id.as_ref() {
        Some(id) => LanguageServerId::new(id.to_string_lossy()),
        None => LanguageServerId::new(String::new()),
    }
}

fn encode_command(command: &Command) -> ExtensionCommand {
    ExtensionCommand {
        command: ExtensionString::dup(&command.command),
        args: ExtensionListString::dup_all(&command.args),
        env: ExtensionEnvVars::dup_pairs(&command.env),
    }
}

unsafe fn write_json_option(
    result: Result<Option<serde_json::Value>>,
    ret: *mut ExtensionOptionString,
    err: *mut ExtensionString,
) -> bool {
    let encoded = result.and_then(|value| {
        value
            .map(|value| {
                serde_json::to_string(&value)
                    .map_err(|error| format!("failed to serialize options: {error}"))
            })
            .transpose()
    });

    match encoded {
        Ok(Some(json)) => {
            ret.write(ExtensionOptionString::some(&json));
            true
        }
        Ok(None) => {
            ret.write(ExtensionOptionString::none());
            true
        }
        Err(error) => {
            write_err(err, &error);
            false
        }
    }
}

unsafe fn write_err(err: *mut ExtensionString, message: &str) {
    if !err.is_null() {
        err.write(ExtensionString::dup(message));
    }
}
