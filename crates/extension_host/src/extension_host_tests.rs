use crate::{ExtensionHost, ExtensionManifest, HostWorktree, Toast};
use indoc::indoc;
use klyx_extension_api::{
    self as klyx,
    abi::live_string_count,
    serde_json::{self, json},
    system::{self, ToastDuration},
    Command, LanguageServerId, Worktree,
};
use pretty_assertions::assert_eq;
use std::fs;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct ProjectExtension;

impl klyx::Extension for ProjectExtension {
    fn new() -> Self {
        Self
    }

    fn init(&mut self) {
        system::show_toast("project extension loaded", ToastDuration::Long);
    }

    fn language_server_command(
        &mut self,
        language_server_id: &LanguageServerId,
        worktree: &Worktree,
    ) -> klyx::Result<Command> {
        let path = worktree
            .which("project-server")
            .ok_or_else(|| format!("{language_server_id}: project-server not found"))?;
        Ok(Command {
            command: path,
            args: vec!["--root".to_string(), worktree.root_path()],
            env: vec![("WORKTREE_ID".to_string(), worktree.id().to_string())],
        })
    }

    fn language_server_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        worktree: &Worktree,
    ) -> klyx::Result<Option<serde_json::Value>> {
        let contents = worktree.read_text_file("project.json")?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|error| error.to_string())
    }

    fn language_server_additional_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        target_language_server_id: &LanguageServerId,
        _worktree: &Worktree,
    ) -> klyx::Result<Option<serde_json::Value>> {
        Ok(Some(json!({ "target": target_language_server_id.as_ref() })))
    }
}

extern "C" fn init_project_extension() {
    klyx::init_extension(|| Box::new(<ProjectExtension as klyx::Extension>::new()));
}

fn manifest() -> ExtensionManifest {
    ExtensionManifest::parse(indoc! {r#"
        id = "project"
        name = "Project"
        version = "0.0.1"

        [lib]
        kind = "Rust"
        version = "0.1.0"

        [language_servers.project-ls]
        languages = ["Project"]
    "#})
    .unwrap()
}

#[test]
fn test_load_initializes_extension() {
    init_logger();
    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    assert_eq!(
        host.toasts(),
        vec![Toast {
            message: "project extension loaded".to_string(),
            duration: ToastDuration::Long,
        }]
    );
    assert_eq!(host.manifest().id.as_ref(), "project");
}

#[test]
fn test_incompatible_api_version_is_rejected() {
    init_logger();
    let mut manifest = manifest();
    manifest.lib.version = Some(semver::Version::new(2, 0, 0));

    let error = ExtensionHost::load(manifest, init_project_extension)
        .err()
        .unwrap();
    assert!(error.to_string().contains("requires API version 2.0.0"));
}

#[cfg(unix)]
#[test]
fn test_language_server_command_end_to_end() {
    use std::os::unix::fs::PermissionsExt as _;

    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let bin_dir = dir.path().join("bin");
    fs::create_dir(&bin_dir).unwrap();
    let server_path = bin_dir.join("project-server");
    fs::write(&server_path, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&server_path, fs::Permissions::from_mode(0o755)).unwrap();

    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = host.add_worktree(HostWorktree::new(42, dir.path()).with_shell_env(vec![(
        "PATH".to_string(),
        bin_dir.to_string_lossy().to_string(),
    )]));
    let baseline = live_string_count();

    let command = host.language_server_command("project-ls", worktree).unwrap();
    assert_eq!(
        command,
        Command {
            command: server_path.to_string_lossy().to_string(),
            args: vec![
                "--root".to_string(),
                dir.path().to_string_lossy().to_string()
            ],
            env: vec![("WORKTREE_ID".to_string(), "42".to_string())],
        }
    );
    assert_eq!(live_string_count(), baseline);
}

#[test]
fn test_language_server_command_error() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = host.add_worktree(HostWorktree::new(1, dir.path()));
    let baseline = live_string_count();

    let error = host
        .language_server_command("project-ls", worktree)
        .unwrap_err();
    assert_eq!(
        format!("{error:#}"),
        "failed to get language server command: project-ls: project-server not found"
    );
    assert_eq!(live_string_count(), baseline);
}

#[test]
fn test_unknown_language_server_is_rejected() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = host.add_worktree(HostWorktree::new(1, dir.path()));

    let error = host
        .language_server_workspace_configuration("rust-analyzer", worktree)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "extension project does not provide language server rust-analyzer"
    );
}

#[test]
fn test_initialization_options_read_worktree_files() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("project.json"), r#"{ "strict": true }"#).unwrap();

    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = host.add_worktree(HostWorktree::new(1, dir.path()));
    let baseline = live_string_count();

    assert_eq!(
        host.language_server_initialization_options("project-ls", worktree)
            .unwrap(),
        Some(r#"{"strict":true}"#.to_string())
    );
    assert_eq!(
        host.language_server_workspace_configuration("project-ls", worktree)
            .unwrap(),
        None
    );
    assert_eq!(
        host.language_server_additional_initialization_options("project-ls", "other-ls", worktree)
            .unwrap(),
        Some(r#"{"target":"other-ls"}"#.to_string())
    );
    assert_eq!(
        host.language_server_additional_workspace_configuration("project-ls", "other-ls", worktree)
            .unwrap(),
        None
    );
    assert_eq!(live_string_count(), baseline);

    fs::remove_file(dir.path().join("project.json")).unwrap();
    let error = host
        .language_server_initialization_options("project-ls", worktree)
        .unwrap_err();
    assert!(format!("{error:#}").starts_with("failed to get initialization options: failed to read"));
    assert_eq!(live_string_count(), baseline);
}

#[test]
fn test_labels_always_fail() {
    init_logger();
    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let baseline = live_string_count();

    let error = host.labels_for_completions("project-ls").unwrap_err();
    assert_eq!(
        error.to_string(),
        "failed to get labels: `labels_for_completions` not implemented"
    );
    let error = host.labels_for_symbols("project-ls").unwrap_err();
    assert_eq!(
        error.to_string(),
        "failed to get labels: `labels_for_symbols` not implemented"
    );
    assert_eq!(live_string_count(), baseline);
}

#[test]
fn test_dropping_host_unregisters_extension() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let host = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    drop(host);

    // Reinstall a host without initializing anything.
    extern "C" fn no_op() {}
    let host = ExtensionHost::load(manifest(), no_op).unwrap();
    let worktree = host.add_worktree(HostWorktree::new(1, dir.path()));
    let error = host
        .language_server_command("project-ls", worktree)
        .unwrap_err();
    assert_eq!(
        format!("{error:#}"),
        "failed to get language server command: extension not initialized"
    );
    assert!(host.toasts().is_empty());
}

#[test]
fn test_second_load_on_same_thread_is_rejected() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let first = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = first.add_worktree(HostWorktree::new(1, dir.path()));

    let error = ExtensionHost::load(manifest(), init_project_extension)
        .err()
        .unwrap();
    assert_eq!(
        error.to_string(),
        "cannot load extension project: another extension host is loaded on this thread"
    );

    // The rejected load must leave the first host untouched.
    assert_eq!(
        first
            .language_server_additional_initialization_options("project-ls", "other-ls", worktree)
            .unwrap(),
        Some(r#"{"target":"other-ls"}"#.to_string())
    );
    assert_eq!(first.toasts().len(), 1);

    drop(first);
    let second = ExtensionHost::load(manifest(), init_project_extension).unwrap();
    let worktree = second.add_worktree(HostWorktree::new(2, dir.path()));
    assert_eq!(
        second
            .language_server_additional_initialization_options("project-ls", "other-ls", worktree)
            .unwrap(),
        Some(r#"{"target":"other-ls"}"#.to_string())
    );
}
