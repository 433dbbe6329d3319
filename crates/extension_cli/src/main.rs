use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use klyx_extension_host::{Command, ExtensionHost, ExtensionManifest, HostSettings};
use std::{path::PathBuf, process};

#[derive(Parser, Debug)]
#[command(
    name = "klyx-extension",
    about = "Runs the bundled clangd extension against a directory and prints what it returns."
)]
struct Args {
    /// A TOML file configuring the worktree.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// The worktree root. Overrides the root from the settings file.
    #[arg(long)]
    worktree: Option<PathBuf>,
    #[command(subcommand)]
    command: Capability,
}

#[derive(Subcommand, Debug)]
enum Capability {
    /// Print the command used to start the language server, as JSON.
    Command { server: String },
    /// Print the language server's initialization options.
    InitOptions { server: String },
    /// Print the language server's workspace configuration.
    WorkspaceConfig { server: String },
    /// Print the initialization options for another language server.
    AdditionalInitOptions { server: String, target: String },
    /// Print the workspace configuration for another language server.
    AdditionalWorkspaceConfig { server: String, target: String },
}

fn main() {
    env_logger::init();

    if let Err(error) = run(Args::parse()) {
        eprintln!("error: {error:?}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => HostSettings::load(path)?,
        None => HostSettings::default(),
    };

    let manifest = ExtensionManifest::parse(klyx_clangd::EXTENSION_MANIFEST)
        .context("invalid bundled extension manifest")?;
    let host = ExtensionHost::load(manifest, klyx_clangd::exports_extension_init_extension)?;
    let worktree = host.add_worktree(settings.build_worktree(1, args.worktree.as_deref())?);
    log::debug!("running {:?}", args.command);

    let output = match &args.command {
        Capability::Command { server } => {
            Some(format_command(&host.language_server_command(server, worktree)?)?)
        }
        Capability::InitOptions { server } => {
            host.language_server_initialization_options(server, worktree)?
        }
        Capability::WorkspaceConfig { server } => {
            host.language_server_workspace_configuration(server, worktree)?
        }
        Capability::AdditionalInitOptions { server, target } => {
            host.language_server_additional_initialization_options(server, target, worktree)?
        }
        Capability::AdditionalWorkspaceConfig { server, target } => {
            host.language_server_additional_workspace_configuration(server, target, worktree)?
        }
    };

    println!("{}", format_output(output.as_deref()));
    Ok(())
}

/// Formats a command as pretty-printed JSON.
///
/// `env` becomes an object, so when a variable is set more than once the last
/// value wins, as it would in the spawned process.
fn format_command(command: &Command) -> Result<String> {
    let env = command
        .env
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
        .collect::<serde_json::Map<_, _>>();
    let command = serde_json::json!({
        "command": command.command,
        "args": command.args,
        "env": env,
    });
    Ok(serde_json::to_string_pretty(&command)?)
}

/// Options are already JSON, so they are printed as-is.
fn format_output(output: Option<&str>) -> &str {
    output.unwrap_or("null")
}
