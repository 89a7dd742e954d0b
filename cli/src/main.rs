//! CLI entrypoint for council
//!
//! Wires the layers together with dependency injection: fail-fast
//! configuration (audit log, limits), flow resolution with implicit-source
//! confirmation, prerequisite checks, and Ctrl-C propagation into the
//! executor's cancellation flag.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use council_application::ports::audit::{events, AuditLevel, AuditLogger};
use council_application::{
    AutoContinueCheckpoint, CheckpointPort, CliExecutor, FlowObserver, RunFlowInput,
    RunFlowUseCase,
};
use council_domain::FlowStep;
use council_infrastructure::config::loader::{
    load_flow_steps, FlowLocator, FlowSource, LoadOptions, ResolvedFlowConfig, FLOW_CONFIG_ENV_VAR,
};
use council_infrastructure::{
    audit::{AuditLog, AuditSettings},
    executor::ProcessExecutor,
    paths, prerequisites, signature, Limits,
};
use council_presentation::{Cli, Commands, ConsolePresenter, FlowCommands, InteractiveCheckpoint};
use serde_json::json;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = dispatch(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            prompt,
            flow_config,
        } => run_flow_command(prompt, flow_config, false).await,
        Commands::Tui {
            prompt,
            flow_config,
        } => {
            let prompt = match prompt {
                Some(prompt) => prompt,
                None => read_prompt_line()?,
            };
            run_flow_command(prompt, flow_config, true).await
        }
        Commands::Doctor { flow_config } => doctor_command(flow_config),
        Commands::Flow(flow) => flow_command(flow),
    }
}

/// Open the audit log. Invalid settings abort startup before any step runs.
fn open_audit() -> Result<Arc<AuditLog>> {
    let settings = AuditSettings::from_env().context("invalid audit log configuration")?;
    let home = paths::ensure_council_home().context("could not create the council home")?;
    let log = AuditLog::open(paths::audit_log_path(&home), settings)?;
    Ok(Arc::new(log))
}

fn resolve_and_load(
    flow_config: Option<&str>,
    audit: &dyn AuditLogger,
    confirm_implicit: bool,
) -> Result<(ResolvedFlowConfig, Vec<FlowStep>)> {
    let resolved = FlowLocator::from_env().resolve(flow_config)?;

    if confirm_implicit && resolved.source.is_implicit() {
        confirm_implicit_flow(&resolved, audit)?;
    }

    let require_signature = signature::signature_required_from_env()?;
    let home = paths::council_home();
    let options = LoadOptions {
        require_signature,
        trusted_keys_dir: signature::trusted_keys_dir_from_env(&home),
        binary_lookup: prerequisites::binary_on_path,
        audit,
    };
    let steps = load_flow_steps(&resolved, &options)?;
    Ok((resolved, steps))
}

/// Gate for flows picked up from the env var or the working directory: the
/// file can run commands on this host, so it must be confirmed explicitly.
fn confirm_implicit_flow(resolved: &ResolvedFlowConfig, audit: &dyn AuditLogger) -> Result<()> {
    let source_label = match resolved.source {
        FlowSource::Env => FLOW_CONFIG_ENV_VAR,
        _ => "./flow.json",
    };
    let path_label = resolved
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();

    if !std::io::stdin().is_terminal() {
        audit.emit(
            AuditLevel::Error,
            events::FLOW_LOAD,
            json!({
                "source": resolved.source.as_str(),
                "path": path_label,
                "implicit_blocked": "non-interactive",
            }),
        );
        bail!(
            "refusing to execute a flow picked up implicitly via {source_label} ({path_label}) \
             in non-interactive mode; pass --flow-config to confirm it explicitly"
        );
    }

    eprint!(
        "Flow configuration detected via {source_label} at '{path_label}'. \
         This file can run commands on this host. Continue? [y/N] "
    );
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("could not read confirmation")?;
    if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        audit.emit(
            AuditLevel::Info,
            events::FLOW_LOAD,
            json!({
                "source": resolved.source.as_str(),
                "path": path_label,
                "implicit_blocked": "rejected",
            }),
        );
        bail!("execution cancelled; pass --flow-config to confirm the flow explicitly");
    }
    Ok(())
}

fn ensure_prerequisites(steps: &[FlowStep]) -> Result<()> {
    let statuses = prerequisites::evaluate_flow_prerequisites(steps);

    let missing = prerequisites::find_missing(&statuses);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|status| status.binary.as_str()).collect();
        bail!(
            "required binaries missing from PATH: {}; run 'council doctor' for details",
            names.join(", ")
        );
    }

    for status in prerequisites::find_world_writable(&statuses) {
        let location = status
            .resolved_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| status.binary.clone());
        eprintln!(
            "Security warning: binary resolved inside a world-writable directory: {location}"
        );
    }

    Ok(())
}

async fn run_flow_command(
    prompt: String,
    flow_config: Option<String>,
    interactive: bool,
) -> Result<()> {
    let audit = open_audit()?;
    let audit_dyn: Arc<dyn AuditLogger> = audit.clone();
    let limits = Limits::from_env().context("invalid limits configuration")?;

    let (resolved, steps) = resolve_and_load(flow_config.as_deref(), audit.as_ref(), true)?;
    ensure_prerequisites(&steps)?;
    tracing::info!(
        "Running flow from {} with {} step(s)",
        describe_flow_source(&resolved),
        steps.len()
    );

    let executor = Arc::new(ProcessExecutor::new(Arc::clone(&audit_dyn), limits));
    let observer: Arc<dyn FlowObserver> = Arc::new(ConsolePresenter::new());
    let checkpoint: Arc<dyn CheckpointPort> = if interactive {
        Arc::new(InteractiveCheckpoint)
    } else {
        Arc::new(AutoContinueCheckpoint)
    };

    // Ctrl-C requests cancellation of the in-flight child process; the
    // executor terminates it and the run ends as aborted.
    let cancel_target = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_target.request_cancel();
        }
    });

    let use_case = RunFlowUseCase::new(executor, audit_dyn, observer, checkpoint);
    let input = RunFlowInput {
        user_prompt: prompt,
        steps,
        max_context_chars: limits.max_context_chars,
    };
    use_case
        .run_flow(input)
        .await
        .map_err(|err| anyhow!("{err}"))?;
    Ok(())
}

fn doctor_command(flow_config: Option<String>) -> Result<()> {
    let audit = open_audit()?;
    audit.emit(
        AuditLevel::Info,
        events::DOCTOR_INVOKED,
        json!({ "flow_config_arg": flow_config.clone().unwrap_or_default() }),
    );

    let (resolved, steps) = resolve_and_load(flow_config.as_deref(), audit.as_ref(), false)?;
    println!("Flow source: {}", describe_flow_source(&resolved));

    let statuses = prerequisites::evaluate_flow_prerequisites(&steps);
    if statuses.is_empty() {
        println!("No host binaries required by this flow.");
        return Ok(());
    }

    for status in &statuses {
        println!("{}", render_doctor_line(status));
    }

    let missing = prerequisites::find_missing(&statuses);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|status| status.binary.as_str()).collect();
        bail!("prerequisites missing from PATH: {}", names.join(", "));
    }

    println!("All prerequisites satisfied.");
    Ok(())
}

fn describe_flow_source(resolved: &ResolvedFlowConfig) -> String {
    let path = resolved
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    match resolved.source {
        FlowSource::Cli => format!("--flow-config ({path})"),
        FlowSource::Env => format!("{FLOW_CONFIG_ENV_VAR} ({path})"),
        FlowSource::Cwd => format!("./flow.json ({path})"),
        FlowSource::User => format!("user configuration ({path})"),
        FlowSource::Default => "built-in default".to_string(),
    }
}

fn render_doctor_line(status: &prerequisites::BinaryStatus) -> String {
    if !status.is_available {
        return format!("[MISSING] {}: not found on PATH", status.binary);
    }
    let path = status
        .resolved_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unknown path)".to_string());
    if status.world_writable_location {
        format!("[WARN] {}: {path} (directory writable by other users)", status.binary)
    } else {
        format!("[OK] {}: {path}", status.binary)
    }
}

fn flow_command(command: FlowCommands) -> Result<()> {
    match command {
        FlowCommands::Keygen {
            key_id,
            trust,
            overwrite,
            private_key,
            public_key,
        } => {
            let key_id = signature::normalize_key_id(&key_id)?;
            let private_path =
                PathBuf::from(private_key.unwrap_or_else(|| format!("{key_id}.pem")));
            let public_path =
                PathBuf::from(public_key.unwrap_or_else(|| format!("{key_id}.pub.pem")));
            signature::generate_keypair(&private_path, &public_path, overwrite)?;
            println!("Private key: {}", private_path.display());
            println!("Public key:  {}", public_path.display());

            if trust {
                let home = paths::ensure_council_home()?;
                let trusted_dir = signature::trusted_keys_dir_from_env(&home);
                let destination =
                    signature::trust_public_key(&trusted_dir, &public_path, &key_id, overwrite)?;
                println!("Trusted as:  {}", destination.display());
            }
            Ok(())
        }
        FlowCommands::Sign {
            file,
            private_key,
            key_id,
            overwrite,
        } => {
            let sidecar = signature::sign_flow_file(
                Path::new(&file),
                Path::new(&private_key),
                &key_id,
                overwrite,
            )?;
            println!("Signature written to {}", sidecar.display());
            Ok(())
        }
        FlowCommands::Trust {
            public_key,
            key_id,
            overwrite,
        } => {
            let home = paths::ensure_council_home()?;
            let trusted_dir = signature::trusted_keys_dir_from_env(&home);
            let destination = signature::trust_public_key(
                &trusted_dir,
                Path::new(&public_key),
                &key_id,
                overwrite,
            )?;
            println!("Key '{key_id}' trusted at {}", destination.display());
            Ok(())
        }
        FlowCommands::Verify { file, public_key } => {
            let flow_path = PathBuf::from(&file);
            let flow_bytes = std::fs::read(&flow_path)
                .with_context(|| format!("could not read '{}'", flow_path.display()))?;
            let home = paths::council_home();
            let trusted_dir = signature::trusted_keys_dir_from_env(&home);
            let outcome = signature::verify_flow_file(
                &flow_path,
                &flow_bytes,
                true,
                &trusted_dir,
                public_key.as_deref().map(Path::new),
            )?;
            if let signature::VerifyOutcome::Verified { key_id } = outcome {
                println!("Signature OK (key_id '{key_id}')");
            }
            Ok(())
        }
    }
}

fn read_prompt_line() -> Result<String> {
    eprint!("Prompt> ");
    let _ = std::io::stderr().flush();
    let mut prompt = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut prompt)
        .context("could not read the prompt")?;
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        bail!("an initial prompt is required");
    }
    Ok(prompt)
}
