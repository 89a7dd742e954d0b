//! CLI command definitions

use clap::{Parser, Subcommand};

/// Command-line surface for the council orchestrator.
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Council - terminal multi-agent LLM pipeline orchestrator")]
#[command(long_about = r#"
Council drives a configurable pipeline of LLM CLI tools: each step invokes
an external command (claude, gemini, codex, ollama, deepseek), streams its
output live, and threads prior outputs into the next step's input.

Examples:
  council run "Design a rate limiter for the API gateway"
  council tui -p "Refactor the session store"
  council doctor --flow-config ./flow.json
  council flow keygen --key-id release-1 --trust
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity of diagnostic logs (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a flow end to end without interactive checkpoints
    Run {
        /// The initial user prompt that seeds the flow
        prompt: String,

        /// Flow definition JSON. Omitted: FLOW_CONFIG -> ./flow.json ->
        /// <COUNCIL_HOME>/flow.json -> built-in default
        #[arg(short = 'c', long = "flow-config", value_name = "PATH")]
        flow_config: Option<String>,
    },

    /// Execute a flow with an interactive checkpoint after each step
    Tui {
        /// Initial prompt; read from the terminal when omitted
        #[arg(short, long)]
        prompt: Option<String>,

        #[arg(short = 'c', long = "flow-config", value_name = "PATH")]
        flow_config: Option<String>,
    },

    /// Validate the flow and its required binaries without executing steps
    Doctor {
        #[arg(short = 'c', long = "flow-config", value_name = "PATH")]
        flow_config: Option<String>,
    },

    /// Sign and verify flow files
    #[command(subcommand)]
    Flow(FlowCommands),
}

#[derive(Subcommand, Debug)]
pub enum FlowCommands {
    /// Generate an Ed25519 signing keypair
    Keygen {
        #[arg(long = "key-id", value_name = "ID")]
        key_id: String,

        /// Install the public key into the trust store immediately
        #[arg(long)]
        trust: bool,

        /// Overwrite existing key files
        #[arg(long)]
        overwrite: bool,

        /// Private key output path (default: ./<key-id>.pem)
        #[arg(long = "private-key", value_name = "PATH")]
        private_key: Option<String>,

        /// Public key output path (default: ./<key-id>.pub.pem)
        #[arg(long = "public-key", value_name = "PATH")]
        public_key: Option<String>,
    },

    /// Sign a flow file, writing the <flow>.sig sidecar next to it
    Sign {
        /// Flow file to sign
        file: String,

        #[arg(long = "private-key", value_name = "PATH")]
        private_key: String,

        #[arg(long = "key-id", value_name = "ID")]
        key_id: String,

        /// Overwrite an existing sidecar
        #[arg(long)]
        overwrite: bool,
    },

    /// Add a public key to the trust store
    Trust {
        /// PEM public key file
        public_key: String,

        #[arg(long = "key-id", value_name = "ID")]
        key_id: String,

        /// Replace an already-trusted key with the same id
        #[arg(long)]
        overwrite: bool,
    },

    /// Verify a flow file against its signature sidecar
    Verify {
        /// Flow file to verify
        file: String,

        /// Verify against an explicit public key instead of the trust store
        #[arg(long = "public-key", value_name = "PATH")]
        public_key: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["council", "run", "build a parser", "-c", "flow.json"]);
        match cli.command {
            Commands::Run {
                prompt,
                flow_config,
            } => {
                assert_eq!(prompt, "build a parser");
                assert_eq!(flow_config.as_deref(), Some("flow.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_flow_keygen() {
        let cli = Cli::parse_from(["council", "flow", "keygen", "--key-id", "release-1", "--trust"]);
        match cli.command {
            Commands::Flow(FlowCommands::Keygen {
                key_id,
                trust,
                overwrite,
                ..
            }) => {
                assert_eq!(key_id, "release-1");
                assert!(trust);
                assert!(!overwrite);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_doctor_and_verbosity() {
        let cli = Cli::parse_from(["council", "-vv", "doctor"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Doctor { flow_config: None }));
    }
}
