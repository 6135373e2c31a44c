use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "otelgw",
    about = "Synthesize the nginx + OpenTelemetry collector gateway stack",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log format for stderr: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the CloudFormation template.
    ///
    /// The context file is TOML or JSON and must contain a `cluster-data`
    /// table with `vpc_id` and a `subnets` mapping of zone to subnet id.
    /// Deploying the template is left to the deployment tool.
    Synth {
        /// Context file (.toml or .json)
        #[arg(short, long, default_value = "otelgw.toml")]
        context: PathBuf,
        /// Write the template here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolve and validate the context without emitting a template
    Validate {
        #[arg(short, long, default_value = "otelgw.toml")]
        context: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for the template.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("otelgw=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }

    match cli.command {
        Commands::Synth { context, output } => {
            commands::synth::synth(&context, output.as_deref())
        }
        Commands::Validate { context } => commands::validate::validate(&context),
    }
}
