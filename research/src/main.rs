mod assistant;
mod cli;
mod config;
mod error;
mod export;
mod output;
mod pdf;
mod server;

use clap::{Parser, Subcommand};
use config::{Config, ConfigArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "research-assistant")]
#[command(about = "Answer research questions with a tool-using LLM agent and export the results")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question on the command line
    Ask {
        /// Your name (prompted for when missing)
        #[arg(long)]
        name: Option<String>,

        /// The research question (prompted for when missing)
        #[arg(long)]
        query: Option<String>,

        /// Also write the text and pdf reports
        #[arg(long)]
        export: bool,
    },
    /// Serve the web page and the POST /research endpoint
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "RESEARCH_HOST")]
        host: String,

        #[arg(short, long, default_value_t = 5000, env = "RESEARCH_PORT")]
        port: u16,
    },
    /// Parse a saved provider response without calling the provider
    Parse { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_directive = if args.config.verbose {
        "research_assistant=debug,agent=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Ask {
            name,
            query,
            export,
        } => {
            let config = Config::from_args(&args.config)?;
            cli::ask(&config, name, query, export).await?;
        }
        Command::Serve { host, port } => {
            let config = Config::from_args(&args.config)?;
            server::serve(&config, &host, port).await?;
        }
        Command::Parse { file } => cli::replay(&file)?,
    }

    Ok(())
}
