//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{document_cmd, link_cmd, registry_cmd};
use crate::storage::Project;

#[derive(Parser)]
#[command(name = "docanchor")]
#[command(author, version, about = "Heading anchors, tables of contents and cross-document links for HTML documents")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new doc-anchors project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Print the anchor slug for a piece of text
    Slug {
        /// Heading text
        text: String,

        /// Maximum slug length (0 for unlimited)
        #[arg(long)]
        max_length: Option<usize>,
    },

    /// Assign unique anchor ids to every heading
    Assign {
        /// HTML file ("-" for stdin)
        file: PathBuf,

        /// Prefix for generated anchors
        #[arg(long)]
        prefix: Option<String>,

        /// Rewrite the file in place
        #[arg(long, short = 'w', conflicts_with = "output")]
        write: bool,

        /// Write the result to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Build (or rebuild) the table of contents of a document
    Toc {
        /// HTML file ("-" for stdin)
        file: PathBuf,

        /// Rewrite the file in place
        #[arg(long, short = 'w', conflicts_with = "output")]
        write: bool,

        /// Write the result to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// What to do with unresolved outline entries (warn, reject)
        #[arg(long)]
        gate: Option<String>,

        /// Deepest heading level listed in the outline
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=6))]
        max_level: Option<u8>,
    },

    /// Check a document's table of contents and fragment links
    Check {
        /// HTML file ("-" for stdin)
        file: PathBuf,
    },

    /// Build a link to a registered document
    Link {
        /// Target document uid
        target: String,

        /// Heading anchor within the target
        #[arg(long, short = 'a')]
        anchor: Option<String>,

        /// Environment to build the link for
        #[arg(long, short = 'e', env = "DOCANCHOR_ENV")]
        env: Option<String>,
    },

    /// Manage the document registry
    #[command(subcommand)]
    Registry(registry_cmd::RegistryCommands),
}

/// Installs the tracing subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("docanchor starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .docanchor directory at: {}", project.data_dir().display()),
            );
            output.success(&format!(
                "Initialized doc-anchors project at {}",
                project.root().display()
            ));
        }

        Commands::Slug { text, max_length } => document_cmd::slug(&output, &text, max_length)?,

        Commands::Assign {
            file,
            prefix,
            write,
            output: target,
        } => document_cmd::assign(&output, &file, prefix, write, target.as_deref())?,

        Commands::Toc {
            file,
            write,
            output: target,
            gate,
            max_level,
        } => document_cmd::toc(
            &output,
            &file,
            document_cmd::TocArgs {
                write,
                target,
                gate,
                max_level,
            },
        )?,

        Commands::Check { file } => document_cmd::check(&output, &file)?,

        Commands::Link { target, anchor, env } => {
            link_cmd::run(&output, &target, anchor.as_deref(), env.as_deref())?
        }

        Commands::Registry(cmd) => registry_cmd::run(cmd, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
