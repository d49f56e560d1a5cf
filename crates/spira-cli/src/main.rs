#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "spira: your SpiraPlan requirements, tasks and incidents in the terminal",
    long_about = None
)]
struct Cli {
    /// Enable debug logging for spira crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides SPIRA_FORMAT).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Config file (overrides SPIRA_CONFIG and the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Print the artifact tree",
        long_about = "Refresh once and print the category headers with their requirements, tasks and incidents.",
        after_help = "EXAMPLES:\n    # Print the tree\n    spira tree\n\n    # Emit machine-readable output\n    spira tree --json"
    )]
    Tree(cmd::tree::TreeArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one artifact",
        long_about = "Refresh once and print the detail lines and page URL for one artifact.",
        after_help = "EXAMPLES:\n    # Show an incident\n    spira show IN:7\n\n    # Emit machine-readable output\n    spira show TK:42 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Keep the tree fresh",
        long_about = "Refresh on the configured interval and print the tree whenever it changes.",
        after_help = "EXAMPLES:\n    # Watch until interrupted\n    spira watch\n\n    # Stop after three refreshes\n    spira watch --cycles 3"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Read",
        about = "List projects",
        after_help = "EXAMPLES:\n    # List projects visible to you\n    spira projects"
    )]
    Projects,

    #[command(
        next_help_heading = "Write",
        about = "Create a task",
        long_about = "Create a task with default status and type in a project, then refresh.",
        after_help = "EXAMPLES:\n    # Create a task by project name\n    spira new-task --name \"Have lunch\" --project \"Library Information System\"\n\n    # Or by project id\n    spira new-task --name \"Have lunch\" --project 1"
    )]
    NewTask(cmd::new_task::NewTaskArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Check credentials",
        after_help = "EXAMPLES:\n    # Verify url, username and api key\n    spira verify"
    )]
    Verify,

    #[command(
        next_help_heading = "Setup",
        about = "Manage configuration",
        after_help = "EXAMPLES:\n    # Show effective configuration\n    spira config show\n\n    # Set the server URL\n    spira config set credentials.url https://example.com/SpiraPlan\n\n    # Disable the refresh timer\n    spira config set refresh.refresh_time 0"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    spira completions bash > ~/.local/share/bash-completion/completions/spira"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("SPIRA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if verbose || env::var("DEBUG").is_ok() {
            "spira=debug,info"
        } else {
            "spira=info,warn"
        })
    });

    let format = env::var("SPIRA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let output = cli.output_mode();
    let config = cli.config.as_deref();
    debug!(?output, ?config, "starting");

    match &cli.command {
        Commands::Tree(args) => cmd::tree::run_tree(args, config, output),
        Commands::Show(args) => cmd::show::run_show(args, config, output),
        Commands::Watch(args) => cmd::watch::run_watch(args, config, output),
        Commands::Projects => cmd::projects::run_projects(config, output),
        Commands::NewTask(args) => cmd::new_task::run_new_task(args, config, output),
        Commands::Verify => cmd::verify::run_verify(config, output),
        Commands::Config(args) => cmd::config::run_config(args, config, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command, &mut std::io::stdout())
        }
    }
}
