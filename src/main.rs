use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zstack::app::{self, AppConfig};

/// Supervise game servers and follow their logs
#[derive(Parser)]
#[command(name = "zstack")]
#[command(about = "Supervise long-running game servers and turn their logs into queryable state", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv adds thread ids and line numbers)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the stack file (default: <config dir>/zstack/stack.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start servers and supervise them until SIGINT or SIGTERM
    Run {
        /// Only start these servers (default: all)
        #[arg(short, long = "server")]
        servers: Vec<String>,
    },
    /// Validate the stack file and exit
    Check,
    /// Print the events decoded from a log file as JSON lines
    Decode {
        /// Log file to decode
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AppConfig::new(cli.verbose).with_config_path(cli.config);
    app::init_logging(&config);

    let result = match cli.command {
        Commands::Run { servers } => app::run_stack(&config, &servers).await,
        Commands::Check => run_check(&config).await,
        Commands::Decode { file } => {
            let mut stdout = std::io::stdout();
            app::decode_file(&file, &mut stdout).await.map(|_| ())
        }
    };

    if let Err(e) = result {
        app::handle_fatal_error(e, config.verbose);
    }
}

async fn run_check(config: &AppConfig) -> anyhow::Result<()> {
    let servers = app::check_config(config).await?;
    for server in &servers {
        println!(
            "{}: {} (mode {}, log {})",
            server.name,
            server.command,
            server.mode,
            server.log_dir.join(&server.log_file_pattern).display()
        );
    }
    println!("{} server(s) OK", servers.len());
    Ok(())
}
