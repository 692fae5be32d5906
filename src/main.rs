//! Pairpad - collaborative code sessions with shared sync and remote execution.
//!
//! Usage:
//!   pairpad serve [--port 8080]                      # Local execution backend
//!   pairpad serve --executor-url http://runner:9000  # Remote execution backend

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pairpad::executor::{ExecutionBackend, HttpBackend, ProcessBackend};
use pairpad::http_server;
use pairpad::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "pairpad")]
#[command(about = "Collaborative code sessions with remote execution")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Forward executions to a remote executor instead of running locally
        #[arg(long)]
        executor_url: Option<String>,

        /// Wall-clock limit for local executions, in seconds
        #[arg(long, default_value = "10")]
        exec_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve {
            port,
            executor_url,
            exec_timeout_secs,
        } => {
            let executor: Arc<dyn ExecutionBackend> = match executor_url {
                Some(url) => Arc::new(HttpBackend::new(url)),
                None => Arc::new(ProcessBackend::with_timeout(Duration::from_secs(
                    exec_timeout_secs,
                ))),
            };
            let state = AppState::new(executor);
            http_server::run_server(port, state).await;
        }
    }
}
