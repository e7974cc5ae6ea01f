use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dca::api::{SimulateArgs, run_http_server, run_simulate_command};

#[derive(Parser, Debug)]
#[command(
    name = "dca",
    about = "Recurring investment simulator (capped tax-advantaged + taxable accounts, equity/gold/savings)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON simulation API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one strategy over a series file and print the result as JSON.
    Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Simulate(args) => match run_simulate_command(args) {
            Ok(report) => println!("{report}"),
            Err(e) => {
                eprintln!("Simulation error: {e}");
                std::process::exit(1);
            }
        },
    }
}
