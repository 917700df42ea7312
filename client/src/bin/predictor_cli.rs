use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use predictor_client::grid::Grid;
use predictor_client::{
    FileStorage, HttpVerifier, LoginResult, PredictionOutcome, ResumeResult, Session,
    SessionConfig, SessionState,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manual driver for the predictor funnel", long_about = None)]
struct Args {
    /// Base URL of the predictor server.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,

    /// Path of the JSON file holding client-local state.
    #[arg(long, default_value = "predictor-state.json")]
    state_file: PathBuf,

    /// Affiliate deposit link handed out on `deposit`.
    #[arg(long)]
    affiliate_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a player ID against the server and activate the session.
    Login { id: String },
    /// Reveal one prediction grid (consumes one of the allowance).
    Predict {
        /// Number of traps to mark on the 5x5 grid.
        #[arg(long, default_value_t = 3)]
        traps: usize,
    },
    /// Mark the session as waiting for a deposit and print the deposit link.
    Deposit,
    /// Clear the active session (progress is kept).
    Logout,
    /// Show the current session state.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let storage = FileStorage::load(&args.state_file)
        .with_context(|| format!("failed to load {}", args.state_file.display()))?;
    let verifier = HttpVerifier::new(&args.server_url).context("invalid server URL")?;
    let mut config = SessionConfig::default();
    if let Some(affiliate_url) = args.affiliate_url {
        config.affiliate_url = affiliate_url;
    }
    let mut session = Session::new(storage, verifier, config);

    // Every invocation starts from the persisted state, like an app load.
    let resumed = session.resume().await?;
    if let ResumeResult::DepositConfirmed { remaining } = resumed {
        println!("Deposit successful! You have {remaining} new predictions.");
    }

    match args.command {
        Command::Login { id } => match session.login(&id).await? {
            LoginResult::LoggedIn {
                new_deposit_detected,
                remaining,
            } => {
                if new_deposit_detected {
                    println!("New deposit confirmed! Your prediction count has been reset.");
                }
                println!("Logged in as {id}. Predictions left: {remaining}");
            }
            LoginResult::NotRegistered { prompt, .. } => println!("{prompt}"),
            LoginResult::NeedsDeposit { prompt } => println!("{prompt}"),
        },
        Command::Predict { traps } => match session.consume_prediction()? {
            PredictionOutcome::Consumed { used, remaining } => {
                let mut rng = StdRng::from_entropy();
                let grid = Grid::generate(5, 5, traps, &mut rng);
                println!("{}", grid.render());
                println!("Prediction {used} revealed. {remaining} left.");
            }
            PredictionOutcome::LimitReached => {
                println!("Prediction limit reached. Run `deposit` to unlock a fresh allowance.");
            }
        },
        Command::Deposit => {
            let url = session.request_deposit()?;
            println!("Complete your deposit here, then run any command to re-check:");
            println!("{url}");
        }
        Command::Logout => {
            session.logout()?;
            println!("Logged out. Progress is kept for the next login.");
        }
        Command::Status => match (session.state(), session.current()) {
            (SessionState::LoggedOut, _) => println!("No active session."),
            (state, Some(record)) => {
                if resumed == ResumeResult::StillAwaiting {
                    println!("Awaiting deposit confirmation.");
                }
                println!(
                    "user={} state={state:?} predictions_used={} known_redeposits={}",
                    record.id, record.prediction_count, record.known_redeposits
                );
            }
            (state, None) => println!("state={state:?}"),
        },
    }

    Ok(())
}
