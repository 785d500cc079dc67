use crate::api::RestApi;
use crate::config::Config;
use crate::core::Ledger;
use crate::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ledgerd")]
#[command(about = "In-memory hash-chained UTXO ledger with proof-of-work sealing")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "REST API port")]
    pub port: Option<u16>,

    #[arg(long, help = "Leading zero hex digits required of every block hash")]
    pub difficulty: Option<usize>,

    #[arg(long, help = "Recipient of the genesis coinbase")]
    pub genesis_recipient: Option<String>,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}

impl Cli {
    /// Command line flags win over the file and the environment.
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(difficulty) = self.difficulty {
            config.ledger.difficulty = difficulty;
        }
        if let Some(recipient) = &self.genesis_recipient {
            config.ledger.genesis_recipient = recipient.clone();
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).try_init();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let ledger = Arc::new(Ledger::new(&config.ledger)?);
    log::info!(
        "Ledger ready: genesis recipient '{}', difficulty {}",
        config.ledger.genesis_recipient,
        config.ledger.difficulty
    );

    let api = RestApi::new(ledger, config.api.clone());
    tokio::select! {
        result = api.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("🛑 Shutdown signal received");
        }
    }

    Ok(())
}
