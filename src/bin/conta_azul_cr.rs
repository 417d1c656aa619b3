//! Pull a year of "contas a receber" installments into a local SQLite
//! database, one legacy search per month. Handles the full OAuth2 lifecycle:
//! stored token, refresh, or a fresh authorization-code exchange.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Datelike, Utc};
use clap::Parser;
use contasync::{ContaAzulClient, OAuthConfig, OAuthTokenManager, SyncError, TokenStore, month_range, table};

#[derive(Debug, Parser)]
#[command(
    name = "conta-azul-cr",
    about = "Load Conta Azul receivable installments into SQLite, month by month"
)]
struct Cli {
    /// OAuth application client id
    #[arg(long, env = "CONTA_AZUL_CLIENT_ID")]
    client_id: String,

    /// OAuth application client secret
    #[arg(long, env = "CONTA_AZUL_CLIENT_SECRET")]
    client_secret: String,

    /// Redirect URI registered for the OAuth application
    #[arg(long, env = "CONTA_AZUL_REDIRECT_URI")]
    redirect_uri: String,

    /// Authorization code obtained from the consent URL, for the first run
    #[arg(long, env = "CONTA_AZUL_AUTH_CODE")]
    auth_code: Option<String>,

    /// Where tokens are persisted between runs
    #[arg(long, default_value = "tokens.json")]
    token_file: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = "conta_azul.db")]
    database: PathBuf,

    /// Year to sync (default: current year)
    #[arg(long)]
    year: Option<i32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = OAuthConfig {
        client_id: cli.client_id,
        client_secret: cli.client_secret,
        redirect_uri: cli.redirect_uri,
    };
    let manager = OAuthTokenManager::new(config, TokenStore::new(&cli.token_file))?;

    // No stored or refreshable credential: fall back to the one-time
    // authorization code when the operator supplied one.
    let access_token = match manager.valid_access_token().await {
        Ok(token) => token,
        Err(SyncError::AuthRequired { authorize_url }) => match &cli.auth_code {
            Some(code) => manager.exchange_code(code).await?.access_token,
            None => {
                return Err(format!(
                    "set CONTA_AZUL_AUTH_CODE with the code obtained at: {authorize_url}"
                )
                .into());
            }
        },
        Err(err) => return Err(err.into()),
    };

    let client = ContaAzulClient::new(access_token)?;
    let mut conn = rusqlite::Connection::open(&cli.database)?;
    let year = cli.year.unwrap_or_else(|| Utc::now().year());

    let mut total = 0usize;
    for month in 1..=12 {
        let (start, end) =
            month_range(year, month).ok_or_else(|| format!("invalid month {month}"))?;
        let records = client.search_installments(start, end).await?;
        total += records.len();
        table::insert_records(&mut conn, "CR", &records)?;
    }

    println!(
        "Stored {total} installments for {year} in {}",
        cli.database.display()
    );
    Ok(())
}
