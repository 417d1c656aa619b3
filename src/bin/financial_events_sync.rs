//! Sync Conta Azul financial events (CR and CP) into two Google Sheets tabs.
//! Each run clears the target tabs before writing the fresh results.

use std::error::Error;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use contasync::{ContaAzulClient, EventKind, SheetsClient};

#[derive(Debug, Parser)]
#[command(
    name = "financial-events-sync",
    about = "Sync Conta Azul financial events into Google Sheets"
)]
struct Cli {
    /// Start due date YYYY-MM-DD
    #[arg(value_parser = parse_date)]
    start: NaiveDate,

    /// End due date YYYY-MM-DD
    #[arg(value_parser = parse_date)]
    end: NaiveDate,

    /// OAuth access token for the Conta Azul API
    #[arg(long, env = "CONTA_AZUL_TOKEN")]
    token: String,

    /// Google Sheets spreadsheet ID
    #[arg(long, env = "GOOGLE_SHEETS_ID")]
    spreadsheet_id: String,

    /// Path to the Google service-account JSON key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    service_account_file: PathBuf,

    /// Worksheet tab for contas a receber
    #[arg(long, default_value = "CR")]
    worksheet_cr: String,

    /// Worksheet tab for contas a pagar
    #[arg(long, default_value = "CP")]
    worksheet_cp: String,

    /// Skip TLS certificate verification on Conta Azul requests
    #[arg(long)]
    no_verify_ssl: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let client = ContaAzulClient::with_tls_verification(cli.token, !cli.no_verify_ssl)?;
    let sheets = SheetsClient::connect(&cli.service_account_file, cli.spreadsheet_id).await?;

    sheets.ensure_worksheet(&cli.worksheet_cr).await?;
    sheets.ensure_worksheet(&cli.worksheet_cp).await?;

    let receivables = client
        .fetch_all_events(EventKind::Receivable, cli.start, cli.end)
        .await?;
    let payables = client
        .fetch_all_events(EventKind::Payable, cli.start, cli.end)
        .await?;

    sheets.write_records(&cli.worksheet_cr, &receivables).await?;
    sheets.write_records(&cli.worksheet_cp, &payables).await?;

    println!(
        "Synced {} receivables to {} and {} payables to {}",
        receivables.len(),
        cli.worksheet_cr,
        payables.len(),
        cli.worksheet_cp
    );
    Ok(())
}
