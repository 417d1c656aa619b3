//! Extract structured invoice data from raw PDF text through the OpenAI
//! chat-completions API and print the resulting JSON.

use std::error::Error;

use clap::Parser;
use contasync::extract::{DEFAULT_ENCODING, DEFAULT_MODEL, OpenAiClient};

#[derive(Debug, Parser)]
#[command(
    name = "invoice-extract",
    about = "Extract invoice line items from raw text via the OpenAI API"
)]
struct Cli {
    /// Raw text extracted from the invoice PDFs
    text: String,

    /// Model to query
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// tiktoken encoding used to size the completion
    #[arg(long, default_value = DEFAULT_ENCODING)]
    encoding: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = OpenAiClient::new(cli.api_key)?;
    let result = client
        .run_extraction(&cli.text, &cli.model, &cli.encoding)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
