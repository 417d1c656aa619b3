//! Single-shot invoice extraction through the OpenAI chat-completions API:
//! clean the raw text, wrap it in the fixed instruction template, size the
//! completion by the prompt's token count, parse the returned JSON.

use std::time::Duration;

use log::{debug, info};
use reqwest::Client as HttpClient;
use serde_json::{Value, json};

use crate::error::SyncError;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_ENCODING: &str = "cl100k_base";

// Instruction template the automation depends on; configuration, not code.
// The extraction rules are phrased in Portuguese because the invoices are.
const PROMPT_INSTRUCTIONS: &str = r#" *** Extraía apenas dos arquivos PDF enviados agora nessa mensagem, os itens da tabela que contem as informações Item, Quantity, Rate e Amount. Extraía cada linha e formate os dados da seguinte forma: 0 - A coluna "Item" tem duas linhas extraia a primeira linha é referente ao conteúdo do JSON "Item" e a segunda linha possui duas datas a primeira data deve ser extraída e atribuida ao conteúdo do JSON "dataStart" e a segunda data deve ser extraída e atribuida ao conteúdo do JSON "dataEnd" 1 - Deve ser removido o item da tabela que contenha o texto Usage na coluna "Item" 2 - A coluna Item possui duas linhas, sendo assim quero extraia apenas a primeira linha 3 - A coluna Rate precisa ser convertida em numérica com duas casas decimais, usando o carácter . como separador decimal 4 - A coluna Amount, deve apenas conte números e convertida em numérica com duas casas decimais, usando o carácter . como separador decimal. O caracter vírgula deve ser removido Na coluna Quantity, Rate e Amount, se possuirem casa decimal maior que 2, deve ser mantido o total das casas decimais extraídas. Além disso, deve ser extraída a informação que vem após o texto “Invoice #“ que é o número da invoice e também a informação "Amount Due" que fica no fim do arquivo e que deve apenas conte números e convertida em numérica com duas casas decimais, usando o carácter . como separador decimal. O caracter vírgula deve ser removido. Você deve gerar uma saída com esses dados extraídos em um formato json, onde os itens extraídos são ramificações filha de uma propriedade chamada “invoice” e o conteúdo é o número da invoice e também a informação "Amount Due" deve vir depois da informação do número da invoice, alem disso o número da invoice possui um separador de traço -, você deve extrair a primeira parte do traço que atribuida a propriedade o JSON datadogId. Use o JSON a seguir como modelo: { "invoices": [ { "invoice": "1200082703-10112023",  "datadogId": "1200082703",  "amountDue": 10.20, "items": [ { "Item": "On-Demand Analyzed Logs (Security)", "dataStart": 2024-01-01, "dataEnd": 2024-01-31, "Quantity": 305, "Rate": 0.29, "Amount": 88.76 } ] }, ] } Quero que sua resposta apenas contenha o JSON e mais nenhum outro tipo de informação, caso o texto enviado não tenha dados a serem extraidos retorne o JSON com items vazio."#;

/// Collapses whitespace runs to single spaces so the prompt stays compact.
pub fn clean_text(raw_text: &str) -> String {
    raw_text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Composes the full prompt: the cleaned invoice text framed by the fixed
/// instruction template.
pub fn build_prompt(cleaned_text: &str) -> String {
    format!("*** {cleaned_text}{PROMPT_INSTRUCTIONS}")
}

/// Number of tokens in `text` under the named tiktoken encoding.
pub fn count_tokens(text: &str, encoding_name: &str) -> Result<usize, SyncError> {
    let bpe = match encoding_name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "r50k_base" => tiktoken_rs::r50k_base(),
        other => {
            return Err(SyncError::Configuration(format!(
                "unknown token encoding: {other}"
            )));
        }
    }
    .map_err(|e| SyncError::Configuration(format!("failed to load token encoding: {e}")))?;
    Ok(bpe.encode_with_special_tokens(text).len())
}

/// Normalises the model output into a JSON value, tolerating the
/// line-leading whitespace models like to emit.
pub fn parse_json_response(raw_content: &str) -> Result<Value, SyncError> {
    let compact: String = raw_content.lines().map(str::trim).collect();
    Ok(serde_json::from_str(&compact)?)
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SyncError> {
        let http = HttpClient::builder().build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Override the API base URL (useful for tests or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends one chat-completion request and returns the raw message text.
    pub async fn chat_completion(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<String, SyncError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let payload = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 1,
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"},
        });

        debug!("requesting completion from {model} ({max_tokens} max tokens)");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(COMPLETION_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status { url, status, body });
        }

        let content: Value = response.json().await?;
        let message = content["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(SyncError::ApiShape(
                "completion response missing choices[0].message.content",
            ))?;
        Ok(message.trim().to_string())
    }

    /// Full extraction pipeline: prompt construction, token budgeting, one
    /// completion call, JSON parsing.
    pub async fn run_extraction(
        &self,
        raw_text: &str,
        model: &str,
        encoding_name: &str,
    ) -> Result<Value, SyncError> {
        let prompt = build_prompt(&clean_text(raw_text));
        let tokens = count_tokens(&prompt, encoding_name)?;
        info!("prompt holds {tokens} tokens under {encoding_name}");
        let raw_content = self.chat_completion(model, &prompt, tokens).await?;
        parse_json_response(&raw_content)
    }
}
