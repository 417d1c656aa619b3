//! Conta Azul API client: the legacy installment search and the paginated
//! v2 financial-event fetcher.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};
use reqwest::{Client as HttpClient, Response};
use serde_json::Value;

use crate::error::SyncError;
use crate::record::Record;

const BASE_URL: &str = "https://api.contaazul.com";
const BASE_URL_V2: &str = "https://api-v2.contaazul.com";

/// Fixed page size for the v2 listing endpoints.
pub const PAGE_SIZE: u32 = 100;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// The two financial event categories the toolkit syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Contas a receber (CR).
    Receivable,
    /// Contas a pagar (CP).
    Payable,
}

impl EventKind {
    pub fn path(&self) -> &'static str {
        match self {
            EventKind::Receivable => "/v1/financeiro/eventos-financeiros/contas-a-receber/buscar",
            EventKind::Payable => "/v1/financeiro/eventos-financeiros/contas-a-pagar/buscar",
        }
    }

    /// Conventional sink name for this category (worksheet tab, table).
    pub fn short_name(&self) -> &'static str {
        match self {
            EventKind::Receivable => "CR",
            EventKind::Payable => "CP",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = match self {
            EventKind::Receivable => "contas a receber",
            EventKind::Payable => "contas a pagar",
        };
        f.write_str(v)
    }
}

/// One parsed page of the v2 listing envelope.
#[derive(Debug)]
struct EventsPage {
    items: Vec<Record>,
    total: usize,
}

#[derive(Debug, Clone)]
pub struct ContaAzulClient {
    token: String,
    http: HttpClient,
    base_url: String,
    base_url_v2: String,
    page_size: u32,
}

impl ContaAzulClient {
    /// Create a new client with the default base URLs.
    pub fn new(token: impl Into<String>) -> Result<Self, SyncError> {
        Self::with_tls_verification(token, true)
    }

    /// Create a client, optionally skipping TLS certificate verification.
    pub fn with_tls_verification(
        token: impl Into<String>,
        verify_ssl: bool,
    ) -> Result<Self, SyncError> {
        let http = HttpClient::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;
        Ok(Self {
            token: token.into(),
            http,
            base_url: BASE_URL.to_string(),
            base_url_v2: BASE_URL_V2.to_string(),
            page_size: PAGE_SIZE,
        })
    }

    /// Override the legacy API base URL (useful for tests or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the v2 API base URL (useful for tests or proxies).
    pub fn with_v2_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_v2 = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Fetch installments to receive in the given due-date range (legacy
    /// endpoint). The API may wrap results inside a `data` field.
    pub async fn search_installments(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Record>, SyncError> {
        let url = format!("{}/financeiro/searchinstallmentstoreceivebyfilter", self.base_url);
        debug!("searching installments due {start} to {end}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("data_vencimento_de", start.to_string()),
                ("data_vencimento_ate", end.to_string()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;
        let payload = Self::json_body(&url, response).await?;

        let data = match &payload {
            Value::Object(map) if map.contains_key("data") => &map["data"],
            other => other,
        };
        let items = data
            .as_array()
            .ok_or(SyncError::ApiShape("installment search must return an array"))?;
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .cloned()
                    .ok_or(SyncError::ApiShape("each installment must be a JSON object"))
            })
            .collect()
    }

    /// Fetch every financial event of the given kind due inside the date
    /// range, walking pages sequentially until the server-declared total is
    /// reached or a page comes back empty.
    pub async fn fetch_all_events(
        &self,
        kind: EventKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Record>, SyncError> {
        let url = format!("{}{}", self.base_url_v2, kind.path());
        let mut collected: Vec<Record> = Vec::new();
        let mut total_expected: Option<usize> = None;
        let mut page: u32 = 1;

        loop {
            debug!("fetching {kind} page {page}");
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[
                    ("pagina", page.to_string()),
                    ("tamanho_pagina", self.page_size.to_string()),
                    ("data_vencimento_de", start.to_string()),
                    ("data_vencimento_ate", end.to_string()),
                ])
                .timeout(PAGE_TIMEOUT)
                .send()
                .await?;
            let payload = Self::json_body(&url, response).await?;
            let events_page = parse_events_page(&payload)?;

            // Totals on later pages are ignored; the first page wins.
            let total = *total_expected.get_or_insert(events_page.total);
            let page_was_empty = events_page.items.is_empty();
            collected.extend(events_page.items);

            // The empty-page check guards against a total that is never
            // reached, which would otherwise loop forever.
            if collected.len() >= total || page_was_empty {
                break;
            }
            page += 1;
        }

        info!("fetched {} {kind} events", collected.len());
        Ok(collected)
    }

    async fn json_body(url: &str, response: Response) -> Result<Value, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Validates the v2 listing envelope: an object carrying an `itens` array of
/// objects and an integer `itens_totais`. Violations fail before any item of
/// the page is accepted.
fn parse_events_page(payload: &Value) -> Result<EventsPage, SyncError> {
    let object = payload
        .as_object()
        .ok_or(SyncError::ApiShape("response body must be a JSON object"))?;

    let items = object
        .get("itens")
        .ok_or(SyncError::ApiShape("field 'itens' is missing"))?
        .as_array()
        .ok_or(SyncError::ApiShape("field 'itens' must be an array"))?;
    let total = object
        .get("itens_totais")
        .ok_or(SyncError::ApiShape("field 'itens_totais' is missing"))?
        .as_u64()
        .ok_or(SyncError::ApiShape("field 'itens_totais' must be an integer"))?;

    let items = items
        .iter()
        .map(|item| {
            item.as_object()
                .cloned()
                .ok_or(SyncError::ApiShape("each item must be a JSON object"))
        })
        .collect::<Result<Vec<Record>, SyncError>>()?;

    Ok(EventsPage {
        items,
        total: total as usize,
    })
}

/// First and last day of the given month, or `None` for an invalid month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next_month.pred_opt()?))
}
