//! Automation toolkit for Conta Azul financial records.
//! Handles the OAuth2 token lifecycle, walks the paginated event endpoints,
//! and replays the results into SQLite tables or Google Sheets tabs. An
//! OpenAI-backed invoice extraction helper rides along.

pub mod client;
pub mod error;
pub mod extract;
pub mod oauth;
pub mod record;
pub mod sheets;
pub mod store;
pub mod table;

#[cfg(test)]
mod testutil;

pub use client::{ContaAzulClient, EventKind, PAGE_SIZE, month_range};
pub use error::SyncError;
pub use oauth::{OAuthConfig, OAuthTokenManager};
pub use record::Record;
pub use sheets::{ServiceAccountKey, SheetsClient};
pub use store::{TokenSet, TokenStore};
