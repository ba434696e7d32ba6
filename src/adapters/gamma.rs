//! Polymarket Gamma market listings
//!
//! Active, open markets from the Gamma API, paged by offset. Only the
//! question text matters for matching; prices and volume ride along.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::http::fetch_json;
use super::traits::MarketSource;
use crate::config::FeedConfig;
use crate::domain::ContractListing;
use crate::error::Result;

/// Stop paging after this many pages even if the API keeps returning full ones
const MAX_PAGES: u32 = 20;

/// Deserialize optional number that could be string or number
fn deserialize_optional_decimal<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

/// Market from the Gamma API
#[derive(Debug, Clone, Deserialize)]
struct GammaMarket {
    #[serde(rename = "conditionId", alias = "condition_id")]
    condition_id: Option<String>,

    /// Gamma's own numeric id, used when the condition id is missing
    #[serde(default)]
    id: Option<String>,

    /// Market question (e.g., "Will the Lakers beat the Celtics?")
    question: Option<String>,

    #[serde(rename = "endDate")]
    end_date: Option<String>,

    /// Outcome prices as a JSON-encoded string array, YES first
    #[serde(rename = "outcomePrices", default)]
    outcome_prices: Option<String>,

    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    volume: Option<Decimal>,
}

impl GammaMarket {
    fn prices(&self) -> (Option<Decimal>, Option<Decimal>) {
        let parsed: Option<Vec<String>> = self
            .outcome_prices
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        match parsed.as_deref() {
            Some([yes, no, ..]) => (yes.parse().ok(), no.parse().ok()),
            _ => (None, None),
        }
    }

    fn into_listing(self) -> Option<ContractListing> {
        let contract_id = self.condition_id.clone().or_else(|| self.id.clone())?;
        let title = self.question.clone().filter(|q| !q.trim().is_empty())?;
        let (yes_price, no_price) = self.prices();
        let close_time = self
            .end_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));

        Some(ContractListing {
            contract_id,
            title,
            yes_price,
            no_price,
            volume: self.volume,
            close_time,
        })
    }
}

pub struct GammaMarkets {
    http: reqwest::Client,
    base_url: String,
    page_limit: u32,
}

impl GammaMarkets {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.gamma_base_url.trim_end_matches('/').to_string(),
            page_limit: config.market_page_limit.max(1),
        })
    }

    async fn fetch_page(&self, offset: u32) -> Result<Vec<GammaMarket>> {
        let req = self.http.get(format!("{}/markets", self.base_url)).query(&[
            ("limit", self.page_limit.to_string()),
            ("offset", offset.to_string()),
            ("active", "true".to_string()),
            ("closed", "false".to_string()),
        ]);
        fetch_json("gamma/markets", req).await
    }
}

#[async_trait]
impl MarketSource for GammaMarkets {
    async fn fetch_active_contracts(&self) -> Result<Vec<ContractListing>> {
        let mut listings = Vec::new();
        let mut skipped = 0usize;

        for page in 0..MAX_PAGES {
            let markets = self.fetch_page(page * self.page_limit).await?;
            let full_page = markets.len() as u32 >= self.page_limit;

            for market in markets {
                match market.into_listing() {
                    Some(listing) => listings.push(listing),
                    None => skipped += 1,
                }
            }

            if !full_page {
                break;
            }
            if page + 1 == MAX_PAGES {
                warn!(pages = MAX_PAGES, "Gamma paging cut off; listing may be incomplete");
            }
        }

        debug!(contracts = listings.len(), skipped, "Fetched Gamma markets");
        Ok(listings)
    }
}
