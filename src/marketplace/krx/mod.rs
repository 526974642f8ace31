use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::marketplace::{AssetClass, DailyBar, ListedTicker, Market, MarketDataApi};
use crate::ticker::Ticker;

mod listing_api;
mod market_data_api;
pub mod utils;

pub const ENDPOINT: &str = "https://data-dbg.krx.co.kr";

/// KRX Open API client. Every call carries the issued key in the `AUTH_KEY` header.
#[derive(Debug, Clone)]
pub struct KrxMarketplace {
    client: Client,
    auth_key: String,
    base_url: String,
}

/// Every KRX payload wraps its rows in `OutBlock_1`.
#[derive(Deserialize, Debug)]
struct OutBlock<T> {
    #[serde(rename = "OutBlock_1", default = "Vec::new")]
    rows: Vec<T>,
}

/// URL segment grouping KRX services.
#[derive(Debug, Clone, Copy)]
enum ApiCategory {
    Stock,
    Etp,
}

impl ApiCategory {
    fn path(&self) -> &'static str {
        match self {
            ApiCategory::Stock => "sto",
            ApiCategory::Etp => "etp",
        }
    }
}

impl KrxMarketplace {
    pub fn new(
        auth_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build KRX http client")?;
        Ok(Self {
            client,
            auth_key: auth_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        category: ApiCategory,
        api_id: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/svc/apis/{}/{}", self.base_url, category.path(), api_id);
        debug!(api_id, ?params, "{}", url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .header("AUTH_KEY", &self.auth_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("KRX request {api_id} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("KRX API error [{api_id}]: {status} - {body}");
        }

        let data: OutBlock<T> = response
            .json()
            .await
            .with_context(|| format!("Invalid KRX payload for {api_id}"))?;
        Ok(data.rows)
    }
}

impl MarketDataApi for KrxMarketplace {
    async fn list_tickers(&self, market: Market, day: NaiveDate) -> Result<Vec<ListedTicker>> {
        match market {
            Market::Kospi | Market::Kosdaq => self.get_listed_equities(market, day).await,
            Market::Etf => self.get_listed_etfs(day).await,
        }
    }

    async fn daily_bars(
        &self,
        ticker: &Ticker,
        asset_class: AssetClass,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let mut bars = match asset_class {
            AssetClass::Equity => self.get_equity_bars(ticker, from, to).await?,
            AssetClass::Fund => self.get_etf_bars(ticker, from, to).await?,
        };
        bars.sort_by_key(|bar| bar.date);
        Ok(bars)
    }

    async fn nearest_business_day(&self) -> Result<NaiveDate> {
        self.get_nearest_business_day(self.today()).await
    }

    async fn market_caps(&self, date: NaiveDate) -> Result<HashMap<Ticker, i64>> {
        let (kospi, kosdaq) = tokio::try_join!(
            self.get_market_caps(Market::Kospi, date),
            self.get_market_caps(Market::Kosdaq, date),
        )?;
        let mut caps = kospi;
        caps.extend(kosdaq);
        Ok(caps)
    }
}
