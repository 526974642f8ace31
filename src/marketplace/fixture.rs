use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::info;

use super::{AssetClass, DailyBar, ListedTicker, Market, MarketDataApi};
use crate::ticker::Ticker;

/// A canned market snapshot, usually read from a JSON file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Fixture {
    pub business_day: NaiveDate,
    #[serde(default)]
    pub kospi: Vec<ListedTicker>,
    #[serde(default)]
    pub kosdaq: Vec<ListedTicker>,
    #[serde(default)]
    pub etf: Vec<ListedTicker>,
    #[serde(default)]
    pub bars: HashMap<Ticker, Vec<DailyBar>>,
    #[serde(default)]
    pub market_caps: HashMap<Ticker, i64>,
}

impl Fixture {
    pub fn new(business_day: NaiveDate) -> Self {
        Self {
            business_day,
            kospi: vec![],
            kosdaq: vec![],
            etf: vec![],
            bars: HashMap::new(),
            market_caps: HashMap::new(),
        }
    }

    fn listing(&self, market: Market) -> &Vec<ListedTicker> {
        match market {
            Market::Kospi => &self.kospi,
            Market::Kosdaq => &self.kosdaq,
            Market::Etf => &self.etf,
        }
    }

    fn listing_mut(&mut self, market: Market) -> &mut Vec<ListedTicker> {
        match market {
            Market::Kospi => &mut self.kospi,
            Market::Kosdaq => &mut self.kosdaq,
            Market::Etf => &mut self.etf,
        }
    }

    pub fn with_listing(mut self, market: Market, ticker: &str, name: &str) -> Result<Self> {
        let ticker = Ticker::try_from(ticker).map_err(anyhow::Error::msg)?;
        self.listing_mut(market).push(ListedTicker {
            ticker,
            name: name.to_string(),
        });
        Ok(self)
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<DailyBar>) -> Result<Self> {
        let ticker = Ticker::try_from(ticker).map_err(anyhow::Error::msg)?;
        self.bars.insert(ticker, bars);
        Ok(self)
    }

    pub fn with_market_cap(mut self, ticker: &str, cap: i64) -> Result<Self> {
        let ticker = Ticker::try_from(ticker).map_err(anyhow::Error::msg)?;
        self.market_caps.insert(ticker, cap);
        Ok(self)
    }

    fn listed_class(&self, ticker: &Ticker) -> Option<AssetClass> {
        [Market::Kospi, Market::Kosdaq, Market::Etf]
            .into_iter()
            .find(|market| self.listing(*market).iter().any(|l| l.ticker == *ticker))
            .map(|market| market.asset_class())
    }
}

/// Serves a [`Fixture`] as if it were the exchange. Used for tests and offline runs.
#[derive(Clone, Debug)]
pub struct FixtureMarketplace {
    fixture: Arc<Fixture>,
}

impl FixtureMarketplace {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Arc::new(fixture),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .await
            .with_context(|| format!("Failed to open fixture {}", path.display()))?;
        let mut content = String::new();
        file.read_to_string(&mut content).await?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("Invalid fixture {}", path.display()))?;
        info!(
            "Loaded fixture {} ({} series)",
            path.display(),
            fixture.bars.len()
        );
        Ok(Self::new(fixture))
    }
}

impl MarketDataApi for FixtureMarketplace {
    /// A snapshot's clock stops on its business day.
    fn today(&self) -> NaiveDate {
        self.fixture.business_day
    }

    async fn list_tickers(&self, market: Market, _day: NaiveDate) -> Result<Vec<ListedTicker>> {
        Ok(self.fixture.listing(market).clone())
    }

    async fn daily_bars(
        &self,
        ticker: &Ticker,
        asset_class: AssetClass,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        match self.fixture.listed_class(ticker) {
            Some(class) if class != asset_class => {
                bail!("{ticker} is not listed as {asset_class:?}")
            }
            _ => {}
        }
        let mut bars: Vec<DailyBar> = self
            .fixture
            .bars
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.date >= from && bar.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        bars.sort_by_key(|bar| bar.date);
        Ok(bars)
    }

    async fn nearest_business_day(&self) -> Result<NaiveDate> {
        Ok(self.fixture.business_day)
    }

    async fn market_caps(&self, _date: NaiveDate) -> Result<HashMap<Ticker, i64>> {
        Ok(self.fixture.market_caps.clone())
    }
}

/// Test source whose listings fail a fixed number of times before serving the fixture.
#[cfg(test)]
pub(crate) struct FlakyListings {
    inner: FixtureMarketplace,
    failures: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FlakyListings {
    pub(crate) fn new(fixture: Fixture, failures: usize) -> Self {
        Self {
            inner: FixtureMarketplace::new(fixture),
            failures: failures.into(),
        }
    }
}

#[cfg(test)]
impl MarketDataApi for FlakyListings {
    fn today(&self) -> NaiveDate {
        self.inner.today()
    }

    async fn list_tickers(&self, market: Market, day: NaiveDate) -> Result<Vec<ListedTicker>> {
        use std::sync::atomic::Ordering;

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("{market} listing unavailable");
        }
        self.inner.list_tickers(market, day).await
    }

    async fn daily_bars(
        &self,
        ticker: &Ticker,
        asset_class: AssetClass,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        self.inner.daily_bars(ticker, asset_class, from, to).await
    }

    async fn nearest_business_day(&self) -> Result<NaiveDate> {
        self.inner.nearest_business_day().await
    }

    async fn market_caps(&self, date: NaiveDate) -> Result<HashMap<Ticker, i64>> {
        self.inner.market_caps(date).await
    }
}
