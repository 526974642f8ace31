use std::collections::{HashMap, HashSet};

use anyhow::Result;
use futures::future::try_join_all;
use strum::IntoEnumIterator;
use tracing::info;

use crate::marketplace::{AssetClass, ListedTicker, Market, MarketDataApi};
use crate::ticker::{is_ticker_code, Ticker};

/// Name to ticker lookup for every listed equity and ETF, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TickerDirectory {
    by_name: HashMap<String, Ticker>,
    names: HashMap<Ticker, String>,
    equities: HashSet<Ticker>,
    funds: HashSet<Ticker>,
}

impl TickerDirectory {
    /// Fetches KOSPI, KOSDAQ and ETF listings of the nearest business day together, then
    /// merges them in that order. Source errors are not retried.
    pub async fn load<M: MarketDataApi>(market: &M) -> Result<Self> {
        let day = market.nearest_business_day().await?;
        info!(%day, "Initializing tickers (stocks & ETFs)");
        let markets: Vec<Market> = Market::iter().collect();
        let listings = try_join_all(markets.iter().map(|m| market.list_tickers(*m, day))).await?;

        let mut directory = Self::default();
        for (listing, listed) in markets.into_iter().zip(listings) {
            directory.extend(listing.asset_class(), listed);
        }
        info!(
            names = directory.len(),
            equities = directory.equities.len(),
            funds = directory.funds.len(),
            "Ticker initialization complete"
        );
        Ok(directory)
    }

    /// A name listed twice keeps the last ticker seen.
    pub fn extend<I>(&mut self, asset_class: AssetClass, listed: I)
    where
        I: IntoIterator<Item = ListedTicker>,
    {
        for ListedTicker { ticker, name } in listed {
            self.by_name.insert(name.clone(), ticker.clone());
            self.names.insert(ticker.clone(), name);
            match asset_class {
                AssetClass::Equity => self.equities.insert(ticker),
                AssetClass::Fund => self.funds.insert(ticker),
            };
        }
    }

    /// Six digit codes pass through unchecked, anything else is an exact name lookup.
    pub fn resolve(&self, term: &str) -> Option<Ticker> {
        if is_ticker_code(term) {
            Ticker::try_from(term).ok()
        } else {
            self.by_name.get(term).cloned()
        }
    }

    pub fn asset_class(&self, ticker: &Ticker) -> Option<AssetClass> {
        if self.funds.contains(ticker) {
            Some(AssetClass::Fund)
        } else if self.equities.contains(ticker) {
            Some(AssetClass::Equity)
        } else {
            None
        }
    }

    pub fn name(&self, ticker: &Ticker) -> Option<&str> {
        self.names.get(ticker).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::marketplace::fixture::{Fixture, FixtureMarketplace, FlakyListings};

    fn listed(ticker: &str, name: &str) -> ListedTicker {
        ListedTicker {
            ticker: Ticker::try_from(ticker).unwrap(),
            name: name.to_string(),
        }
    }

    fn directory() -> TickerDirectory {
        let mut directory = TickerDirectory::default();
        directory.extend(
            AssetClass::Equity,
            vec![listed("005930", "삼성전자"), listed("000660", "SK하이닉스")],
        );
        directory.extend(AssetClass::Fund, vec![listed("069500", "KODEX 200")]);
        directory
    }

    #[test]
    fn test_resolve_codes_pass_through() {
        let directory = directory();
        assert_eq!(directory.resolve("005930").unwrap().as_str(), "005930");
        // not listed, still returned as is
        assert_eq!(directory.resolve("123456").unwrap().as_str(), "123456");
        assert_eq!(
            TickerDirectory::default().resolve("999999").unwrap().as_str(),
            "999999"
        );
    }

    #[test]
    fn test_resolve_names() {
        let directory = directory();
        assert_eq!(directory.resolve("삼성전자").unwrap().as_str(), "005930");
        assert_eq!(directory.resolve("KODEX 200").unwrap().as_str(), "069500");
        assert_eq!(directory.resolve("kodex 200"), None);
        assert_eq!(directory.resolve("__nonexistent__"), None);
        assert_eq!(directory.resolve("05930"), None);
    }

    #[test]
    fn test_asset_class_and_name() {
        let directory = directory();
        let samsung = Ticker::try_from("005930").unwrap();
        let kodex = Ticker::try_from("069500").unwrap();
        let unknown = Ticker::try_from("123456").unwrap();
        assert_eq!(directory.asset_class(&samsung), Some(AssetClass::Equity));
        assert_eq!(directory.asset_class(&kodex), Some(AssetClass::Fund));
        assert_eq!(directory.asset_class(&unknown), None);
        assert_eq!(directory.name(&kodex), Some("KODEX 200"));
        assert_eq!(directory.name(&unknown), None);
    }

    #[test]
    fn test_duplicate_name_keeps_last() {
        let mut directory = directory();
        directory.extend(AssetClass::Fund, vec![listed("111111", "삼성전자")]);
        assert_eq!(directory.resolve("삼성전자").unwrap().as_str(), "111111");
        assert_eq!(directory.len(), 3);
    }

    #[tokio::test]
    async fn test_load_from_market() {
        let fixture = Fixture::new(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
            .with_listing(Market::Kospi, "005930", "삼성전자")
            .unwrap()
            .with_listing(Market::Kosdaq, "247540", "에코프로비엠")
            .unwrap()
            .with_listing(Market::Etf, "069500", "KODEX 200")
            .unwrap();
        let market = FixtureMarketplace::new(fixture);

        let directory = TickerDirectory::load(&market).await.unwrap();
        assert_eq!(directory.len(), 3);
        let ecopro = directory.resolve("에코프로비엠").unwrap();
        assert_eq!(directory.asset_class(&ecopro), Some(AssetClass::Equity));
        let kodex = directory.resolve("KODEX 200").unwrap();
        assert_eq!(directory.asset_class(&kodex), Some(AssetClass::Fund));
    }

    #[tokio::test]
    async fn test_load_merges_etf_listing_last() {
        let fixture = Fixture::new(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
            .with_listing(Market::Kospi, "005930", "SAME")
            .unwrap()
            .with_listing(Market::Etf, "069500", "SAME")
            .unwrap();
        let market = FixtureMarketplace::new(fixture);

        let directory = TickerDirectory::load(&market).await.unwrap();
        assert_eq!(directory.resolve("SAME").unwrap().as_str(), "069500");
    }

    #[tokio::test]
    async fn test_load_propagates_listing_error() {
        let fixture = Fixture::new(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
            .with_listing(Market::Kospi, "005930", "삼성전자")
            .unwrap();
        let market = FlakyListings::new(fixture, 1);

        let err = TickerDirectory::load(&market).await.unwrap_err();
        assert!(err.to_string().contains("listing unavailable"));

        // nothing retried inside the load: the next one succeeds on its own
        let directory = TickerDirectory::load(&market).await.unwrap();
        assert_eq!(directory.len(), 1);
    }
}
