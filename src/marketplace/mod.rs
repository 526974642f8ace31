use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Seoul;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::ticker::Ticker;

pub mod fixture;
pub mod krx;

/// Current calendar date at the exchange.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&Seoul).date_naive()
}

/// The listings enumerated when the ticker directory is built.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
    Etf,
}

impl Market {
    pub fn asset_class(&self) -> AssetClass {
        match self {
            Market::Kospi | Market::Kosdaq => AssetClass::Equity,
            Market::Etf => AssetClass::Fund,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Fund,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListedTicker {
    pub ticker: Ticker,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    /// Percentage change reported by the exchange, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_rate: Option<Decimal>,
}

/// Read access to a KRX market-data source.
///
/// Futures are `Send` so implementations can be shared by axum handlers.
pub trait MarketDataApi: Send + Sync {
    /// Calendar date the source considers today.
    fn today(&self) -> NaiveDate {
        market_today()
    }

    /// Issues listed on `market` as of the business day `day`.
    fn list_tickers(
        &self,
        market: Market,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ListedTicker>>> + Send;

    /// Daily bars for `ticker` between `from` and `to` inclusive, oldest first.
    fn daily_bars(
        &self,
        ticker: &Ticker,
        asset_class: AssetClass,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DailyBar>>> + Send;

    /// Most recent trading day on or before today.
    fn nearest_business_day(&self) -> impl Future<Output = Result<NaiveDate>> + Send;

    /// Market capitalization in won for every listed equity on `date`.
    fn market_caps(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<HashMap<Ticker, i64>>> + Send;
}
