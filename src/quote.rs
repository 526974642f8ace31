//! Quote and detail lookups: resolve a term, fetch bars from the market source and
//! shape the response bodies.

use anyhow::anyhow;
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::TickerDirectory;
use crate::error::ApiError;
use crate::format::format_market_cap;
use crate::marketplace::{AssetClass, DailyBar, MarketDataApi};
use crate::ticker::Ticker;

pub const DEFAULT_DAYS: usize = 60;
pub const MIN_DAYS: usize = 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quote {
    pub ticker: Ticker,
    pub name: String,
    pub price: i64,
    pub change: i64,
    pub rate: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChartData {
    pub dates: Vec<String>,
    pub prices: Vec<i64>,
    pub volumes: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detail {
    pub ticker: Ticker,
    pub name: String,
    pub current_price: i64,
    pub market_cap: String,
    pub chart_data: ChartData,
}

/// Parses the `days` query value. Missing or unparsable values use the default,
/// anything below the minimum is raised to it.
pub fn effective_days(raw: Option<&str>) -> usize {
    let days = raw
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| usize::try_from(v).unwrap_or(0))
        .unwrap_or(DEFAULT_DAYS);
    days.max(MIN_DAYS)
}

/// Calendar range fetched for `days` trading rows: `ceil(days * 1.5 + 5)` days back to today.
pub fn chart_window(today: NaiveDate, days: usize) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let lookback = (days as u64)
        .checked_mul(3)
        .map(|v| v.div_ceil(2) + 5)
        .ok_or_else(|| anyhow!("days out of range: {days}"))?;
    let start = today
        .checked_sub_days(Days::new(lookback))
        .ok_or_else(|| anyhow!("days out of range: {days}"))?;
    Ok((start, today))
}

/// Whole won, truncated like the exchange's integer prices.
fn to_won(value: Decimal) -> Result<i64, ApiError> {
    value
        .trunc()
        .to_i64()
        .ok_or_else(|| anyhow!("price out of range: {value}").into())
}

/// Exchange rate when supplied, otherwise derived from open and close.
/// A zero open has no meaningful rate and reports 0.
pub fn change_rate(bar: &DailyBar) -> f64 {
    let rate = match bar.change_rate {
        Some(rate) => rate,
        None if bar.open > Decimal::ZERO => (bar.close / bar.open - dec!(1)) * dec!(100),
        None => Decimal::ZERO,
    };
    rate.to_f64().unwrap_or(0.0)
}

pub fn quote_from_bar(ticker: Ticker, name: String, bar: &DailyBar) -> Result<Quote, ApiError> {
    Ok(Quote {
        ticker,
        name,
        price: to_won(bar.close)?,
        change: to_won(bar.close - bar.open)?,
        rate: change_rate(bar),
    })
}

pub fn chart_data(bars: &[DailyBar]) -> Result<ChartData, ApiError> {
    let mut chart = ChartData::default();
    for bar in bars {
        chart.dates.push(bar.date.format("%Y-%m-%d").to_string());
        chart.prices.push(to_won(bar.close)?);
        chart.volumes.push(bar.volume);
    }
    Ok(chart)
}

fn resolve(directory: &TickerDirectory, term: &str) -> Result<(Ticker, AssetClass), ApiError> {
    let ticker = directory
        .resolve(term)
        .ok_or_else(|| ApiError::not_found(format!("Invalid ticker or name: {term}")))?;
    let asset_class = directory
        .asset_class(&ticker)
        .ok_or_else(|| ApiError::not_found(format!("Ticker not found: {ticker}")))?;
    Ok((ticker, asset_class))
}

fn display_name(directory: &TickerDirectory, ticker: &Ticker) -> String {
    directory
        .name(ticker)
        .map(str::to_string)
        .unwrap_or_else(|| ticker.to_string())
}

/// Latest single-day quote for a name or code.
pub async fn get_quote<M: MarketDataApi>(
    directory: &TickerDirectory,
    market: &M,
    term: &str,
) -> Result<Quote, ApiError> {
    let (ticker, asset_class) = resolve(directory, term)?;
    let day = market.nearest_business_day().await?;
    let bars = market.daily_bars(&ticker, asset_class, day, day).await?;
    let bar = bars
        .first()
        .ok_or_else(|| ApiError::not_found("No data available"))?;
    debug!(%ticker, %day, ?asset_class, "Quote");

    let name = display_name(directory, &ticker);
    quote_from_bar(ticker, name, bar)
}

/// Price history for the trailing `days` trading days plus the market cap.
pub async fn get_detail<M: MarketDataApi>(
    directory: &TickerDirectory,
    market: &M,
    term: &str,
    days: usize,
    today: NaiveDate,
) -> Result<Detail, ApiError> {
    let (ticker, asset_class) = resolve(directory, term)?;
    let (from, to) = chart_window(today, days)?;

    let mut bars = market.daily_bars(&ticker, asset_class, from, to).await?;
    let skip = bars.len().saturating_sub(days);
    bars.drain(..skip);
    if bars.is_empty() {
        return Err(ApiError::not_found("No chart data available"));
    }

    let chart_data = chart_data(&bars)?;
    let current_price = *chart_data
        .prices
        .last()
        .ok_or_else(|| ApiError::not_found("No chart data available"))?;

    let market_cap = match asset_class {
        AssetClass::Equity => {
            let day = market.nearest_business_day().await?;
            let caps = market.market_caps(day).await?;
            caps.get(&ticker).copied()
        }
        AssetClass::Fund => None,
    };
    debug!(%ticker, %from, %to, rows = bars.len(), "Detail");

    Ok(Detail {
        name: display_name(directory, &ticker),
        ticker,
        current_price,
        market_cap: format_market_cap(market_cap),
        chart_data,
    })
}
