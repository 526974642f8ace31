use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Deserialize;
use tracing::{debug, info};

use crate::marketplace::krx::utils::{
    format_krx_date, parse_decimal_opt, parse_i64_opt, parse_krx_date,
};
use crate::marketplace::krx::{ApiCategory, KrxMarketplace};
use crate::marketplace::{DailyBar, Market};
use crate::ticker::Ticker;

/// How far back the nearest business day is searched.
const BUSINESS_DAY_LOOKBACK: u64 = 7;

/// One issue on one day, as returned by the `*_bydd_trd` snapshots.
#[derive(Deserialize, Debug, Clone)]
pub struct DailyTradeRow {
    #[serde(rename = "BAS_DD", default)]
    pub date: Option<String>,
    #[serde(rename = "ISU_CD", default)]
    pub short_code: Option<String>,
    #[serde(rename = "TDD_CLSPRC", default)]
    pub close: Option<String>,
    #[serde(rename = "MKTCAP", default)]
    pub market_cap: Option<String>,
}

/// One day of a single issue's series.
#[derive(Deserialize, Debug, Clone)]
pub struct OhlcvRow {
    #[serde(rename = "TRD_DD")]
    pub date: String,
    #[serde(rename = "TDD_OPNPRC", default)]
    pub open: Option<String>,
    #[serde(rename = "TDD_HGPRC", default)]
    pub high: Option<String>,
    #[serde(rename = "TDD_LWPRC", default)]
    pub low: Option<String>,
    #[serde(rename = "TDD_CLSPRC", default)]
    pub close: Option<String>,
    #[serde(rename = "ACC_TRDVOL", default)]
    pub volume: Option<String>,
    #[serde(rename = "FLUC_RT", default)]
    pub change_rate: Option<String>,
}

impl TryFrom<OhlcvRow> for DailyBar {
    type Error = anyhow::Error;

    fn try_from(row: OhlcvRow) -> Result<Self, Self::Error> {
        let date =
            parse_krx_date(&row.date).ok_or_else(|| anyhow!("Invalid trade date {}", row.date))?;
        let close = parse_decimal_opt(&row.close).ok_or(anyhow!("Missing close price"))?;
        Ok(DailyBar {
            date,
            open: parse_decimal_opt(&row.open).unwrap_or_default(),
            high: parse_decimal_opt(&row.high).unwrap_or_default(),
            low: parse_decimal_opt(&row.low).unwrap_or_default(),
            close,
            volume: parse_i64_opt(&row.volume).unwrap_or(0),
            change_rate: parse_decimal_opt(&row.change_rate),
        })
    }
}

/// Weekdays from `today` back through the lookback window, most recent first.
pub fn business_day_candidates(today: NaiveDate) -> Vec<NaiveDate> {
    (0..BUSINESS_DAY_LOOKBACK)
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn rows_into_bars(rows: Vec<OhlcvRow>) -> Vec<DailyBar> {
    rows.into_iter()
        .flat_map(|row| match DailyBar::try_from(row) {
            Ok(bar) => Some(bar),
            Err(err) => {
                debug!("Skipping ohlcv row: {err}");
                None
            }
        })
        .collect()
}

impl KrxMarketplace {
    /// Walks the KOSPI daily snapshot backwards from `today`; holidays come back empty.
    pub async fn get_nearest_business_day(&self, today: NaiveDate) -> Result<NaiveDate> {
        for day in business_day_candidates(today) {
            let rows = self.get_daily_trades(Market::Kospi, day).await?;
            if !rows.is_empty() {
                debug!(%day, "Nearest business day");
                return Ok(day);
            }
        }
        Err(anyhow!("No business day found in the week up to {today}"))
    }

    pub async fn get_daily_trades(
        &self,
        market: Market,
        day: NaiveDate,
    ) -> Result<Vec<DailyTradeRow>> {
        let (category, api_id) = match market {
            Market::Kospi => (ApiCategory::Stock, "stk_bydd_trd"),
            Market::Kosdaq => (ApiCategory::Stock, "ksq_bydd_trd"),
            Market::Etf => (ApiCategory::Etp, "etf_bydd_trd"),
        };
        let params = [("basDd", format_krx_date(day))];
        self.request(category, api_id, &params).await
    }

    pub async fn get_market_caps(
        &self,
        market: Market,
        day: NaiveDate,
    ) -> Result<HashMap<Ticker, i64>> {
        let rows = self.get_daily_trades(market, day).await?;
        let caps: HashMap<Ticker, i64> = rows
            .into_iter()
            .filter_map(|row| {
                let ticker = Ticker::try_from(row.short_code?.trim()).ok()?;
                let cap = parse_i64_opt(&row.market_cap)?;
                Some((ticker, cap))
            })
            .collect();
        info!(%market, %day, count = caps.len(), "Market caps");
        Ok(caps)
    }

    pub async fn get_equity_bars(
        &self,
        ticker: &Ticker,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        self.get_issue_bars(ApiCategory::Stock, "stk_isu_ohlcv", ticker, from, to)
            .await
    }

    pub async fn get_etf_bars(
        &self,
        ticker: &Ticker,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        self.get_issue_bars(ApiCategory::Etp, "etf_isu_ohlcv", ticker, from, to)
            .await
    }

    async fn get_issue_bars(
        &self,
        category: ApiCategory,
        api_id: &str,
        ticker: &Ticker,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let params = [
            ("isuCd", ticker.to_string()),
            ("strtDd", format_krx_date(from)),
            ("endDd", format_krx_date(to)),
        ];
        let rows: Vec<OhlcvRow> = self.request(category, api_id, &params).await?;
        let bars = rows_into_bars(rows);
        debug!(%ticker, count = bars.len(), "Daily bars");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::marketplace::krx::OutBlock;

    #[test]
    fn test_ohlcv_row_into_bar() {
        let json = json!({
            "OutBlock_1": [
                {
                    "TRD_DD": "2024/03/08",
                    "TDD_OPNPRC": "73,000",
                    "TDD_HGPRC": "74,100",
                    "TDD_LWPRC": "72,800",
                    "TDD_CLSPRC": "73,600",
                    "ACC_TRDVOL": "13,245,001",
                    "FLUC_RT": "1.10"
                },
                {
                    "TRD_DD": "2024/03/07",
                    "TDD_CLSPRC": "72,800",
                    "FLUC_RT": "-"
                },
                {
                    "TRD_DD": "garbage",
                    "TDD_CLSPRC": "1"
                }
            ]
        });
        let block: OutBlock<OhlcvRow> = serde_json::from_value(json).unwrap();
        let bars = rows_into_bars(block.rows);
        assert_eq!(bars.len(), 2);

        let bar = &bars[0];
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(bar.open, dec!(73000));
        assert_eq!(bar.close, dec!(73600));
        assert_eq!(bar.volume, 13_245_001);
        assert_eq!(bar.change_rate, Some(dec!(1.10)));

        assert_eq!(bars[1].open, dec!(0));
        assert_eq!(bars[1].change_rate, None);
    }

    #[test]
    fn test_daily_trade_row() {
        let json = json!({
            "OutBlock_1": [
                {"BAS_DD": "20240308", "ISU_CD": "005930", "ISU_NM": "삼성전자", "TDD_CLSPRC": "73600", "MKTCAP": "439379536240000"}
            ]
        });
        let block: OutBlock<DailyTradeRow> = serde_json::from_value(json).unwrap();
        assert_eq!(block.rows[0].short_code.as_deref(), Some("005930"));
        assert_eq!(
            parse_i64_opt(&block.rows[0].market_cap),
            Some(439_379_536_240_000)
        );
    }

    #[test]
    fn test_daily_trade_row_without_code() {
        let json = json!({
            "OutBlock_1": [
                {"BAS_DD": "20240308", "ISU_NM": "합계", "MKTCAP": "2,000,000,000,000"}
            ]
        });
        let block: OutBlock<DailyTradeRow> = serde_json::from_value(json).unwrap();
        assert_eq!(block.rows[0].short_code, None);
    }

    #[test]
    fn test_business_day_candidates_skip_weekends() {
        // 2024-03-11 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let days = business_day_candidates(monday);
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], monday);
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());

        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let days = business_day_candidates(sunday);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert!(days
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    }
}
