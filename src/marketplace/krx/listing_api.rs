use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::marketplace::krx::utils::format_krx_date;
use crate::marketplace::krx::{ApiCategory, KrxMarketplace};
use crate::marketplace::{ListedTicker, Market};
use crate::ticker::Ticker;

#[derive(Deserialize, Debug, Clone)]
pub struct BaseInfoRow {
    #[serde(rename = "ISU_SRT_CD", default)]
    pub short_code: Option<String>,
    #[serde(rename = "ISU_ABBRV", default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EtfListingRow {
    #[serde(rename = "ISU_CD", default)]
    pub short_code: Option<String>,
    #[serde(rename = "ISU_NM", default)]
    pub name: Option<String>,
}

/// Drops rows without a name or a six digit code (KRX also lists some preferred
/// shares and ETNs under longer codes).
fn into_listed<I>(rows: I) -> Vec<ListedTicker>
where
    I: IntoIterator<Item = (Option<String>, Option<String>)>,
{
    rows.into_iter()
        .filter_map(|(code, name)| {
            let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            let Some(name) = name else {
                debug!(?code, "Skipping listing row without a name");
                return None;
            };
            match Ticker::try_from(code.as_deref().unwrap_or_default().trim()) {
                Ok(ticker) => Some(ListedTicker { ticker, name }),
                Err(err) => {
                    debug!("Skipping listing row {name}: {err}");
                    None
                }
            }
        })
        .collect()
}

impl KrxMarketplace {
    pub async fn get_listed_equities(
        &self,
        market: Market,
        day: NaiveDate,
    ) -> Result<Vec<ListedTicker>> {
        let api_id = match market {
            Market::Kospi => "stk_isu_base_info",
            Market::Kosdaq => "ksq_isu_base_info",
            Market::Etf => anyhow::bail!("{market} is not an equity listing"),
        };
        let params = [("basDd", format_krx_date(day))];
        let rows: Vec<BaseInfoRow> = self.request(ApiCategory::Stock, api_id, &params).await?;

        let listed = into_listed(rows.into_iter().map(|r| (r.short_code, r.name)));
        info!(%market, count = listed.len(), "Listed equities");
        Ok(listed)
    }

    pub async fn get_listed_etfs(&self, day: NaiveDate) -> Result<Vec<ListedTicker>> {
        let params = [("basDd", format_krx_date(day))];
        let rows: Vec<EtfListingRow> = self
            .request(ApiCategory::Etp, "etf_bydd_trd", &params)
            .await?;

        let listed = into_listed(rows.into_iter().map(|r| (r.short_code, r.name)));
        info!(count = listed.len(), "Listed ETFs");
        Ok(listed)
    }
}
