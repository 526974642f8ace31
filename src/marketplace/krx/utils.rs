use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Parses a KRX numeric string such as `"1,234.5"` or `"-0.35"`. Empty and `-` mean missing.
pub fn parse_decimal_opt(value: &Option<String>) -> Option<Decimal> {
    value.as_ref().and_then(|v| {
        let cleaned = v.trim().replace(',', "").replace('%', "");
        if cleaned.is_empty() || cleaned == "-" {
            return None;
        }
        cleaned.parse().ok()
    })
}

pub fn parse_i64_opt(value: &Option<String>) -> Option<i64> {
    value
        .as_ref()
        .and_then(|v| v.trim().replace(',', "").parse().ok())
}

/// KRX sends `YYYYMMDD` on daily snapshots and `YYYY/MM/DD` on per-issue series.
pub fn parse_krx_date(value: &str) -> Option<NaiveDate> {
    if value.contains('/') {
        NaiveDate::parse_from_str(value, "%Y/%m/%d").ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y%m%d").ok()
    }
}

pub fn format_krx_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
