use itertools::Itertools;

/// 조 (10^12)
pub const ONE_JO: i64 = 1_000_000_000_000;
/// 억 (10^8)
pub const ONE_EOK: i64 = 100_000_000;

pub const NOT_AVAILABLE: &str = "N/A";

/// Groups the digits of a non-negative integer by thousands: `2300` -> `2,300`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .join(",");
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Formats a market capitalization in won using 조/억 units.
///
/// Missing, zero and negative amounts are reported as `N/A`. Components are
/// truncated, never rounded: `1_230_000_000_000` becomes `1조 2,300억원`.
pub fn format_market_cap(cap_in_won: Option<i64>) -> String {
    let cap = match cap_in_won {
        Some(cap) if cap > 0 => cap,
        _ => return NOT_AVAILABLE.to_string(),
    };

    if cap >= ONE_JO {
        let jo = cap / ONE_JO;
        let eok = (cap % ONE_JO) / ONE_EOK;
        if eok > 0 {
            format!("{}조 {}억원", group_thousands(jo), group_thousands(eok))
        } else {
            format!("{}조원", group_thousands(jo))
        }
    } else {
        format!("{}억원", group_thousands(cap / ONE_EOK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(2300), "2,300");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-1_000), "-1,000");
    }

    #[test]
    fn test_not_available() {
        assert_eq!(format_market_cap(None), "N/A");
        assert_eq!(format_market_cap(Some(0)), "N/A");
        assert_eq!(format_market_cap(Some(-5)), "N/A");
    }

    #[test]
    fn test_eok_only() {
        assert_eq!(format_market_cap(Some(100_000_000)), "1억원");
        assert_eq!(format_market_cap(Some(5)), "0억원");
        assert_eq!(format_market_cap(Some(123_456_789_012)), "1,234억원");
        assert_eq!(format_market_cap(Some(ONE_JO - 1)), "9,999억원");
    }

    #[test]
    fn test_jo_and_eok() {
        assert_eq!(format_market_cap(Some(1_000_000_000_000)), "1조원");
        assert_eq!(format_market_cap(Some(1_230_000_000_000)), "1조 2,300억원");
        // remainder below one 억 is dropped
        assert_eq!(format_market_cap(Some(2_000_050_000_000)), "2조원");
        assert_eq!(format_market_cap(Some(2_000_150_000_000)), "2조 1억원");
        assert_eq!(
            format_market_cap(Some(1_234_500_000_000_000)),
            "1,234조 5,000억원"
        );
    }
}
