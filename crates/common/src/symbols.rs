/// Index tickers as sent by charting platforms, mapped to the provider's form.
const ALIASES: &[(&str, &str)] = &[
    ("SPX", "^GSPC"),
    ("SPX500", "^GSPC"),
    ("US500", "^GSPC"),
    ("NDX", "^NDX"),
    ("NAS100", "^NDX"),
    ("DJI", "^DJI"),
    ("US30", "^DJI"),
    ("VIX", "^VIX"),
    ("RUT", "^RUT"),
];

/// Normalizes a raw ticker: trims, drops an exchange prefix
/// (`NASDAQ:AAPL`), upper-cases and applies index aliases.
///
/// Must run before any data fetch so the canonical form is what shows up
/// in analysis output and dedup keys.
pub fn canonical_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = match trimmed.rsplit_once(':') {
        Some((_, ticker)) => ticker,
        None => trimmed,
    };
    let upper = bare.trim().to_uppercase();

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_aliases() {
        assert_eq!(canonical_symbol("SPX"), "^GSPC");
        assert_eq!(canonical_symbol("spx"), "^GSPC");
        assert_eq!(canonical_symbol("TVC:VIX"), "^VIX");
    }

    #[test]
    fn test_exchange_prefix_and_case() {
        assert_eq!(canonical_symbol(" nasdaq:aapl "), "AAPL");
        assert_eq!(canonical_symbol("msft"), "MSFT");
        assert_eq!(canonical_symbol("^GSPC"), "^GSPC");
    }
}
