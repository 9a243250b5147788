//! Response post-processing per enrichment kind.
//!
//! Models routinely wrap refusals and meta-commentary in polite prose; the
//! parsers here decide what is worth writing into a cell. Three outcomes
//! exist: a value to save, "no usable result" (not an error — the cell
//! stays empty), and a row-level error for responses that should have
//! carried a value but could not be normalized.

use regex::Regex;

/// Result of parsing a raw completion response.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// A normalized value ready to write into the target cell.
    Value(String),
    /// The response carried nothing worth saving; the cell stays empty.
    NoResult,
}

/// How a step interprets raw responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParser {
    /// Trimmed verbatim text.
    Verbatim,
    /// "Condition: …, Price: …, URL: …" listing blocks with refusal
    /// filtering.
    Listings,
    /// A single numeric USD amount, normalized to two decimals.
    Price,
    /// Listing text from which the first price is extracted.
    ListingPrice,
}

impl ResponseParser {
    /// Parse a raw response. `Err` carries a row-level error message.
    pub fn parse(&self, raw: &str) -> Result<Parsed, String> {
        match self {
            Self::Verbatim => Ok(parse_verbatim(raw)),
            Self::Listings => Ok(parse_listings(raw)),
            Self::Price => parse_price(raw),
            Self::ListingPrice => Ok(parse_listing_price(raw)),
        }
    }
}

/// Sentinel accepted as a valid negative result for listing searches.
const NO_COMPARABLES_SENTINEL: &str = "no comparables found";

fn parse_verbatim(raw: &str) -> Parsed {
    let text = raw.trim();
    if text.is_empty() {
        Parsed::NoResult
    } else {
        Parsed::Value(text.to_string())
    }
}

/// Validate a comparable-listings response.
///
/// Accepted: text in the expected `Condition/Price/URL` shape, the literal
/// "no comparables found" sentinel, or any response carrying digits.
/// Discarded: empty responses and digit-free explanatory prose (refusals,
/// search commentary).
fn parse_listings(raw: &str) -> Parsed {
    let text = raw.trim();
    if text.is_empty() {
        return Parsed::NoResult;
    }

    let lower = text.to_lowercase();
    if lower.contains(NO_COMPARABLES_SENTINEL) {
        return Parsed::Value(text.to_string());
    }

    let shaped =
        lower.contains("condition:") && lower.contains("price:") && lower.contains("url:");
    if shaped {
        return Parsed::Value(text.to_string());
    }

    if !text.chars().any(|c| c.is_ascii_digit()) {
        // Explanatory phrases with no digits: meta-commentary, not data.
        return Parsed::NoResult;
    }

    Parsed::Value(text.to_string())
}

/// Normalize a bare price response to `XXXXXX.XX`.
fn parse_price(raw: &str) -> Result<Parsed, String> {
    let text = raw.trim();
    if text.is_empty() || matches!(text.to_uppercase().as_str(), "NONE" | "N/A" | "NA") {
        return Ok(Parsed::NoResult);
    }

    match normalize_price(text) {
        Some(value) if value > 0.0 => Ok(Parsed::Value(format_price(value))),
        _ => Err(format!(
            "could not extract a valid price from response: \"{text}\""
        )),
    }
}

/// Scan listing text for the first recognizable price.
fn parse_listing_price(raw: &str) -> Parsed {
    let text = raw.trim();
    if text.is_empty() {
        return Parsed::NoResult;
    }

    let patterns = [
        r"\$[\d,]+\.?\d*",
        r"USD\s*[\d,]+\.?\d*",
        r"[\d,]+\.?\d*\s*USD",
        r"Price:\s*\$?[\d,]+\.?\d*",
    ];

    for pattern in patterns {
        let re = Regex::new(&format!("(?i){pattern}")).expect("static regex");
        if let Some(m) = re.find(text) {
            let digits: String = m
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(value) = digits.parse::<f64>() {
                if value > 0.0 {
                    return Parsed::Value(format_price(value));
                }
            }
        }
    }

    Parsed::NoResult
}

/// Extract a numeric price from free-form text: strip currency symbols and
/// thousands separators, then take the first decimal number.
pub fn normalize_price(raw: &str) -> Option<f64> {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₹' | ',' | ' '))
        .collect();

    let re = Regex::new(r"(\d+\.?\d*)").expect("static regex");
    re.find(&stripped)?.as_str().parse::<f64>().ok()
}

/// Format an accepted price to exactly two decimal places.
pub fn format_price(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_trims_and_rejects_empty() {
        assert_eq!(
            parse_verbatim("  The 950M is a wheel loader.  "),
            Parsed::Value("The 950M is a wheel loader.".into())
        );
        assert_eq!(parse_verbatim("   "), Parsed::NoResult);
    }

    #[test]
    fn price_normalization_handles_currency_noise() {
        assert_eq!(normalize_price("$50,000.00 USD"), Some(50_000.0));
        assert_eq!(normalize_price("USD 123456.78"), Some(123_456.78));
        assert_eq!(normalize_price("€ 9 500"), Some(9500.0));
        assert_eq!(normalize_price("Call for Price"), None);
    }

    #[test]
    fn price_parser_formats_two_decimals() {
        assert_eq!(
            parse_price("$50,000.00 USD").unwrap(),
            Parsed::Value("50000.00".into())
        );
        assert_eq!(parse_price("89500").unwrap(), Parsed::Value("89500.00".into()));
    }

    #[test]
    fn price_parser_rejects_unparseable_text() {
        let err = parse_price("Call for Price").expect_err("must be a row error");
        assert!(err.contains("Call for Price"));
    }

    #[test]
    fn price_parser_treats_blank_and_none_as_no_result() {
        assert_eq!(parse_price("").unwrap(), Parsed::NoResult);
        assert_eq!(parse_price("NONE").unwrap(), Parsed::NoResult);
        assert_eq!(parse_price("n/a").unwrap(), Parsed::NoResult);
    }

    #[test]
    fn price_parser_rejects_non_positive() {
        assert!(parse_price("0").is_err());
        assert!(parse_price("0.00").is_err());
    }

    #[test]
    fn listings_accept_expected_shape() {
        let text = "Condition: Used, Price: $85,000, URL: https://example.com/listing/1\n\
                    Condition: New, Price: $120,000, URL: https://example.com/listing/2";
        assert_eq!(parse_listings(text), Parsed::Value(text.into()));
    }

    #[test]
    fn listings_accept_no_comparables_sentinel() {
        assert_eq!(
            parse_listings("No comparables found"),
            Parsed::Value("No comparables found".into())
        );
    }

    #[test]
    fn listings_discard_digit_free_commentary() {
        let refusal = "I was unable to locate any current marketplace listings for this \
                       asset. You may wish to consult a dealer directly.";
        assert_eq!(parse_listings(refusal), Parsed::NoResult);
    }

    #[test]
    fn listings_keep_loosely_structured_results_with_digits() {
        let text = "Found one: used unit at 85000 dollars, see equipmenttrader";
        assert_eq!(parse_listings(text), Parsed::Value(text.into()));
    }

    #[test]
    fn listing_price_extracts_first_price() {
        let text = "Condition: Used, Price: $85,000.50, URL: https://example.com/1\n\
                    Condition: New, Price: $120,000, URL: https://example.com/2";
        assert_eq!(
            parse_listing_price(text),
            Parsed::Value("85000.50".into())
        );
    }

    #[test]
    fn listing_price_handles_usd_suffix() {
        assert_eq!(
            parse_listing_price("one unit at 74500 USD near you"),
            Parsed::Value("74500.00".into())
        );
    }

    #[test]
    fn listing_price_without_price_is_no_result() {
        assert_eq!(
            parse_listing_price("Several listings found but all say Call for Price"),
            Parsed::NoResult
        );
    }
}
