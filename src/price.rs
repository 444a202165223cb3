// src/price.rs
//! Structured prices for listing items.
//!
//! Storefronts render prices as free text: `"£25.00"`, `"1 990 руб."`,
//! `"€ 25,00 EUR €25,00 EUR"` (old/new price scraped twice), `"2500 → 1990"`.
//! [`Price::parse`] turns that into an optional amount in minor units plus an
//! optional currency while keeping the raw text for display.
//!
//! When no single amount can be recovered, [`normalize_price_text`] provides
//! the textual fallback used for content dedup keys.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Eur,
    Gbp,
    Usd,
    Rub,
}

impl Currency {
    /// Detect the first currency marker found in `raw` (case-insensitive).
    pub fn detect(raw: &str) -> Option<Self> {
        let s = raw.to_lowercase();
        if s.contains('€') || s.contains("eur") {
            Some(Self::Eur)
        } else if s.contains('£') || s.contains("gbp") {
            Some(Self::Gbp)
        } else if s.contains('₽') || s.contains("руб") || s.contains("rub") {
            Some(Self::Rub)
        } else if s.contains('$') || s.contains("usd") {
            Some(Self::Usd)
        } else {
            None
        }
    }
}

/// Amount in minor units (cents, pence, kopecks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(pub i64);

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: Option<Amount>,
    pub currency: Option<Currency>,
    pub raw: String,
}

impl Price {
    /// Returns `None` for empty/whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = collapse_ws(raw);
        if raw.is_empty() {
            return None;
        }
        let stripped = collapse_ws(&strip_currency_markers(&raw.to_lowercase()));
        Some(Self {
            amount: parse_amount(&stripped),
            currency: Currency::detect(&raw),
            raw,
        })
    }

    /// Price component of the content dedup key. Currency is not part of it.
    pub fn dedup_key(&self) -> String {
        match self.amount {
            Some(a) => a.to_string(),
            None => normalize_price_text(&self.raw),
        }
    }

    /// True for "old → new" discount renderings.
    pub fn is_discount(&self) -> bool {
        self.raw.contains('→')
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Textual fallback: lowercase, drop currency symbols and unit labels,
/// collapse whitespace, and fold a repeated identical number into one.
pub fn normalize_price_text(raw: &str) -> String {
    let out = collapse_ws(&strip_currency_markers(&raw.to_lowercase()));

    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re_num = RE_NUM.get_or_init(|| Regex::new(r"\d+\.?\d*").unwrap());
    let numbers: Vec<&str> = re_num.find_iter(&out).map(|m| m.as_str()).collect();
    if numbers.len() > 1 && numbers.iter().all(|n| *n == numbers[0]) {
        return numbers[0].to_string();
    }
    out
}

fn strip_currency_markers(lower: &str) -> String {
    let mut out = lower.to_string();
    for marker in ["€", "£", "$", "₽", "руб", "eur", "gbp", "usd"] {
        out = out.replace(marker, "");
    }
    out
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_amount(text: &str) -> Option<Amount> {
    static RE_TOKEN: OnceCell<Regex> = OnceCell::new();
    let re = RE_TOKEN.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());
    let mut tokens: Vec<&str> = re.find_iter(text).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return None;
    }

    // "1 990 1 990" → "1 990"
    while tokens.len() >= 2 && tokens.len() % 2 == 0 {
        let half = tokens.len() / 2;
        if tokens[..half] == tokens[half..] {
            tokens.truncate(half);
        } else {
            break;
        }
    }
    // "25.00 25.00 25.00" → "25.00"
    if tokens.iter().all(|t| *t == tokens[0]) {
        tokens.truncate(1);
    }
    if tokens.len() == 1 {
        return token_to_amount(tokens[0]);
    }

    // Space-separated thousands groups: "1 990", "12 345,50".
    if is_thousands_grouped(&tokens) && text.contains(&tokens.join(" ")) {
        return token_to_amount(&tokens.concat());
    }
    None
}

fn is_thousands_grouped(tokens: &[&str]) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if first.len() > 3 || !all_digits(first) {
        return false;
    }
    rest.iter().enumerate().all(|(i, t)| {
        if i + 1 == rest.len() {
            let int_part = t.split(['.', ',']).next().unwrap_or_default();
            int_part.len() == 3 && all_digits(int_part)
        } else {
            t.len() == 3 && all_digits(t)
        }
    })
}

fn token_to_amount(token: &str) -> Option<Amount> {
    let has_dot = token.contains('.');
    let has_comma = token.contains(',');

    let cleaned: String = if has_dot && has_comma {
        // The rightmost separator is the decimal one.
        let dec = if token.rfind('.') > token.rfind(',') { '.' } else { ',' };
        let thousands = if dec == '.' { ',' } else { '.' };
        token
            .chars()
            .filter(|c| *c != thousands)
            .map(|c| if c == ',' { '.' } else { c })
            .collect()
    } else if has_comma {
        let parts: Vec<&str> = token.split(',').collect();
        if parts.len() == 2 && parts[1].len() != 3 {
            format!("{}.{}", parts[0], parts[1])
        } else {
            parts.concat()
        }
    } else if token.matches('.').count() > 1 {
        token.replace('.', "")
    } else {
        token.to_string()
    };

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if frac_part.len() > 2 {
        return None;
    }
    let units: i64 = int_part.parse().ok()?;
    let frac: i64 = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().ok()? * 10,
        _ => frac_part.parse().ok()?,
    };
    units.checked_mul(100)?.checked_add(frac).map(Amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(raw: &str) -> Option<String> {
        Price::parse(raw).and_then(|p| p.amount).map(|a| a.to_string())
    }

    #[test]
    fn plain_and_symbol_prices() {
        assert_eq!(amount("100").as_deref(), Some("100.00"));
        assert_eq!(amount("£25.00").as_deref(), Some("25.00"));
        assert_eq!(amount("€ 25,5 EUR").as_deref(), Some("25.50"));
        assert_eq!(amount("1 990 руб.").as_deref(), Some("1990.00"));
        assert_eq!(amount("£1,299.99").as_deref(), Some("1299.99"));
    }

    #[test]
    fn duplicated_scrape_artifacts_collapse() {
        assert_eq!(amount("£25.00 £25.00").as_deref(), Some("25.00"));
        assert_eq!(amount("€25,00 EUR €25,00 EUR").as_deref(), Some("25.00"));
        assert_eq!(amount("1 990 ₽ 1 990 ₽").as_deref(), Some("1990.00"));
    }

    #[test]
    fn discount_has_no_single_amount() {
        let p = Price::parse("2500 → 1990 руб").unwrap();
        assert!(p.amount.is_none());
        assert!(p.is_discount());
        assert_eq!(p.dedup_key(), "2500 → 1990");
    }

    #[test]
    fn currency_detection() {
        assert_eq!(Currency::detect("£10"), Some(Currency::Gbp));
        assert_eq!(Currency::detect("10 EUR"), Some(Currency::Eur));
        assert_eq!(Currency::detect("1990 руб."), Some(Currency::Rub));
        assert_eq!(Currency::detect("$3"), Some(Currency::Usd));
        assert_eq!(Currency::detect("100"), None);
    }

    #[test]
    fn legacy_text_normalization() {
        assert_eq!(normalize_price_text("€25.00 EUR €25.00 EUR"), "25.00");
        assert_eq!(normalize_price_text("  £10   GBP "), "10");
        assert_eq!(normalize_price_text("по запросу"), "по запросу");
    }

    #[test]
    fn empty_price_is_none() {
        assert!(Price::parse("   ").is_none());
    }
}
