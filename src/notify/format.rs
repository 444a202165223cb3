// src/notify/format.rs
//! Human-readable notification text (Telegram HTML subset).
//!
//! ```text
//! New items:
//! 🎵 korobkavinyla.ru:
//! - <a href="https://…/1">Kino — Gruppa krovi</a> — 3 990 руб.
//! 🏠 Avito:
//! - <a href="https://…/2">Poets of the Fall LP</a> — 5 000 ₽ (search: poets of the fall)
//! ```

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::SourceConfig;
use crate::types::CandidateItem;

pub const MESSAGE_HEADER: &str = "New items:";
pub const UNTITLED: &str = "(untitled)";
const DEFAULT_ICON: &str = "🎵";

/// Group items by source (configured order first, then first appearance)
/// and render one line per item.
pub fn build_message(items: &[CandidateItem], sources: &[SourceConfig]) -> String {
    let mut order: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    for it in items {
        if !order.contains(&it.source.as_str()) {
            order.push(it.source.as_str());
        }
    }

    let mut lines = vec![MESSAGE_HEADER.to_string()];
    for name in order {
        let group: Vec<&CandidateItem> = items.iter().filter(|it| it.source == name).collect();
        if group.is_empty() {
            continue;
        }
        let (icon, label) = match sources.iter().find(|s| s.name == name) {
            Some(cfg) => (cfg.icon.as_str(), cfg.display_label()),
            None => (DEFAULT_ICON, name),
        };
        lines.push(format!("{icon} {}:", encode_text(label)));
        lines.extend(group.into_iter().map(format_item));
    }
    lines.join("\n")
}

/// `- <a href="url">title</a> — price (search: query)`
pub fn format_item(it: &CandidateItem) -> String {
    let title = match it.title.trim() {
        "" => UNTITLED,
        t => t,
    };
    let mut line = format!(
        "- <a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(it.link()),
        encode_text(title)
    );
    if let Some(p) = &it.price {
        let prefix = if p.is_discount() { "💰 " } else { "" };
        line.push_str(&format!(" — {prefix}{}", encode_text(&p.raw)));
    }
    if let Some(q) = it.query.as_deref().filter(|q| !q.trim().is_empty()) {
        line.push_str(&format!(" (search: {})", encode_text(q)));
    }
    line
}

/// Sanity checks on a rendered message; returns human-readable issues.
/// Item lines must carry a link, a non-empty title and a price part, and the
/// price must not repeat a currency marker (a sign of a scraped duplicate).
pub fn lint_message(text: &str) -> Vec<String> {
    let mut issues = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        let Some(content) = line.strip_prefix("- ") else {
            continue;
        };
        let n = n + 1;
        let (Some(open_end), Some(close)) = (content.find("\">"), content.find("</a>")) else {
            issues.push(format!("line {n}: item without link"));
            continue;
        };
        if !content.starts_with("<a href=") || close < open_end + 2 {
            issues.push(format!("line {n}: malformed link"));
            continue;
        }
        let title = content[open_end + 2..close].trim();
        if title.is_empty() || title == UNTITLED {
            issues.push(format!("line {n}: empty title"));
        }
        let tail = &content[close + "</a>".len()..];
        let Some(price) = tail.strip_prefix(" — ") else {
            issues.push(format!("line {n}: item without price"));
            continue;
        };
        let price = price.split(" (search: ").next().unwrap_or(price);
        for marker in ["£", "€", "$", "₽", "руб", "EUR", "GBP", "USD"] {
            if price.matches(marker).count() > 1 {
                issues.push(format!("line {n}: repeated {marker} in price"));
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfgs() -> Vec<SourceConfig> {
        let mut avito = SourceConfig::command("avito.ru", "scrape", &[]);
        avito.label = Some("Avito".into());
        avito.icon = "🏠".into();
        vec![SourceConfig::feed("korobkavinyla.ru", "u"), avito]
    }

    #[test]
    fn groups_by_configured_order() {
        let items = vec![
            CandidateItem::new("https://a.test/2", "Poets LP", "avito.ru")
                .with_price("5 000 ₽")
                .with_query("poets"),
            CandidateItem::new("https://k.test/1", "Kino", "korobkavinyla.ru").with_price("3 990 руб."),
            CandidateItem::new("https://x.test/9", "", "elsewhere"),
        ];
        let msg = build_message(&items, &cfgs());
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[0], "New items:");
        assert_eq!(lines[1], "🎵 korobkavinyla.ru:");
        assert_eq!(lines[2], "- <a href=\"https://k.test/1\">Kino</a> — 3 990 руб.");
        assert_eq!(lines[3], "🏠 Avito:");
        assert_eq!(
            lines[4],
            "- <a href=\"https://a.test/2\">Poets LP</a> — 5 000 ₽ (search: poets)"
        );
        assert_eq!(lines[5], "🎵 elsewhere:");
        assert_eq!(lines[6], "- <a href=\"https://x.test/9\">(untitled)</a>");
    }

    #[test]
    fn escapes_markup_and_marks_discounts() {
        let it = CandidateItem::new("https://p.test/?a=1&b=\"2\"", "<Best> & Co", "p")
            .with_price("2500 → 1990");
        let line = format_item(&it);
        assert!(line.contains("&lt;Best&gt; &amp; Co"));
        assert!(line.contains("a=1&amp;b=&quot;2&quot;"));
        assert!(line.ends_with("— 💰 2500 → 1990"));
    }

    #[test]
    fn lint_flags_bad_lines() {
        let text = "New items:\n- plain text\n- <a href=\"u\">(untitled)</a> — £5\n- <a href=\"u\">X</a> — £25 £25\n- <a href=\"u\">No price</a>\n- <a href=\"u\">Fine</a> — £25 (search: $$)";
        let issues = lint_message(text);
        assert_eq!(issues.len(), 4, "{issues:?}");
        assert!(issues[0].contains("without link"));
        assert!(issues[1].contains("empty title"));
        assert!(issues[2].contains("repeated £"));
        assert!(issues[3].starts_with("line 5: item without price"));
    }
}
