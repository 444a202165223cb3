use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Notifier;
use crate::config::EmailConfig;

pub const EMAIL_SUBJECT: &str = "New vinyl listings";

/// Sends each chunk as one plain-text mail. Markup is stripped from item
/// lines so the body reads as `title — price <url>`.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(cfg: &EmailConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.user.clone(), cfg.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid SMTP_HOST {:?}", cfg.host))?
            .credentials(creds)
            .build();

        let from = cfg.from.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = cfg.to.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }

    fn build(&self, chunk: &str) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(EMAIL_SUBJECT)
            .header(header::ContentType::TEXT_PLAIN)
            .body(plain_text(chunk))
            .context("build email")
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, chunk: &str) -> Result<()> {
        let msg = self.build(chunk)?;
        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

/// `- <a href="u">t</a> — p` → `- t — p <u>`, then entities decoded.
fn plain_text(html: &str) -> String {
    html.lines()
        .map(|line| {
            let rest = line.strip_prefix("- <a href=\"").and_then(|r| {
                let (href, r) = r.split_once("\">")?;
                let (title, tail) = r.split_once("</a>")?;
                Some(format!("- {title}{tail} <{href}>"))
            });
            let line = rest.unwrap_or_else(|| line.to_string());
            html_escape::decode_html_entities(&line).into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EmailConfig {
        EmailConfig {
            host: "smtp.example.com".into(),
            user: "u".into(),
            pass: "p".into(),
            from: "Watcher <watch@example.com>".into(),
            to: "me@example.com".into(),
        }
    }

    #[test]
    fn strips_links_into_plain_lines() {
        let html = "New items:\n🎵 shop:\n- <a href=\"https://s.test/1?a=1&amp;b=2\">Tom &amp; Jerry</a> — £25";
        assert_eq!(
            plain_text(html),
            "New items:\n🎵 shop:\n- Tom & Jerry — £25 <https://s.test/1?a=1&b=2>"
        );
    }

    #[test]
    fn bad_address_is_an_error() {
        let mut c = cfg();
        c.to = "not an address".into();
        assert!(EmailNotifier::new(&c).is_err());
    }

    #[test]
    fn builds_plain_text_message() {
        let n = EmailNotifier::new(&cfg()).unwrap();
        let raw = String::from_utf8(n.build("hello").unwrap().formatted()).unwrap();
        assert!(raw.contains("Subject: New vinyl listings"));
        assert!(raw.contains("text/plain"));
    }
}
