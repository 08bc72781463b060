//! Telegram digest delivery.
//!
//! A short push summary of the day's scan. Delivery is strictly best
//! effort: an unconfigured bot means a silent skip and a failed send is
//! logged and forgotten, so messaging can never take down a scan whose
//! report is already on disk.

use anyhow::Result;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::screener::FunnelReport;
use crate::sector::SectorScan;

/// Telegram rejects messages over 4096 chars; stay under with margin.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Picks listed in the digest before folding into a count.
const DIGEST_PICKS: usize = 3;

// ============================================================================
// Notifier
// ============================================================================

/// Telegram bot client for the daily digest.
pub struct Notifier {
    bot_token: String,
    chat_ids: Vec<String>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            bot_token: config.bot_token,
            chat_ids: config.chat_ids,
            client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_ids.is_empty()
    }

    /// Send `digest` to every configured chat. Never fails the caller.
    pub async fn send_digest(&self, digest: &str) {
        if !self.is_enabled() {
            info!("Telegram not configured, skipping digest");
            return;
        }

        let text = truncate_message(digest, MAX_MESSAGE_CHARS);
        for chat_id in &self.chat_ids {
            match self.send_to_chat(chat_id, &text).await {
                Ok(()) => info!(chat_id = chat_id.as_str(), "Telegram digest sent"),
                Err(e) => {
                    warn!(chat_id = chat_id.as_str(), error = %e, "Telegram digest failed")
                }
            }
        }
    }

    async fn send_to_chat(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = self.api_url("sendMessage");
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {}: {}", status, detail);
        }
        Ok(())
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }
}

// ============================================================================
// Digest Text
// ============================================================================

/// Build the digest message for one scan.
pub fn digest_text(
    date: NaiveDate,
    sectors: &SectorScan,
    funnel: &FunnelReport,
    page_url: Option<&str>,
) -> String {
    let mut text = format!("📈 *每日复盘 {}*\n", date.format("%Y-%m-%d"));

    let new: Vec<&str> = sectors
        .top
        .iter()
        .filter(|s| s.is_new)
        .map(|s| s.name.as_str())
        .collect();
    if new.is_empty() {
        text.push_str("\n今日无新增概念，市场延续旧热点\n");
    } else {
        text.push_str(&format!("\n🔥 *概念新风口*: {}\n", new.join("、")));
    }

    if funnel.picks.is_empty() {
        text.push_str("\n今日无符合条件个股\n");
    } else {
        text.push_str(&format!(
            "\n🎯 *主力潜伏严选* (共 {} 只)\n",
            funnel.picks.len()
        ));
        for pick in funnel.picks.iter().take(DIGEST_PICKS) {
            text.push_str(&format!(
                "· {} ({}) 3日涨幅 {:+.2}%\n",
                pick.name, pick.symbol, pick.cum_rise_pct
            ));
        }
        if funnel.picks.len() > DIGEST_PICKS {
            text.push_str(&format!(
                "另有 {} 只详见页面\n",
                funnel.picks.len() - DIGEST_PICKS
            ));
        }
    }

    if let Some(url) = page_url {
        text.push_str(&format!("\n[查看完整报告]({})\n", url));
    }

    text
}

/// Truncate to `max_chars` characters, marking the cut.
fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let suffix = "\n...(内容过长已截断)";
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::{Pick, PoolStrategy};

    fn scan_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn empty_scan() -> SectorScan {
        SectorScan {
            date: scan_date(),
            top: Vec::new(),
        }
    }

    fn pick(symbol: &str, name: &str) -> Pick {
        Pick {
            symbol: symbol.to_string(),
            name: name.to_string(),
            latest: 10.9,
            cum_rise_pct: 9.0,
            volume_ratio: 1.8,
            flow_intensity: None,
            total_cap: None,
            sector: None,
        }
    }

    #[test]
    fn test_is_enabled_requires_token_and_chats() {
        let both = Notifier::new(TelegramConfig {
            bot_token: "token".to_string(),
            chat_ids: vec!["123".to_string()],
        });
        assert!(both.is_enabled());

        let no_token = Notifier::new(TelegramConfig {
            bot_token: String::new(),
            chat_ids: vec!["123".to_string()],
        });
        assert!(!no_token.is_enabled());

        let no_chats = Notifier::new(TelegramConfig {
            bot_token: "token".to_string(),
            chat_ids: Vec::new(),
        });
        assert!(!no_chats.is_enabled());
    }

    #[tokio::test]
    async fn test_unconfigured_digest_is_noop() {
        let notifier = Notifier::new(TelegramConfig::default());
        notifier.send_digest("hello").await;
    }

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate_message("短消息", 100), "短消息");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let long: String = "涨".repeat(50);
        let out = truncate_message(&long, 20);

        assert!(out.chars().count() <= 20);
        assert!(out.ends_with("...(内容过长已截断)"));
        assert!(out.starts_with('涨'));
    }

    #[test]
    fn test_digest_lists_new_sectors_and_top_picks() {
        let sectors = SectorScan {
            date: scan_date(),
            top: vec![crate::sector::RankedSector {
                code: "BK0001".to_string(),
                name: "新风口".to_string(),
                pct_change: 5.0,
                rank: 1,
                is_new: true,
            }],
        };
        let mut funnel = FunnelReport::new(PoolStrategy::MarketWide, 10);
        for i in 0..5 {
            funnel.picks.push(pick(&format!("00000{}", i), &format!("股{}", i)));
        }

        let text = digest_text(scan_date(), &sectors, &funnel, Some("https://x.y/z.html"));
        assert!(text.contains("🔥 *概念新风口*: 新风口"));
        assert!(text.contains("共 5 只"));
        assert!(text.contains("· 股0 (000000) 3日涨幅 +9.00%"));
        assert!(text.contains("· 股2 (000002)"));
        assert!(!text.contains("· 股3"));
        assert!(text.contains("另有 2 只详见页面"));
        assert!(text.contains("[查看完整报告](https://x.y/z.html)"));
    }

    #[test]
    fn test_digest_placeholders_when_empty() {
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);
        let text = digest_text(scan_date(), &empty_scan(), &funnel, None);

        assert!(text.contains("每日复盘 2025-06-16"));
        assert!(text.contains("今日无新增概念"));
        assert!(text.contains("今日无符合条件个股"));
        assert!(!text.contains("查看完整报告"));
    }
}
