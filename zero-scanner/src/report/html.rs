//! HTML rendering for the daily page.
//!
//! One self-contained page, inline styles, no scripts, so it can be
//! served straight from GitHub Pages or opened from disk.

use chrono::NaiveDate;

use crate::screener::{FunnelReport, PoolStrategy, ReasonCode};
use crate::sector::SectorScan;

const PAGE_STYLE: &str = "\
body{font-family:-apple-system,'PingFang SC','Microsoft YaHei',sans-serif;\
max-width:860px;margin:0 auto;padding:24px;color:#24292f;background:#fafbfc}\
h1{font-size:1.5em;border-bottom:2px solid #d0d7de;padding-bottom:8px}\
h2{font-size:1.15em;margin-top:28px}\
.date{color:#57606a}\
.tag{display:inline-block;background:#eaeef2;border-radius:12px;\
padding:2px 10px;margin:3px 4px 3px 0;font-size:0.92em}\
.tag.new{background:#fff1e5;color:#bc4c00;font-weight:600}\
table{border-collapse:collapse;width:100%;margin-top:8px}\
th,td{border:1px solid #d0d7de;padding:6px 10px;text-align:left;font-size:0.92em}\
th{background:#f6f8fa}\
.empty{color:#57606a;font-style:italic}\
footer{margin-top:36px;color:#8c959f;font-size:0.85em}";

// ============================================================================
// Page Rendering
// ============================================================================

/// Render the full daily page. `archive_prefix` is prepended to history
/// links so the same content works from the index and from inside the
/// archive directory.
pub fn render_page(
    date: NaiveDate,
    sectors: &SectorScan,
    funnel: &FunnelReport,
    history: &[NaiveDate],
    archive_prefix: &str,
) -> String {
    let mut page = String::with_capacity(8 * 1024);

    page.push_str("<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n");
    page.push_str("<meta charset=\"utf-8\">\n");
    page.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    page.push_str(&format!("<title>每日复盘 {}</title>\n", date));
    page.push_str(&format!("<style>{}</style>\n", PAGE_STYLE));
    page.push_str("</head>\n<body>\n");

    page.push_str("<h1>每日复盘报告</h1>\n");
    page.push_str(&format!("<p class=\"date\">{}</p>\n", date.format("%Y-%m-%d")));

    render_new_sectors(&mut page, sectors);
    render_top_sectors(&mut page, sectors);
    render_picks(&mut page, funnel);
    render_funnel(&mut page, funnel);
    render_history(&mut page, history, archive_prefix);

    page.push_str(&format!(
        "<footer>Zero Scanner · {}</footer>\n",
        date.format("%Y-%m-%d")
    ));
    page.push_str("</body>\n</html>\n");
    page
}

fn render_new_sectors(page: &mut String, sectors: &SectorScan) {
    page.push_str("<h2>🔥 概念新风口</h2>\n");

    let new: Vec<&str> = sectors
        .top
        .iter()
        .filter(|s| s.is_new)
        .map(|s| s.name.as_str())
        .collect();
    if new.is_empty() {
        page.push_str("<p class=\"empty\">今日无新增概念，市场延续旧热点</p>\n");
        return;
    }

    page.push_str("<p>");
    for name in new {
        page.push_str(&format!("<span class=\"tag new\">{}</span>", escape(name)));
    }
    page.push_str("</p>\n");
}

fn render_top_sectors(page: &mut String, sectors: &SectorScan) {
    page.push_str("<h2>📊 今日涨幅榜</h2>\n");

    if sectors.top.is_empty() {
        page.push_str("<p class=\"empty\">板块数据暂缺</p>\n");
        return;
    }

    page.push_str("<p>");
    for sector in &sectors.top {
        let class = if sector.is_new { "tag new" } else { "tag" };
        page.push_str(&format!(
            "<span class=\"{}\">{} {:+.2}%</span>",
            class,
            escape(&sector.name),
            sector.pct_change
        ));
    }
    page.push_str("</p>\n");
}

fn render_picks(page: &mut String, funnel: &FunnelReport) {
    page.push_str("<h2>🎯 主力潜伏严选</h2>\n");

    if funnel.picks.is_empty() {
        page.push_str("<p class=\"empty\">今日无符合条件个股</p>\n");
        return;
    }

    let extra_header = match funnel.strategy {
        PoolStrategy::MarketWide => "DDE占比",
        PoolStrategy::SectorDerived => "所属板块",
    };
    page.push_str(&format!(
        "<table>\n<tr><th>股票</th><th>现价</th><th>3日涨幅</th><th>量比</th><th>{}</th><th>总市值(亿)</th></tr>\n",
        extra_header
    ));

    for pick in &funnel.picks {
        let extra = match funnel.strategy {
            PoolStrategy::MarketWide => pick
                .flow_intensity
                .map(|v| format!("{:.2}%", v))
                .unwrap_or_else(|| "-".to_string()),
            PoolStrategy::SectorDerived => pick
                .sector
                .as_deref()
                .map(escape)
                .unwrap_or_else(|| "-".to_string()),
        };
        page.push_str(&format!(
            "<tr><td>{} ({})</td><td>{:.2}</td><td>{:+.2}%</td><td>{:.2}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&pick.name),
            pick.symbol,
            pick.latest,
            pick.cum_rise_pct,
            pick.volume_ratio,
            extra,
            fmt_cap(pick.total_cap)
        ));
    }
    page.push_str("</table>\n");
}

fn render_funnel(page: &mut String, funnel: &FunnelReport) {
    page.push_str("<h2>📉 筛选漏斗</h2>\n");
    page.push_str("<table>\n<tr><th>阶段</th><th>数量</th></tr>\n");
    page.push_str(&format!(
        "<tr><td>候选总数</td><td>{}</td></tr>\n",
        funnel.total
    ));
    page.push_str(&format!(
        "<tr><td>{}</td><td>{}</td></tr>\n",
        ReasonCode::Accepted,
        funnel.picks.len()
    ));

    for (reason, count) in &funnel.rejections {
        if *count == 0 {
            continue;
        }
        page.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>\n", reason, count));
    }
    page.push_str("</table>\n");
}

fn render_history(page: &mut String, history: &[NaiveDate], archive_prefix: &str) {
    page.push_str("<h2>📅 历史回顾</h2>\n");

    if history.is_empty() {
        page.push_str("<p class=\"empty\">暂无历史报告</p>\n");
        return;
    }

    page.push_str("<ul>\n");
    for date in history {
        let stamp = date.format("%Y-%m-%d");
        page.push_str(&format!(
            "<li><a href=\"{}{}.html\">{}</a></li>\n",
            archive_prefix, stamp, stamp
        ));
    }
    page.push_str("</ul>\n");
}

// ============================================================================
// Formatting Helpers
// ============================================================================

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Market cap in 亿, or a dash when unknown.
fn fmt_cap(cap: Option<f64>) -> String {
    match cap {
        Some(v) => format!("{:.1}", v / 1e8),
        None => "-".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::Pick;
    use crate::sector::RankedSector;

    fn scan_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn sector(name: &str, pct: f64, is_new: bool, rank: usize) -> RankedSector {
        RankedSector {
            code: format!("BK{:04}", rank),
            name: name.to_string(),
            pct_change: pct,
            rank,
            is_new,
        }
    }

    fn pick(symbol: &str, name: &str) -> Pick {
        Pick {
            symbol: symbol.to_string(),
            name: name.to_string(),
            latest: 10.9,
            cum_rise_pct: 9.0,
            volume_ratio: 1.8,
            flow_intensity: Some(1.25),
            total_cap: Some(3.2e9),
            sector: Some("人工智能".to_string()),
        }
    }

    #[test]
    fn test_new_sectors_rendered_as_tags() {
        let sectors = SectorScan {
            date: scan_date(),
            top: vec![sector("新风口", 5.0, true, 1), sector("老热点", 4.0, false, 2)],
        };
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("<span class=\"tag new\">新风口</span>"));
        assert!(page.contains("老热点 +4.00%"));
        assert!(!page.contains("今日无新增概念"));
    }

    #[test]
    fn test_no_new_sectors_placeholder() {
        let sectors = SectorScan {
            date: scan_date(),
            top: vec![sector("老热点", 4.0, false, 1)],
        };
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("今日无新增概念，市场延续旧热点"));
    }

    #[test]
    fn test_market_picks_show_flow_column() {
        let sectors = SectorScan {
            date: scan_date(),
            top: Vec::new(),
        };
        let mut funnel = FunnelReport::new(PoolStrategy::MarketWide, 10);
        funnel.picks.push(pick("000001", "平安银行"));

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("<th>DDE占比</th>"));
        assert!(page.contains("平安银行 (000001)"));
        assert!(page.contains("<td>1.25%</td>"));
        assert!(page.contains("<td>32.0</td>"));
    }

    #[test]
    fn test_sector_picks_show_board_column() {
        let sectors = SectorScan {
            date: scan_date(),
            top: Vec::new(),
        };
        let mut funnel = FunnelReport::new(PoolStrategy::SectorDerived, 10);
        funnel.picks.push(pick("000001", "平安银行"));

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("<th>所属板块</th>"));
        assert!(page.contains("<td>人工智能</td>"));
    }

    #[test]
    fn test_empty_picks_placeholder() {
        let sectors = SectorScan {
            date: scan_date(),
            top: Vec::new(),
        };
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 40);

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("今日无符合条件个股"));
    }

    #[test]
    fn test_funnel_section_lists_nonzero_reasons() {
        let sectors = SectorScan {
            date: scan_date(),
            top: Vec::new(),
        };
        let mut funnel = FunnelReport::new(PoolStrategy::MarketWide, 40);
        funnel.picks.push(pick("000001", "平安银行"));
        for _ in 0..30 {
            funnel.record_rejection(ReasonCode::NotUptrend);
        }
        for _ in 0..9 {
            funnel.record_rejection(ReasonCode::FlowNonPositive);
        }

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("<tr><td>候选总数</td><td>40</td></tr>"));
        assert!(page.contains("<tr><td>入选</td><td>1</td></tr>"));
        assert!(page.contains("<tr><td>非连续上涨</td><td>30</td></tr>"));
        assert!(page.contains("<tr><td>资金流出</td><td>9</td></tr>"));
        assert!(!page.contains("放量异常"));
    }

    #[test]
    fn test_history_links_use_prefix() {
        let sectors = SectorScan {
            date: scan_date(),
            top: Vec::new(),
        };
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);
        let history = vec![
            NaiveDate::from_ymd_opt(2025, 6, 13).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
        ];

        let page = render_page(scan_date(), &sectors, &funnel, &history, "archive/");
        assert!(page.contains("<a href=\"archive/2025-06-13.html\">2025-06-13</a>"));
        assert!(page.contains("<a href=\"archive/2025-06-12.html\">2025-06-12</a>"));
    }

    #[test]
    fn test_names_are_escaped() {
        let sectors = SectorScan {
            date: scan_date(),
            top: vec![sector("AI<基建>", 5.0, true, 1)],
        };
        let funnel = FunnelReport::new(PoolStrategy::MarketWide, 0);

        let page = render_page(scan_date(), &sectors, &funnel, &[], "");
        assert!(page.contains("AI&lt;基建&gt;"));
        assert!(!page.contains("AI<基建>"));
    }
}
