//! Best-effort readable-text extraction from raw HTML.
//!
//! Not a full readability engine: a deterministic main-block picker with a
//! whole-document fallback. Callers apply their own length gates.

use std::io::Cursor;

/// Case-insensitive markers that flag a page (or its extracted text) as
/// advertisement/sponsored content. Matched as plain substrings.
pub const AD_MARKERS: &[&str] = &["advertisement", "sponsored", "promoted", "广告", "推广"];

/// Minimum raw extracted length before filtering.
pub const MIN_EXTRACT_CHARS: usize = 50;

/// Minimum filtered length before extracted text is accepted.
pub const MIN_CONTENT_CHARS: usize = 100;

/// True when `text` contains any ad/sponsorship marker, case-insensitively.
pub fn contains_ad_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    AD_MARKERS.iter().any(|m| lower.contains(m))
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    // Structural UI words only; no site-specific heuristics.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    for bad in [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ] {
        if s.contains(bad) {
            return true;
        }
    }
    false
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let Ok(sel) = html_scraper::Selector::parse("a") else {
        return 0;
    };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

fn pick_main_block(html: &str, max_elems: usize) -> Option<String> {
    let max_elems = max_elems.clamp(50, 50_000);
    let doc = html_scraper::Html::parse_document(html);

    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;
    let mut seen = 0usize;
    let mut best_score: i64 = 0;
    let mut best_text: Option<String> = None;

    for el in doc.select(&sel) {
        seen += 1;
        if seen > max_elems {
            break;
        }
        if is_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        // Dense non-link text wins; link text is usually navigation.
        let mut score = txt as i64 - 2 * (link_txt as i64);
        let tag = el.value().name();
        if tag == "article" {
            score += 500;
        } else if tag == "main" {
            score += 300;
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            let t = el.text().collect::<Vec<_>>().join(" ");
            best_text = Some(norm_ws(&t));
        }
    }

    best_text
}

/// Extract the main readable text from an HTML document.
///
/// Prefers the highest-scoring content block; falls back to a full-document
/// text rendering when no block qualifies. Returns `None` only for documents
/// with no visible text at all.
pub fn main_text(html: &str) -> Option<String> {
    if let Some(t) = pick_main_block(html, 20_000) {
        if has_any_text(&t) {
            return Some(t);
        }
    }
    let rendered = html2text::from_read(Cursor::new(html.as_bytes()), 120)
        .unwrap_or_else(|_| html.to_string());
    let rendered = norm_ws(&rendered);
    has_any_text(&rendered).then_some(rendered)
}
