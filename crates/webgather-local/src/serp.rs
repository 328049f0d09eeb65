//! Search-engine results-page parsing.
//!
//! The engine's markup is third-party and drifts without notice, so all
//! structural assumptions live here: one vendor-specific selector heuristic
//! and one structural heuristic, independently swappable.

use webgather_core::{normalize_link, Candidate, Error, Result};

/// Vendor result-container selector; the browser channel waits for this to
/// materialize before scraping.
pub const RESULT_SELECTOR: &str = "li.b_algo";

/// Strip characters that break query-URL construction or engine markup:
/// control characters and raw markup/quote characters. Whitespace runs
/// collapse to single spaces.
pub fn sanitize_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the engine query URL for a keyword.
pub fn query_url(base: &str, keyword: &str) -> Result<url::Url> {
    let mut u = url::Url::parse(base).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
    u.set_path("/search");
    u.query_pairs_mut()
        .clear()
        .append_pair("q", &sanitize_query(keyword));
    Ok(u)
}

fn element_text(el: &html_scraper::ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Heuristic (a): the vendor result-container class.
///
/// Title and link come from `h2 a[href]`, the summary from the container's
/// first `<p>`. Containers missing a title or link are skipped.
pub fn parse_vendor_results(html: &str, top_k: usize) -> Vec<Candidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let doc = html_scraper::Html::parse_document(html);
    let Ok(result_sel) = html_scraper::Selector::parse(RESULT_SELECTOR) else {
        return Vec::new();
    };
    let Ok(title_sel) = html_scraper::Selector::parse("h2") else {
        return Vec::new();
    };
    let Ok(link_sel) = html_scraper::Selector::parse("a[href]") else {
        return Vec::new();
    };
    let Ok(summary_sel) = html_scraper::Selector::parse("p") else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for container in doc.select(&result_sel) {
        let Some(heading) = container.select(&title_sel).next() else {
            continue;
        };
        let Some(anchor) = heading.select(&link_sel).next() else {
            continue;
        };
        let title = element_text(&heading);
        let Some(link) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let summary = container
            .select(&summary_sel)
            .next()
            .map(|p| element_text(&p))
            .unwrap_or_default();
        out.push(Candidate {
            title,
            link: link.to_string(),
            summary,
        });
        if out.len() >= top_k {
            break;
        }
    }
    out
}

/// Heuristic (b): any container holding both a heading and a link.
///
/// Survives vendor class renames at the cost of more noise; the channel
/// unions it with the vendor heuristic and dedups by link.
pub fn parse_structural_results(html: &str, top_k: usize) -> Vec<Candidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let doc = html_scraper::Html::parse_document(html);
    let Ok(container_sel) = html_scraper::Selector::parse("li, div") else {
        return Vec::new();
    };
    let Ok(heading_sel) = html_scraper::Selector::parse("h1, h2, h3, h4") else {
        return Vec::new();
    };
    let Ok(link_sel) = html_scraper::Selector::parse("a[href]") else {
        return Vec::new();
    };
    let Ok(summary_sel) = html_scraper::Selector::parse("p") else {
        return Vec::new();
    };

    let mut out: Vec<Candidate> = Vec::new();
    for container in doc.select(&container_sel) {
        let Some(heading) = container.select(&heading_sel).next() else {
            continue;
        };
        // Prefer a link inside the heading; fall back to the container's first.
        let anchor = heading
            .select(&link_sel)
            .next()
            .or_else(|| container.select(&link_sel).next());
        let Some(anchor) = anchor else { continue };
        let Some(href) = anchor.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        // Relative hrefs are engine chrome (pagination, settings), not results.
        if !href.starts_with("http://") && !href.starts_with("https://") {
            continue;
        }
        let title = element_text(&heading);
        if title.is_empty() {
            continue;
        }
        let summary = container
            .select(&summary_sel)
            .next()
            .map(|p| element_text(&p))
            .unwrap_or_default();
        out.push(Candidate {
            title,
            link: href.to_string(),
            summary,
        });
        if out.len() >= top_k {
            break;
        }
    }
    out
}

/// Union of both heuristics in page order, deduped by normalized link,
/// bounded to `top_k`.
pub fn parse_results(html: &str, top_k: usize) -> Vec<Candidate> {
    if top_k == 0 {
        return Vec::new();
    }
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for c in parse_vendor_results(html, top_k)
        .into_iter()
        .chain(parse_structural_results(html, top_k))
    {
        let key = normalize_link(&c.link);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(c);
        if out.len() >= top_k {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const VENDOR_HTML: &str = r#"<!DOCTYPE html>
<html><body><ol id="b_results">
<li class="b_algo">
  <h2><a href="https://www.rust-lang.org/">Rust Programming Language</a></h2>
  <div class="b_caption"><p>A language empowering everyone.</p></div>
</li>
<li class="b_algo">
  <h2><a href="https://doc.rust-lang.org/book/">The Rust Book</a></h2>
  <div class="b_caption"><p>An introductory book about Rust.</p></div>
</li>
</ol></body></html>"#;

    // No vendor classes at all: only the structural heuristic can see these.
    const DRIFTED_HTML: &str = r#"<html><body>
<div class="serp-item">
  <h3><a href="https://example.com/one">First result</a></h3>
  <p>First summary.</p>
</div>
<div class="serp-item">
  <h3><a href="https://example.com/two">Second result</a></h3>
  <p>Second summary.</p>
</div>
<div class="pager"><h4>Pages</h4><a href="/search?page=2">Next</a></div>
</body></html>"#;

    #[test]
    fn vendor_heuristic_parses_containers() {
        let got = parse_vendor_results(VENDOR_HTML, 10);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].title, "Rust Programming Language");
        assert_eq!(got[0].link, "https://www.rust-lang.org/");
        assert_eq!(got[0].summary, "A language empowering everyone.");
        assert_eq!(got[1].link, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn vendor_heuristic_respects_top_k() {
        assert_eq!(parse_vendor_results(VENDOR_HTML, 1).len(), 1);
    }

    #[test]
    fn structural_heuristic_survives_class_drift() {
        let got = parse_structural_results(DRIFTED_HTML, 10);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].link, "https://example.com/one");
        assert_eq!(got[1].summary, "Second summary.");
    }

    #[test]
    fn structural_heuristic_skips_relative_chrome_links() {
        let got = parse_structural_results(DRIFTED_HTML, 10);
        assert!(got.iter().all(|c| !c.link.contains("page=2")));
    }

    #[test]
    fn union_dedups_by_link_preserving_page_order() {
        // Vendor container also matched by the structural pass; the union
        // must keep it once, vendor heuristic first.
        let got = parse_results(VENDOR_HTML, 10);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].link, "https://www.rust-lang.org/");
        let mut links: Vec<_> = got.iter().map(|c| c.link.clone()).collect();
        links.sort();
        links.dedup();
        assert_eq!(links.len(), got.len());
    }

    #[test]
    fn empty_page_parses_to_empty() {
        assert!(parse_results("<html><body></body></html>", 10).is_empty());
    }

    #[test]
    fn sanitize_strips_markup_and_control_chars() {
        assert_eq!(sanitize_query("ev\tfire\u{0} <b>causes</b>"), "ev fire bcauses/b");
        assert_eq!(sanitize_query("  spaced   out  "), "spaced out");
        assert_eq!(sanitize_query("\"quoted\" 'term'"), "quoted term");
    }

    #[test]
    fn query_url_encodes_keyword() {
        let u = query_url("https://www.bing.com", "ev fire causes").unwrap();
        assert_eq!(u.as_str(), "https://www.bing.com/search?q=ev+fire+causes");
    }

    #[test]
    fn query_url_rejects_bad_base() {
        assert!(query_url("not a url", "x").is_err());
    }

    proptest! {
        #[test]
        fn sanitized_queries_never_contain_breaking_chars(q in "\\PC{0,64}") {
            let s = sanitize_query(&q);
            let all_safe = s.chars().all(|c| {
                !c.is_control() && !matches!(c, '<' | '>' | '"' | '\'' | '`')
            });
            prop_assert!(all_safe);
        }

        #[test]
        fn parse_results_is_bounded_and_distinct(top_k in 0usize..8) {
            let got = parse_results(VENDOR_HTML, top_k);
            prop_assert!(got.len() <= top_k);
            let mut links: Vec<_> = got.iter().map(|c| c.link.clone()).collect();
            links.sort();
            links.dedup();
            prop_assert_eq!(links.len(), got.len());
        }
    }
}
