//! Link extraction and challenge detection for the dependents listing.

use super::Candidate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Shortest numeric suffix accepted as a project id. Shorter suffixes are
/// version-like slug parts (`all-the-mods-9`), not ids.
const MIN_ID_DIGITS: usize = 5;

static BUNDLE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/minecraft/modpacks/[^/]+$").expect("valid regex"));
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/minecraft/modpacks/([^/?#]+)").expect("valid regex"));
static TRAILING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)$").expect("valid regex"));

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static NAME_ELEMENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "h3[class*=name], h3[class*=title], \
         h4[class*=name], h4[class*=title], \
         span[class*=name], span[class*=title]",
    )
    .expect("valid selector")
});

/// Slug from a modpack URL or path.
pub fn extract_slug(url: &str) -> Option<String> {
    SLUG.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

/// Numeric id from a trailing `-<digits>` suffix.
pub fn extract_id(url: &str) -> Option<i64> {
    let digits = TRAILING_ID.captures(url)?.get(1)?.as_str();
    if digits.len() < MIN_ID_DIGITS {
        return None;
    }
    digits.parse().ok()
}

/// Whether a response body is an anti-bot interstitial rather than content.
pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("cloudflare")
        && [
            "checking your browser",
            "just a moment",
            "cf-chl",
            "challenge-platform",
        ]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Every modpack link on the page, first occurrence per slug, in document order.
///
/// Links without a visible name are skipped.
pub fn extract_candidates(html: &str, base_url: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for el in document.select(&ANCHOR) {
        let href = el.value().attr("href").unwrap_or("").trim();
        if href.is_empty() || !BUNDLE_HREF.is_match(href) {
            continue;
        }

        let Some(name) = anchor_name(&el) else {
            continue;
        };
        let Some(slug) = extract_slug(href) else {
            continue;
        };
        if !seen.insert(slug.clone()) {
            continue;
        }

        let source_url = base_url
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string());

        candidates.push(Candidate {
            id: extract_id(&slug),
            slug,
            name,
            source_url,
        });
    }

    candidates
}

/// Link text, else the text of a nested `h3`/`h4`/`span` whose class mentions
/// `name` or `title`. Image-only anchors have neither.
fn anchor_name(el: &ElementRef<'_>) -> Option<String> {
    let text = element_text(el);
    if !text.is_empty() {
        return Some(text);
    }

    el.select(&NAME_ELEMENT)
        .map(|inner| element_text(&inner))
        .find(|s| !s.is_empty())
}

fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
