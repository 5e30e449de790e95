use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::normalize_text;
use crate::error::AppError;

// ── Constants ────────────────────────────────────────────────────────────────

const MIN_TEXT_LEN: usize = 200;

// ── Lazy static regexes ──────────────────────────────────────────────────────

static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(article|content|story|post|entry|body)").unwrap());

static BOILERPLATE_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(comment|related|share|social|promo|newsletter|cookie|advert|sidebar)")
        .unwrap()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

// ── Walk context ─────────────────────────────────────────────────────────────

struct WalkCtx {
    in_article_or_main: bool,
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Fetch a page and return its main body text.
pub async fn extract_article(client: &Client, url: &Url) -> Result<String, AppError> {
    let html = fetch_html(client, url).await?;
    Ok(article_text(&html))
}

// ── HTTP fetch ───────────────────────────────────────────────────────────────

async fn fetch_html(client: &Client, url: &Url) -> Result<String, AppError> {
    let response = client
        .get(url.clone())
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::extraction_with("Timed out fetching page", e)
            } else if e.is_connect() {
                AppError::extraction_with("Could not connect to host", e)
            } else {
                AppError::extraction_with("Request failed", e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::extraction(format!(
            "Upstream returned status {}",
            status.as_u16()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
        return Err(AppError::extraction("URL did not return HTML"));
    }

    response
        .text()
        .await
        .map_err(|e| AppError::extraction_with("Failed to read page body", e))
}

// ── Main extraction pipeline ─────────────────────────────────────────────────

/// Strip page chrome and return the body text, one block per paragraph.
pub fn article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let container = match find_container(&document) {
        Some(c) => c,
        None => return String::new(),
    };

    let ctx = WalkCtx {
        in_article_or_main: matches!(container.value().name(), "article" | "main"),
    };
    let raw = walk_element(container, &ctx);

    let text = raw
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    MULTI_NEWLINE_RE
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

// ── Container selection ──────────────────────────────────────────────────────

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    // 1. Prefer <article>
    let article_sel = Selector::parse("article").unwrap();
    if let Some(el) = document.select(&article_sel).next() {
        return Some(el);
    }

    // 2. Fall back to <main>
    let main_sel = Selector::parse("main").unwrap();
    if let Some(el) = document.select(&main_sel).next() {
        return Some(el);
    }

    // 3. Best <div> with a content-like class/id and sufficient text.
    let div_sel = Selector::parse("div").unwrap();
    let mut best: Option<ElementRef<'_>> = None;
    let mut best_len: usize = 0;

    for div in document.select(&div_sel) {
        let class_id = class_and_id(div);
        if !KEYWORD_RE.is_match(&class_id) || BOILERPLATE_CLASS_RE.is_match(&class_id) {
            continue;
        }

        let text_len = normalize_text(&collect_text(div)).len();
        if text_len > best_len {
            best_len = text_len;
            best = Some(div);
        }
    }

    if best_len >= MIN_TEXT_LEN {
        return best;
    }

    // 4. Whole <body>.
    let body_sel = Selector::parse("body").unwrap();
    document.select(&body_sel).next()
}

// ── DOM tree walker → plain text ─────────────────────────────────────────────

fn walk_element(el: ElementRef<'_>, ctx: &WalkCtx) -> String {
    let name = el.value().name();

    // Hard-skip tags.
    if matches!(
        name,
        "script"
            | "style"
            | "noscript"
            | "template"
            | "svg"
            | "form"
            | "button"
            | "iframe"
            | "audio"
            | "video"
            | "source"
            | "track"
    ) {
        return String::new();
    }

    // Skip layout / navigation chrome.
    if matches!(name, "nav" | "footer" | "aside") {
        return String::new();
    }

    // Skip <header> unless we are already inside article/main.
    if name == "header" && !ctx.in_article_or_main {
        return String::new();
    }

    if el.value().attr("aria-hidden") == Some("true") {
        return String::new();
    }

    if matches!(name, "section" | "div" | "ul" | "ol") {
        let class_id = class_and_id(el);
        if !class_id.trim().is_empty() && BOILERPLATE_CLASS_RE.is_match(&class_id) {
            return String::new();
        }
    }

    let child_ctx = WalkCtx {
        in_article_or_main: ctx.in_article_or_main || matches!(name, "article" | "main"),
    };

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "blockquote" | "figcaption" => {
            let content = walk_children(el, &child_ctx);
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            format!("\n\n{}\n\n", trimmed)
        }

        "li" | "dt" | "dd" | "tr" => {
            let content = walk_children(el, &child_ctx);
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return String::new();
            }
            format!("{}\n", trimmed)
        }

        "td" | "th" => format!(" {} ", walk_children(el, &child_ctx).trim()),

        "br" => "\n".to_string(),

        "pre" => format!("\n\n{}\n\n", collect_text(el)),

        "div" | "section" | "ul" | "ol" | "dl" | "table" | "figure" | "header" => {
            format!("\n{}\n", walk_children(el, &child_ctx))
        }

        _ => walk_children(el, &child_ctx),
    }
}

fn walk_children(el: ElementRef<'_>, ctx: &WalkCtx) -> String {
    use scraper::node::Node;
    let mut result = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                result.push_str(&WHITESPACE_RE.replace_all(&*text.text, " "));
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    result.push_str(&walk_element(child_el, ctx));
                }
            }
            _ => {}
        }
    }
    result
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

/// Recursively collect all text from an element and its descendants.
fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("")
}

fn class_and_id(el: ElementRef<'_>) -> String {
    let id = el.value().id().unwrap_or("");
    let classes = el.value().classes().collect::<Vec<_>>().join(" ");
    format!("{} {}", id, classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_and_drops_chrome() {
        let html = r#"<html><head><title>T</title><script>var x = 1;</script></head>
            <body>
              <nav><a href="/">Home</a></nav>
              <article>
                <h1>Big   News</h1>
                <p>First paragraph
                   wraps here.</p>
                <p>Second <em>one</em>.</p>
                <aside>Ad copy</aside>
                <form><button>Subscribe</button></form>
              </article>
              <footer>Copyright</footer>
            </body></html>"#;

        assert_eq!(
            article_text(html),
            "Big News\n\nFirst paragraph wraps here.\n\nSecond one."
        );
    }

    #[test]
    fn falls_back_to_main() {
        let html = "<body><div>menu</div><main><p>Inside main</p></main></body>";
        assert_eq!(article_text(html), "Inside main");
    }

    #[test]
    fn picks_largest_content_div() {
        let long = "lorem ipsum ".repeat(30);
        let html = format!(
            r#"<body><div class="header">Site</div>
               <div class="post-content"><p>{}</p></div>
               <div class="content-teaser"><p>short</p></div></body>"#,
            long
        );
        assert_eq!(article_text(&html), long.trim());
    }

    #[test]
    fn skips_boilerplate_sections() {
        let html = r#"<article><p>Body text</p>
            <section class="related-stories"><p>Other story</p></section>
            <div id="comments"><p>Nice post</p></div></article>"#;
        assert_eq!(article_text(html), "Body text");
    }

    #[test]
    fn list_items_on_own_lines() {
        let html = "<article><p>Steps:</p><ul><li>one</li><li>two</li></ul></article>";
        assert_eq!(article_text(html), "Steps:\n\none\ntwo");
    }

    #[test]
    fn empty_page_yields_empty_text() {
        assert_eq!(article_text("<html><body></body></html>"), "");
    }

    #[tokio::test]
    async fn fetches_html_over_http() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/story")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<article><p>Fetched body</p></article>")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/story", server.url())).unwrap();
        let text = extract_article(&Client::new(), &url).await.unwrap();
        assert_eq!(text, "Fetched body");
    }

    #[tokio::test]
    async fn upstream_error_status_fails() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone")
            .with_status(404)
            .with_header("content-type", "text/html")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/gone", server.url())).unwrap();
        let err = extract_article(&Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn non_html_response_fails() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/data.json", server.url())).unwrap();
        let err = extract_article(&Client::new(), &url).await.unwrap_err();
        assert_eq!(err.to_string(), "URL did not return HTML");
    }
}
