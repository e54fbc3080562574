//! scrape_website_content：抓取网页正文
//!
//! 无 scheme 时补 `http://`；GET 带浏览器 User-Agent 与超时；HTML 经 html2text 转为可读文本；
//! 超过 max_chars 截断并追加标记。可选域名白名单（为空表示不限制）。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::actions::{Action, ActionFailure, ActionHandler, ActionPayload, ActionSpec, ParamSpec, ValidatedArgs};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const TRUNCATION_MARKER: &str = "\n\n[... content truncated for length ...]";

pub struct ScrapeWebsiteAction {
    client: Client,
    allowed_domains: HashSet<String>,
    max_chars: usize,
}

/// 缺少 scheme 时补 http://
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

fn extract_domain(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r)?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?.split(':').next()?;
    (!host.is_empty()).then(|| host.to_lowercase())
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!") || s.starts_with("<html") || s.starts_with("<HTML")
        || (s.contains('<') && (s.contains("</") || s.contains("<head") || s.contains("<title")))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + TRUNCATION_MARKER
    } else {
        text.to_string()
    }
}

impl ScrapeWebsiteAction {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_chars: usize) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: allowed_domains.into_iter().map(|d| d.to_lowercase()).collect(),
            max_chars,
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), ActionFailure> {
        let domain = extract_domain(url)
            .ok_or_else(|| ActionFailure::invalid_arguments(format!("Invalid URL: {url}")))?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            return Ok(());
        }
        Err(ActionFailure::invalid_arguments(format!(
            "Domain not in allowlist: {domain}"
        )))
    }

    fn page_text(&self, body: &str) -> String {
        let body = body.trim_start_matches('\u{FEFF}');
        if !looks_like_html(body) {
            return body.trim().to_string();
        }
        match from_read(body.as_bytes(), 120) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "html2text failed; using raw body");
                body.trim().to_string()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ActionFailure> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ActionFailure::network(format!("Timeout: the request to {url} took too long."))
            } else {
                ActionFailure::network(format!("Network error: could not connect to {url}: {e}"))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ActionFailure::network(format!("HTTP error {status} for {url}")));
        }

        resp.text()
            .await
            .map_err(|e| ActionFailure::network(format!("Failed to read response from {url}: {e}")))
    }
}

impl Action for ScrapeWebsiteAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "scrape_website_content",
            "Scrapes the main textual content from a given website URL and returns it for summarization or analysis.",
        )
        .param(
            ParamSpec::string(
                "url",
                "The full URL of the website to scrape (e.g., 'https://www.example.com/article').",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for ScrapeWebsiteAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let url = normalize_url(args.str("url").unwrap_or_default());
        self.check_allowed(&url)?;

        let body = self.fetch(&url).await?;
        let text = self.page_text(&body);
        if text.is_empty() {
            return Err(ActionFailure::not_found(
                "Could not extract significant text content from the page.",
            ));
        }

        let content = truncate(&text, self.max_chars);
        tracing::info!(url = %url, chars = content.chars().count(), "scraped");
        Ok(ActionPayload::message(format!("Scraped content from {url}."))
            .with_field("url", url)
            .with_field("content", content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionErrorKind;

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com/a"), "http://example.com/a");
        assert_eq!(normalize_url(" https://example.com "), "https://example.com");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://Docs.rs:443/x?y").as_deref(), Some("docs.rs"));
        assert_eq!(extract_domain("http://user@host.org/").as_deref(), Some("host.org"));
        assert_eq!(extract_domain("http:///nothing"), None);
    }

    #[test]
    fn test_allowlist() {
        let open = ScrapeWebsiteAction::new(vec![], 1, 100);
        assert!(open.check_allowed("http://anything.net").is_ok());

        let strict = ScrapeWebsiteAction::new(vec!["Docs.rs".into()], 1, 100);
        assert!(strict.check_allowed("https://docs.rs/tokio").is_ok());
        let err = strict.check_allowed("https://evil.example").unwrap_err();
        assert_eq!(err.kind, ActionErrorKind::InvalidArguments);
    }

    #[test]
    fn test_truncate_appends_marker() {
        let out = truncate("abcdef", 3);
        assert!(out.starts_with("abc"));
        assert!(out.ends_with("[... content truncated for length ...]"));
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn test_html_is_converted_to_text() {
        let action = ScrapeWebsiteAction::new(vec![], 1, 100);
        let text = action.page_text("<html><head><title>T</title></head><body><p>Hello world</p></body></html>");
        assert!(text.contains("Hello world"));
        assert!(!text.contains("<p>"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        let action = ScrapeWebsiteAction::new(vec![], 2, 100);
        let args = action.spec().validate(&serde_json::json!({"url": "http://127.0.0.1:9"})).unwrap();
        let err = action.execute(args).await.unwrap_err();
        assert_eq!(err.kind, ActionErrorKind::NetworkFailure);
    }
}
