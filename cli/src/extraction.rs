use anyhow::{Context, Result};
use serde::Serialize;

use larder_core::extract::{ExtractResponse, PageScraper, RecipeExtractor, response_to_recipe};
use larder_core::models::{ExtractedRecipe, ScrapedPage};

/// Fetches a recipe page and reduces it to visible text plus candidate
/// image URLs. The real understanding happens in the extraction service;
/// this only has to produce readable input for it.
pub struct PageFetchClient {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
}

impl PageFetchClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "larder-cli/{} (kitchen manager)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(15))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            rt: tokio::runtime::Handle::current(),
        }
    }

    pub async fn scrape_async(&self, url: &str) -> Result<ScrapedPage> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;
        let resp = resp
            .error_for_status()
            .with_context(|| format!("Recipe page {url} returned an error status"))?;
        let html = resp
            .text()
            .await
            .context("Failed to read recipe page body")?;
        Ok(scraped_from_html(&html))
    }
}

impl PageScraper for PageFetchClient {
    fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        self.rt.block_on(self.scrape_async(url))
    }
}

/// Client for the structured-extraction service: POSTs page text and image
/// candidates, receives a best-effort structured recipe.
pub struct ExtractServiceClient {
    client: reqwest::Client,
    endpoint: String,
    rt: tokio::runtime::Handle,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    images: &'a [String],
}

impl ExtractServiceClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "larder-cli/{} (kitchen manager)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            rt: tokio::runtime::Handle::current(),
        }
    }

    pub async fn extract_async(&self, text: &str, images: &[String]) -> Result<ExtractedRecipe> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&ExtractRequest { text, images })
            .send()
            .await
            .context("Failed to reach the extraction service")?;
        let resp = resp
            .error_for_status()
            .context("Extraction service returned an error status")?;
        let data: ExtractResponse = resp
            .json()
            .await
            .context("Failed to parse extraction service response")?;
        Ok(response_to_recipe(data))
    }
}

impl RecipeExtractor for ExtractServiceClient {
    fn extract(&self, text: &str, images: &[String]) -> Result<ExtractedRecipe> {
        self.rt.block_on(self.extract_async(text, images))
    }
}

/// Strip tags from an HTML document, keeping visible text and collecting
/// absolute `<img>` sources. Script and style content is skipped wholesale.
fn scraped_from_html(html: &str) -> ScrapedPage {
    let mut text = String::new();
    let mut images = Vec::new();
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        append_text(&mut text, &rest[..open]);
        rest = &rest[open + 1..];
        let Some(close) = rest.find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[..close];
        rest = &rest[close + 1..];

        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        if name == "img" {
            if let Some(src) = attr_value(tag, "src") {
                if src.starts_with("http") {
                    images.push(src.to_string());
                }
            }
        }

        if (name == "script" || name == "style") && !tag.starts_with('/') {
            let closing = format!("</{name}");
            match rest.to_ascii_lowercase().find(&closing) {
                Some(end) => rest = &rest[end..],
                None => rest = "",
            }
        }
    }
    append_text(&mut text, rest);

    ScrapedPage { text, images }
}

fn append_text(out: &mut String, chunk: &str) {
    for word in chunk.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
}

fn attr_value<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    // ASCII lowercasing keeps byte offsets aligned with the original
    let lower = tag.to_ascii_lowercase();
    let needle = format!("{attr}=\"");
    let start = lower.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}
