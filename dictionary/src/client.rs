//! MediaWiki client for the Rangjung Yeshe dictionary wiki.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use reqwest::Client;
use rigpa_knowledge::{DictionaryConfig, DocumentMetadata, KnowledgeDocument};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DictionaryError, Result};
use crate::wikitext::wikitext_to_plain;

/// `metadata.source` of every imported document.
pub const SOURCE_NAME: &str = "Rangjung Yeshe Wiki";

/// Trimmed wikitext must be longer than this to be imported.
const MIN_WIKITEXT_CHARS: usize = 20;

/// Category pages must normalize to more than this to be imported.
const MIN_CATEGORY_CONTENT_CHARS: usize = 50;

/// Frequently studied Dzogchen terms, in Wylie.
pub const COMMON_TERMS: [&str; 30] = [
    "rig pa",
    "gzhi",
    "ma rig pa",
    "ye shes",
    "kun gzhi",
    "chos nyid",
    "chos sku",
    "rtogs pa",
    "grol ba",
    "rang grol",
    "ka dag",
    "lhun grub",
    "ngo bo",
    "rang bzhin",
    "thugs rje",
    "sems nyid",
    "byang chub sems",
    "tshad med bzhi",
    "bde gshegs snying po",
    "rdzogs chen",
    "thod rgal",
    "khregs chod",
    "gtum mo",
    "byin rlabs",
    "sgrub pa",
    "sgom pa",
    "bsam gtan",
    "ting nge dzin",
    "shes rab",
    "thabs",
];

static PAGE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"index\.php/(.+?)(?:[?#]|$)").ok());

/// A title returned by `opensearch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleMatch {
    pub title: String,
    pub url: Option<String>,
}

/// Wiki size, from `meta=siteinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    pub sitename: String,
    pub articles: u64,
    pub pages: u64,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: QueryBody,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: HashMap<String, Page>,
    #[serde(default)]
    categorymembers: Vec<CategoryMember>,
    general: Option<General>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: Option<String>,
    #[serde(default)]
    revisions: Vec<Revision>,
}

impl Page {
    fn wikitext(&self) -> &str {
        self.revisions
            .first()
            .map(|r| r.slots.main.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: Slots,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: Slot,
}

#[derive(Debug, Deserialize)]
struct Slot {
    #[serde(rename = "*", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct CategoryMember {
    pageid: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct General {
    sitename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    #[serde(default)]
    articles: u64,
    #[serde(default)]
    pages: u64,
}

/// Imports dictionary pages as `definition` documents.
///
/// Every batch operation reports progress as `(current, total)`, waits the
/// configured delay between consecutive requests, and logs and skips items
/// that fail.
pub struct DictionaryClient {
    client: Client,
    /// `api.php` endpoint.
    api_url: String,
    /// Wiki root, used to build page URLs.
    site_url: String,
    delay: Duration,
}

impl DictionaryClient {
    /// Create a client for the `api.php` endpoint at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let site_url = api_url
            .strip_suffix("/api.php")
            .unwrap_or(&api_url)
            .to_string();
        Self {
            client: Client::new(),
            api_url,
            site_url,
            delay: Duration::from_millis(DictionaryConfig::default().request_delay_ms),
        }
    }

    pub fn from_config(config: &DictionaryConfig) -> Self {
        Self::new(&config.base_url).with_delay(Duration::from_millis(config.request_delay_ms))
    }

    /// Set the pause between consecutive requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Public URL of a page.
    pub fn page_url(&self, title: &str) -> String {
        format!("{}/index.php/{}", self.site_url, urlencoding::encode(title))
    }

    /// Import pages by exact title.
    pub async fn import_terms(
        &self,
        titles: &[String],
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<KnowledgeDocument> {
        let total = titles.len();
        info!("Starting import of {total} terms");

        let mut documents = Vec::new();
        for (idx, title) in titles.iter().enumerate() {
            self.pause(idx).await;
            match self.fetch_term(title).await {
                Ok(Some(doc)) => {
                    debug!("Added \"{title}\" ({} chars)", doc.content.len());
                    documents.push(doc);
                }
                Ok(None) => {}
                Err(e) => warn!("Error fetching term \"{title}\": {e}"),
            }
            on_progress(idx + 1, total);
        }

        info!("Import complete: {} documents", documents.len());
        documents
    }

    /// Import [`COMMON_TERMS`].
    pub async fn import_common_terms(
        &self,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<KnowledgeDocument> {
        let titles: Vec<String> = COMMON_TERMS.iter().map(ToString::to_string).collect();
        self.import_terms(&titles, on_progress).await
    }

    /// Import titles listed one per line.
    pub async fn import_term_list(
        &self,
        text: &str,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<KnowledgeDocument> {
        self.import_terms(&parse_list(text), on_progress).await
    }

    /// Import the page a wiki URL points at. An unparseable URL imports
    /// nothing.
    pub async fn import_from_url(
        &self,
        url: &str,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<KnowledgeDocument> {
        match title_from_url(url) {
            Ok(title) => {
                debug!("Extracted page title \"{title}\" from {url}");
                on_progress(0, 1);
                self.import_terms(&[title], on_progress).await
            }
            Err(e) => {
                warn!("{e}");
                Vec::new()
            }
        }
    }

    /// Import page URLs listed one per line.
    pub async fn import_url_list(
        &self,
        text: &str,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Vec<KnowledgeDocument> {
        let urls = parse_list(text);
        let total = urls.len();

        let mut documents = Vec::new();
        for (idx, url) in urls.iter().enumerate() {
            self.pause(idx).await;
            documents.extend(self.import_from_url(url, &mut |_, _| {}).await);
            on_progress(idx + 1, total);
        }
        documents
    }

    /// Import up to `limit` members of a wiki category.
    ///
    /// Fails only if the member list itself cannot be fetched.
    pub async fn import_category(
        &self,
        category: &str,
        limit: usize,
        on_progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<KnowledgeDocument>> {
        let cmtitle = format!("Category:{category}");
        let cmlimit = limit.to_string();
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmlimit", cmlimit.as_str()),
            ])
            .await?;

        let members = response.query.categorymembers;
        let total = members.len();
        info!("Found {total} members in category \"{category}\"");

        let mut documents = Vec::new();
        for (idx, member) in members.iter().enumerate() {
            self.pause(idx).await;
            match self.fetch_category_member(member, category).await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => warn!("Failed to fetch page \"{}\": {e}", member.title),
            }
            on_progress(idx + 1, total);
        }

        info!(
            "Category import complete: {} documents from \"{category}\"",
            documents.len()
        );
        Ok(documents)
    }

    /// Title lookup through `opensearch`.
    pub async fn search_titles(&self, term: &str, limit: usize) -> Result<Vec<TitleMatch>> {
        let limit = limit.to_string();
        let response: serde_json::Value = self
            .get(&[
                ("action", "opensearch"),
                ("format", "json"),
                ("search", term),
                ("limit", limit.as_str()),
            ])
            .await?;

        // [query, [titles], [descriptions], [urls]]
        let column = |idx: usize| -> Vec<String> {
            response
                .get(idx)
                .and_then(serde_json::Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        let urls = column(3);

        Ok(column(1)
            .into_iter()
            .enumerate()
            .map(|(idx, title)| TitleMatch {
                title,
                url: urls.get(idx).cloned(),
            })
            .collect())
    }

    pub async fn site_stats(&self) -> Result<SiteStats> {
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("meta", "siteinfo"),
                ("siprop", "statistics|general"),
            ])
            .await?;

        let query = response.query;
        let (articles, pages) = query
            .statistics
            .map(|s| (s.articles, s.pages))
            .unwrap_or_default();

        Ok(SiteStats {
            sitename: query
                .general
                .and_then(|g| g.sitename)
                .unwrap_or_else(|| "Unknown".to_string()),
            articles,
            pages,
        })
    }

    /// Whether the wiki answers a `siteinfo` query.
    pub async fn test_connection(&self) -> bool {
        let response: Result<QueryResponse> = self
            .get(&[("action", "query"), ("format", "json"), ("meta", "siteinfo")])
            .await;

        match response {
            Ok(response) => response.query.general.is_some(),
            Err(e) => {
                warn!("Dictionary connection test failed: {e}");
                false
            }
        }
    }

    async fn fetch_term(&self, title: &str) -> Result<Option<KnowledgeDocument>> {
        let response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("rvslots", "main"),
                ("titles", title),
            ])
            .await?;

        let Some((page_id, page)) = response.query.pages.into_iter().next() else {
            warn!("No page returned for \"{title}\"");
            return Ok(None);
        };
        if page_id == "-1" {
            warn!("Page not found: \"{title}\"");
            return Ok(None);
        }

        let wikitext = page.wikitext();
        if wikitext.trim().chars().count() <= MIN_WIKITEXT_CHARS {
            warn!("No content for \"{title}\" ({} chars)", wikitext.len());
            return Ok(None);
        }

        let page_title = page.title.clone().unwrap_or_else(|| title.to_string());
        Ok(Some(definition(
            &page_id,
            &page_title,
            &wikitext_to_plain(wikitext),
            DocumentMetadata::Definition {
                source: Some(SOURCE_NAME.to_string()),
                url: Some(self.page_url(title)),
                title: Some(page_title.clone()),
                tibetan_term: Some(title.to_string()),
                category: None,
            },
        )))
    }

    async fn fetch_category_member(
        &self,
        member: &CategoryMember,
        category: &str,
    ) -> Result<Option<KnowledgeDocument>> {
        let page_id = member.pageid.to_string();
        let mut response: QueryResponse = self
            .get(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("rvslots", "main"),
                ("pageids", page_id.as_str()),
            ])
            .await?;

        let Some(page) = response.query.pages.remove(&page_id) else {
            warn!("No wikitext found for \"{}\"", member.title);
            return Ok(None);
        };
        let wikitext = page.wikitext();
        if wikitext.trim().chars().count() <= MIN_WIKITEXT_CHARS {
            warn!("No wikitext found for \"{}\"", member.title);
            return Ok(None);
        }

        let plain = wikitext_to_plain(wikitext);
        if plain.chars().count() <= MIN_CATEGORY_CONTENT_CHARS {
            warn!(
                "Content too short for \"{}\" ({} chars)",
                member.title,
                plain.len()
            );
            return Ok(None);
        }

        Ok(Some(definition(
            &page_id,
            &member.title,
            &plain,
            DocumentMetadata::Definition {
                source: Some(SOURCE_NAME.to_string()),
                url: Some(self.page_url(&member.title)),
                title: Some(member.title.clone()),
                tibetan_term: None,
                category: Some(category.to_string()),
            },
        )))
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self.client.get(&self.api_url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DictionaryError::ApiStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn pause(&self, idx: usize) {
        if idx > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Extract the page title from `.../index.php/<Title>`.
pub fn title_from_url(url: &str) -> Result<String> {
    let encoded = PAGE_URL
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| DictionaryError::InvalidUrl(url.to_string()))?;

    urlencoding::decode(encoded.as_str())
        .map(|title| title.into_owned())
        .map_err(|_| DictionaryError::InvalidUrl(url.to_string()))
}

/// Non-empty lines that are not `#` comments.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

fn definition(
    page_id: &str,
    title: &str,
    plain: &str,
    metadata: DocumentMetadata,
) -> KnowledgeDocument {
    KnowledgeDocument::new(format!("rywiki-{page_id}"), format!("{title}\n\n{plain}"), metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url("https://rywiki.tsadra.org/index.php/rig_pa").unwrap(),
            "rig_pa"
        );
        assert_eq!(
            title_from_url("https://rywiki.tsadra.org/index.php/ye%20shes?action=edit").unwrap(),
            "ye shes"
        );
        assert_eq!(
            title_from_url("https://rywiki.tsadra.org/index.php/ka_dag#Notes").unwrap(),
            "ka_dag"
        );
    }

    #[test]
    fn test_title_from_url_rejects_other_urls() {
        let err = title_from_url("https://example.com/wiki/rig_pa").unwrap_err();
        assert!(matches!(err, DictionaryError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_list_skips_blanks_and_comments() {
        let text = "# Dzogchen\nrig pa\n\n  ye shes  \n#skip\nka dag\n";
        assert_eq!(parse_list(text), vec!["rig pa", "ye shes", "ka dag"]);
    }

    #[test]
    fn test_page_url_encodes_title() {
        let client = DictionaryClient::new("https://rywiki.tsadra.org/api.php");
        assert_eq!(
            client.page_url("rig pa"),
            "https://rywiki.tsadra.org/index.php/rig%20pa"
        );
    }

    #[test]
    fn test_common_terms_are_unique() {
        let mut terms = COMMON_TERMS.to_vec();
        terms.sort_unstable();
        terms.dedup();
        assert_eq!(terms.len(), COMMON_TERMS.len());
    }
}
