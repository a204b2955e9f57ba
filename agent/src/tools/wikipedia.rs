use crate::Result;
use crate::llm::Message;
use crate::tools::{FunctionalTool, QueryArgs, ToolCall, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

const USER_AGENT: &str = "research-assistant/0.1";

/// Encyclopedia lookup through the MediaWiki api. Results are kept short: by default only the
/// best matching page is fetched and the answer is capped at 100 characters.
pub struct WikipediaTool {
    base_url: String,
    top_k_results: usize,
    max_chars: usize,
    client: Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    pages: BTreeMap<String, Page>,
}

#[derive(Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
}

impl WikipediaTool {
    pub fn with_base_url(base_url: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            base_url: base_url.into(),
            top_k_results: 1,
            max_chars: 100,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        })
    }

    /// Number of pages summarized per lookup.
    pub fn top_k(mut self: Box<Self>, top_k_results: usize) -> Box<Self> {
        self.top_k_results = top_k_results;
        self
    }

    /// Character cap on the joined summaries.
    pub fn max_chars(mut self: Box<Self>, max_chars: usize) -> Box<Self> {
        self.max_chars = max_chars;
        self
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let limit = self.top_k_results.to_string();
        let res: SearchResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn page_summary(&self, title: &str) -> Result<Option<String>> {
        let res: ExtractResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res
            .query
            .and_then(|q| q.pages.into_values().next())
            .and_then(|page| {
                page.extract
                    .filter(|e| !e.trim().is_empty())
                    .map(|e| format!("Page: {}\nSummary: {}", page.title, e.trim()))
            }))
    }

    async fn lookup(&self, query: &str) -> Result<String> {
        let mut summaries = Vec::new();
        for title in self.search_titles(query).await? {
            if let Some(summary) = self.page_summary(&title).await? {
                summaries.push(summary);
            }
        }

        if summaries.is_empty() {
            return Ok("No good Wikipedia Search Result was found".to_string());
        }

        Ok(summaries
            .join("\n\n")
            .chars()
            .take(self.max_chars)
            .collect())
    }
}

#[async_trait]
impl FunctionalTool for WikipediaTool {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<QueryArgs>(
            "wikipedia",
            "Look up a topic on Wikipedia. Useful for general questions about people, places, \
             companies, facts, historical events, or other subjects.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message> {
        let args: QueryArgs = call.args()?;
        Ok(Message::Tool {
            id: call.id.clone(),
            name: "wikipedia".to_string(),
            result: self.lookup(&args.query).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::WikipediaTool;
    use crate::Result;
    use crate::tools::test_util::call_tool;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_wikipedia_tool_truncates_summary() -> Result<()> {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("list", "search")
                    .query_param("srsearch", "withholding tax")
                    .query_param("srlimit", "1");
                then.status(200).json_body(json!({
                    "query": {"search": [{"title": "Withholding tax", "pageid": 1}]}
                }));
            })
            .await;
        let extract = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("prop", "extracts")
                    .query_param("titles", "Withholding tax");
                then.status(200).json_body(json!({
                    "query": {"pages": {"1": {
                        "title": "Withholding tax",
                        "extract": "Withholding tax, also called retention tax, is a government requirement for the payer of an item of income to withhold or deduct tax from the payment."
                    }}}
                }));
            })
            .await;

        let mut tool = WikipediaTool::with_base_url(server.url("/w/api.php"));
        let result = call_tool(&mut *tool, "{\"query\":\"withholding tax\"}").await?;

        search.assert_async().await;
        extract.assert_async().await;
        assert!(result.starts_with("Page: Withholding tax\nSummary: Withholding tax, also"));
        assert_eq!(result.chars().count(), 100);

        Ok(())
    }

    #[tokio::test]
    async fn test_wikipedia_tool_top_k_and_cap() -> Result<()> {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/w/api.php")
                    .query_param("list", "search")
                    .query_param("srlimit", "2");
                then.status(200).json_body(json!({
                    "query": {"search": [{"title": "Rust"}, {"title": "Ferris"}]}
                }));
            })
            .await;
        for (title, extract) in [("Rust", "A language."), ("Ferris", "A crab.")] {
            server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path("/w/api.php")
                        .query_param("prop", "extracts")
                        .query_param("titles", title);
                    then.status(200).json_body(json!({
                        "query": {"pages": {"1": {"title": title, "extract": extract}}}
                    }));
                })
                .await;
        }

        let mut tool = WikipediaTool::with_base_url(server.url("/w/api.php"))
            .top_k(2)
            .max_chars(500);
        let result = call_tool(&mut *tool, "{\"query\":\"rust\"}").await?;

        search.assert_async().await;
        assert_eq!(
            result,
            "Page: Rust\nSummary: A language.\n\nPage: Ferris\nSummary: A crab."
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_wikipedia_tool_no_match() -> Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/w/api.php").query_param("list", "search");
                then.status(200)
                    .json_body(json!({"query": {"search": []}}));
            })
            .await;

        let mut tool = WikipediaTool::with_base_url(server.url("/w/api.php"));
        let result = call_tool(&mut *tool, "{\"query\":\"qwxzv\"}").await?;

        assert_eq!(result, "No good Wikipedia Search Result was found");

        Ok(())
    }
}
