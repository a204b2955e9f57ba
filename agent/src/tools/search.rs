use crate::Result;
use crate::llm::Message;
use crate::tools::{FunctionalTool, QueryArgs, ToolCall, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; research-assistant/0.1)";
const MAX_RESULTS: usize = 5;

/// Web search through DuckDuckGo's html endpoint, no api key required.
pub struct WebSearchTool {
    base_url: String,
    client: Client,
}

impl WebSearchTool {
    pub fn with_base_url(base_url: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            base_url: base_url.into(),
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        })
    }

    async fn search(&self, query: &str) -> Result<String> {
        let html = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let results = extract_results(&html);
        tracing::debug!(query, results = results.len(), "web search finished");

        if results.is_empty() {
            Ok("No good DuckDuckGo Search Result was found".to_string())
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

#[async_trait]
impl FunctionalTool for WebSearchTool {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<QueryArgs>("search", "Search the web for information")
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message> {
        let args: QueryArgs = call.args()?;
        Ok(Message::Tool {
            id: call.id.clone(),
            name: "search".to_string(),
            result: self.search(&args.query).await?,
        })
    }
}

/// Pulls title, snippet and url out of each `result__body` block of the results page.
fn extract_results(html: &str) -> Vec<String> {
    html.split("result__body")
        .skip(1)
        .filter_map(|chunk| {
            let title = element_text(chunk, "result__a")?;
            let snippet = element_text(chunk, "result__snippet").unwrap_or_default();
            let url = element_text(chunk, "result__url").unwrap_or_default();
            Some(format!("{}\n{}\nURL: {}", title, snippet, url))
        })
        .take(MAX_RESULTS)
        .collect()
}

/// Text content of the first `<a class="{class}" ...>...</a>` in `chunk`.
fn element_text(chunk: &str, class: &str) -> Option<String> {
    let start = chunk.find(&format!("class=\"{}\"", class))?;
    let rest = &chunk[start..];
    let open = rest.find('>')? + 1;
    let close = rest[open..].find("</a>")? + open;
    let text = html_decode(&strip_tags(&rest[open..close]));
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{WebSearchTool, extract_results};
    use crate::Result;
    use crate::tools::test_util::call_tool;
    use httpmock::prelude::*;

    const PAGE: &str = r#"
<div class="result results_links">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://www.rust-lang.org/">Rust Programming Language</a>
    </h2>
    <a class="result__url" href="https://www.rust-lang.org/">
      www.rust-lang.org
    </a>
    <a class="result__snippet" href="https://www.rust-lang.org/">A language empowering everyone to build <b>reliable</b> &amp; efficient software.</a>
  </div>
</div>
<div class="result results_links">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://en.wikipedia.org/wiki/Rust">Rust (programming language) - Wikipedia</a>
    </h2>
  </div>
</div>
"#;

    #[test]
    fn test_extract_results() {
        let results = extract_results(PAGE);

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            "Rust Programming Language\nA language empowering everyone to build reliable & efficient software.\nURL: www.rust-lang.org"
        );
        assert_eq!(
            results[1],
            "Rust (programming language) - Wikipedia\n\nURL: "
        );
    }

    #[tokio::test]
    async fn test_search_tool() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/html/").query_param("q", "rust lang");
                then.status(200).body(PAGE);
            })
            .await;

        let mut tool = WebSearchTool::with_base_url(server.url("/html/"));
        let result = call_tool(&mut *tool, "{\"query\":\"rust lang\"}").await?;

        mock.assert_async().await;
        assert!(result.starts_with("Rust Programming Language\n"));
        assert!(result.contains("\n\nRust (programming language) - Wikipedia"));

        Ok(())
    }

    #[tokio::test]
    async fn test_search_tool_no_results() -> Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/html/");
                then.status(200).body("<html><body>nothing</body></html>");
            })
            .await;

        let mut tool = WebSearchTool::with_base_url(server.url("/html/"));
        let result = call_tool(&mut *tool, "{\"query\":\"zzzz\"}").await?;

        assert_eq!(result, "No good DuckDuckGo Search Result was found");

        Ok(())
    }
}
