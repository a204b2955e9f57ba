use crate::config::{Config, DEFAULT_SEARCH_URL, DEFAULT_WIKIPEDIA_URL};
use crate::error::Result;
use crate::output::{RawOutput, format_instructions};
use agent::callbacks::MessageLogger;
use agent::llm::{self, Message};
use agent::tools::{SaveTool, Tool, WebSearchTool, WikipediaTool};
use agent::{Agent, AgentBuilder, Error as AgentError, FinalAnswer};
use std::path::PathBuf;
use std::sync::Arc;

const RESEARCH_PROMPT: &str = "You are a research assistant that will help generate answers to a user's query.
Answer the user query and use necessary tools.
Wrap the output in this format and provide no other text";

#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub requester_name: String,
    pub query: String,
}

/// The unparsed answer of one agent run.
#[derive(Debug)]
pub struct Invocation {
    pub raw: RawOutput,
    /// Tools the agent actually called, in first-use order.
    pub tools_invoked: Vec<String>,
}

pub fn system_prompt() -> String {
    format!("{}\n{}", RESEARCH_PROMPT, format_instructions())
}

/// Runs one query through a tool-calling agent. Every invocation gets a fresh agent, so
/// nothing carries over between queries.
pub struct ResearchAssistant {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    save_path: PathBuf,
    search_url: String,
    wikipedia_url: String,
    max_steps: usize,
    wiki_top_k: usize,
    wiki_max_chars: usize,
    verbose: bool,
}

impl ResearchAssistant {
    pub fn new(llm: Arc<dyn llm::LLM + Send + Sync>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            save_path: save_path.into(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            wikipedia_url: DEFAULT_WIKIPEDIA_URL.to_string(),
            max_steps: 15,
            wiki_top_k: 1,
            wiki_max_chars: 100,
            verbose: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            search_url: config.search_url.clone(),
            wikipedia_url: config.wikipedia_url.clone(),
            max_steps: config.max_steps,
            wiki_top_k: config.wiki_top_k,
            wiki_max_chars: config.wiki_max_chars,
            verbose: config.verbose,
            ..Self::new(config.build_llm(), &config.save_path)
        }
    }

    fn build_agent(&self) -> agent::Result<Agent> {
        let tools: Vec<Box<dyn Tool + Send>> = vec![
            WebSearchTool::with_base_url(&self.search_url),
            WikipediaTool::with_base_url(&self.wikipedia_url)
                .top_k(self.wiki_top_k)
                .max_chars(self.wiki_max_chars),
            SaveTool::new(&self.save_path),
        ];
        let mut builder = AgentBuilder::new()
            .llm(self.llm.clone())
            .tools(tools)
            .stop_condition(Box::new(FinalAnswer))
            .max_steps(self.max_steps);

        if self.verbose {
            builder = builder.callback(MessageLogger::new("research", std::io::stderr())?);
        }

        builder.build()
    }

    pub async fn invoke(&self, request: &ResearchRequest) -> Result<Invocation> {
        tracing::info!(requester = %request.requester_name, query = %request.query, "starting research");

        let mut agent = self.build_agent()?;
        let history = agent
            .run(vec![
                Message::System(system_prompt()),
                Message::User(request.query.clone()),
            ])
            .await?;

        let answer = match history.last() {
            Some(Message::Assistant(content, _)) => content.clone(),
            _ => {
                return Err(AgentError::AgentWorkflowError(
                    "agent finished without an answer".to_string(),
                )
                .into());
            }
        };

        Ok(Invocation {
            raw: RawOutput::text(answer),
            tools_invoked: tools_invoked(&history),
        })
    }
}

fn tools_invoked(history: &[Message]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for msg in history {
        if let Message::Tool { name, .. } = msg {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}
