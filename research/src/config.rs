use crate::error::{Error, Result};
use agent::llm;
use clap::ValueEnum;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-7-sonnet-20250219";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

impl ProviderKind {
    fn key_var(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Openai => "OPENAI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            ProviderKind::Openai => DEFAULT_OPENAI_MODEL,
        }
    }
}

/// Command line and environment settings, resolved into a `Config` once at startup.
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Completion provider
    #[arg(long, global = true, value_enum, default_value = "anthropic", env = "RESEARCH_PROVIDER")]
    pub provider: ProviderKind,

    /// Model name (defaults depend on the provider)
    #[arg(long, global = true, env = "RESEARCH_MODEL")]
    pub model: Option<String>,

    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Directory receiving the exported reports
    #[arg(long, global = true, default_value = "static/downloads", env = "RESEARCH_DOWNLOADS_DIR")]
    pub downloads_dir: PathBuf,

    /// File the save tool appends to
    #[arg(
        long,
        global = true,
        default_value = "static/downloads/research_output.txt",
        env = "RESEARCH_SAVE_PATH"
    )]
    pub save_path: PathBuf,

    /// Directory served under /static
    #[arg(long, global = true, default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, global = true, default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,

    #[arg(long, global = true, default_value = DEFAULT_WIKIPEDIA_URL)]
    pub wikipedia_url: String,

    /// Upper bound on model completions per query
    #[arg(long, global = true, default_value_t = 15)]
    pub max_steps: usize,

    /// Token cap per Anthropic completion
    #[arg(long, global = true, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Wikipedia pages summarized per lookup
    #[arg(long, global = true, default_value_t = 1)]
    pub wiki_top_k: usize,

    /// Character cap on a Wikipedia lookup
    #[arg(long, global = true, default_value_t = 100)]
    pub wiki_max_chars: usize,

    /// Log debug output and print the agent transcript to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub downloads_dir: PathBuf,
    pub save_path: PathBuf,
    pub static_dir: PathBuf,
    pub search_url: String,
    pub wikipedia_url: String,
    pub max_steps: usize,
    pub max_tokens: u32,
    pub wiki_top_k: usize,
    pub wiki_max_chars: usize,
    pub verbose: bool,
}

impl Config {
    /// Fails when the selected provider's credential is missing or blank.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let key = match args.provider {
            ProviderKind::Anthropic => &args.anthropic_api_key,
            ProviderKind::Openai => &args.openai_api_key,
        };

        let api_key = key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set; export it or pass it on the command line",
                    args.provider.key_var()
                ))
            })?
            .to_string();

        if args.max_steps == 0 {
            return Err(Error::Config("max-steps must be at least 1".to_string()));
        }
        if args.wiki_top_k == 0 {
            return Err(Error::Config("wiki-top-k must be at least 1".to_string()));
        }

        Ok(Self {
            provider: args.provider,
            api_key,
            model: args
                .model
                .clone()
                .unwrap_or_else(|| args.provider.default_model().to_string()),
            downloads_dir: args.downloads_dir.clone(),
            save_path: args.save_path.clone(),
            static_dir: args.static_dir.clone(),
            search_url: args.search_url.clone(),
            wikipedia_url: args.wikipedia_url.clone(),
            max_steps: args.max_steps,
            max_tokens: args.max_tokens,
            wiki_top_k: args.wiki_top_k,
            wiki_max_chars: args.wiki_max_chars,
            verbose: args.verbose,
        })
    }

    pub fn build_llm(&self) -> Arc<dyn llm::LLM + Send + Sync> {
        match self.provider {
            ProviderKind::Anthropic => Arc::new(
                llm::Anthropic::new(self.api_key.clone(), self.model.clone())
                    .with_max_tokens(self.max_tokens),
            ),
            ProviderKind::Openai => Arc::new(llm::OpenAI::new(&self.api_key, self.model.clone())),
        }
    }
}
