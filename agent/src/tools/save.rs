use crate::Result;
use crate::llm::Message;
use crate::tools::{FunctionalTool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Appends timestamped records to a single text file. The file is only ever appended to.
pub struct SaveTool {
    path: PathBuf,
}

#[derive(Deserialize, JsonSchema)]
struct SaveArgs {
    /// The text to save
    text: String,
}

impl SaveTool {
    pub fn new(path: impl Into<PathBuf>) -> Box<Self> {
        Box::new(Self { path: path.into() })
    }

    async fn append(&self, text: &str) -> Result<String> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let record = format!(
            "--- Query Output ---\nTimestamp: {}\n\n{}\n\n",
            timestamp, text
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(path = %self.path.display(), "saved research output");

        Ok(format!("Data successfully saved to {}.", self.path.display()))
    }
}

#[async_trait]
impl FunctionalTool for SaveTool {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<SaveArgs>(
            "save_text_to_file",
            "Saves structured web search data to a text file.",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> Result<Message> {
        let args: SaveArgs = call.args()?;
        Ok(Message::Tool {
            id: call.id.clone(),
            name: "save_text_to_file".to_string(),
            result: self.append(&args.text).await?,
        })
    }
}
