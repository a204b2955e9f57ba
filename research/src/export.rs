use crate::error::{Error, Result};
use crate::output::ResearchResult;
use crate::pdf;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Files produced for one research result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub text_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

/// Reduces `input` to a filesystem-safe identifier: only alphanumerics and underscores
/// survive, runs of whitespace become a single underscore.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// The plain-text report written to disk and printed by the cli.
pub fn render_text(result: &ResearchResult) -> String {
    let mut text = String::new();
    let _ = write!(text, "Topic: {}\n\nSummary:\n{}\n\nSources:\n", result.topic, result.summary);
    for source in &result.sources {
        let _ = writeln!(text, "- {}", source);
    }
    text.push_str("\nTools used:\n");
    for tool in &result.tools_used {
        let _ = writeln!(text, "- {}", tool);
    }
    text
}

pub struct Exporter {
    downloads_dir: PathBuf,
}

impl Exporter {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// `research_{name}_{topic}` with both parts sanitized.
    pub fn file_stem(result: &ResearchResult, requester_name: &str) -> String {
        let name = match sanitize(requester_name) {
            name if name.is_empty() => "User".to_string(),
            name => name,
        };
        let topic = match sanitize(&result.topic) {
            topic if topic.is_empty() => "untitled".to_string(),
            topic => topic,
        };
        format!("research_{}_{}", name, topic)
    }

    /// Writes the text report, then tries to derive a pdf from it. A failed pdf is logged
    /// and reported as `pdf_path: None`; a failed text write is an error.
    pub fn export(&self, result: &ResearchResult, requester_name: &str) -> Result<ExportArtifact> {
        std::fs::create_dir_all(&self.downloads_dir)?;

        let stem = Self::file_stem(result, requester_name);
        let text_path = self.downloads_dir.join(format!("{}.txt", stem));
        std::fs::write(&text_path, render_text(result))?;
        tracing::info!(path = %text_path.display(), "wrote text report");

        let pdf_path = text_path.with_extension("pdf");
        let pdf_path = match std::fs::read_to_string(&text_path)
            .map_err(Error::from)
            .and_then(|text| pdf::render(&text, &result.topic, &pdf_path))
        {
            Ok(()) => {
                tracing::info!(path = %pdf_path.display(), "wrote pdf report");
                Some(pdf_path)
            }
            Err(err) => {
                tracing::warn!(path = %pdf_path.display(), error = %err, "pdf rendering failed");
                None
            }
        };

        Ok(ExportArtifact {
            text_path,
            pdf_path,
        })
    }
}
