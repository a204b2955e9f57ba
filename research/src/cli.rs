use crate::assistant::{ResearchAssistant, ResearchRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{Exporter, render_text};
use crate::output::{self, RawOutput, ResearchResult};
use std::io::{BufRead, Write};
use std::path::Path;

/// Prints `question` and reads one trimmed line of input.
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Parses a raw answer; on failure the raw output is written next to the error so model
/// drift can be inspected.
fn parse_or_report<W: Write>(raw: &RawOutput, err_out: &mut W) -> Result<ResearchResult> {
    match output::parse(raw) {
        Ok(result) => Ok(result),
        Err(err) => {
            tracing::warn!(raw = %err.raw, "model output did not match the schema");
            writeln!(err_out, "Error parsing response: {}\nRaw Response: {}", err, err.raw)?;
            Err(err.into())
        }
    }
}

pub async fn ask(
    config: &Config,
    name: Option<String>,
    query: Option<String>,
    export: bool,
) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();

    let name = match name {
        Some(name) => name,
        None => prompt(&mut input, &mut out, "Please type in your name: ")?,
    };
    let query = match query {
        Some(query) => query,
        None => prompt(
            &mut input,
            &mut out,
            &format!("What can I help you with, {}? ", name),
        )?,
    };
    drop(input);

    if query.trim().is_empty() {
        return Err(Error::Config("a research question is required".to_string()));
    }

    let assistant = ResearchAssistant::from_config(config);
    let invocation = assistant
        .invoke(&ResearchRequest {
            requester_name: name.clone(),
            query,
        })
        .await?;
    tracing::info!(tools = ?invocation.tools_invoked, "research finished");

    let result = parse_or_report(&invocation.raw, &mut std::io::stderr())?;
    write!(out, "{}", render_text(&result))?;

    if export {
        let artifact = Exporter::new(&config.downloads_dir).export(&result, &name)?;
        writeln!(out, "\nSaved {}", artifact.text_path.display())?;
        if let Some(pdf) = artifact.pdf_path {
            writeln!(out, "Saved {}", pdf.display())?;
        }
    }

    Ok(())
}

/// Re-parses a provider answer saved to disk, without calling the provider.
pub fn replay(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let raw = RawOutput::from_saved(&content);
    let result = parse_or_report(&raw, &mut std::io::stderr())?;
    print!("{}", render_text(&result));
    Ok(())
}
