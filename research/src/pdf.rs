use crate::error::{Error, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

// US Letter
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.4;
const FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT: f32 = 5.0;
const PARAGRAPH_GAP: f32 = 3.0;
const WRAP_COLUMNS: usize = 90;

fn pdf_err(err: impl std::fmt::Display) -> Error {
    Error::Pdf(err.to_string())
}

/// Blank-line separated paragraphs of `text`, empty ones dropped.
pub fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n")
        .map(|p| p.trim_matches('\n'))
        .filter(|p| !p.trim().is_empty())
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let mut word = word;
        while word.chars().count() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(width)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            lines.push(word[..split].to_string());
            word = &word[split..];
        }

        if word.is_empty() {
            continue;
        }
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

// Characters the WinAnsi encoding adds outside Latin-1.
const WIN_ANSI_EXTRA: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

fn win_ansi(c: char) -> bool {
    matches!(c, '\n' | '\t' | ' '..='~' | '\u{a0}'..='\u{ff}') || WIN_ANSI_EXTRA.contains(c)
}

/// Replaces characters the builtin font cannot draw with `?`, returning how many were replaced.
pub fn encodable(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let out = text
        .chars()
        .map(|c| {
            if win_ansi(c) {
                c
            } else {
                replaced += 1;
                '?'
            }
        })
        .collect();
    (out, replaced)
}

/// Renders `text` as a paginated pdf at `path`. Paragraph breaks and the line breaks inside
/// each paragraph are preserved.
pub fn render(text: &str, title: &str, path: &Path) -> Result<()> {
    let (text, replaced) = encodable(text);
    if replaced > 0 {
        tracing::warn!(path = %path.display(), replaced, "pdf font cannot draw some characters, replaced with '?'");
    }
    let (title, _) = encodable(title);

    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for paragraph in paragraphs(&text) {
        for line in paragraph.lines().flat_map(|l| wrap(l, WRAP_COLUMNS)) {
            if y < MARGIN {
                let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                layer = doc.get_page(page).get_layer(next);
                y = PAGE_HEIGHT - MARGIN;
            }
            layer.use_text(line, FONT_SIZE, Mm(MARGIN), Mm(y), &font);
            y -= LINE_HEIGHT;
        }
        y -= PARAGRAPH_GAP;
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(pdf_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{encodable, paragraphs, render, wrap};

    #[test]
    fn test_paragraphs_skip_empty() {
        let text = "Topic: X\n\n\n\nSummary:\nline one\nline two\n\n   \n\nSources:\n- a\n";
        let parts: Vec<_> = paragraphs(text).collect();

        assert_eq!(parts, vec!["Topic: X", "Summary:\nline one\nline two", "Sources:\n- a"]);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("the quick brown fox", 10), vec!["the quick", "brown fox"]);
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(wrap("abcdefghijkl mn", 5), vec!["abcde", "fghij", "kl mn"]);
    }

    #[test]
    fn test_encodable_replaces_unsupported_chars() {
        assert_eq!(
            encodable("日本語 café – 10€ 🚀"),
            ("??? café – 10€ ?".to_string(), 4)
        );
        assert_eq!(encodable("Topic: X\n\tplain"), ("Topic: X\n\tplain".to_string(), 0));
    }

    #[test]
    fn test_render_accepts_unsupported_chars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");

        render("Topic: 日本語\n\nSummary:\nlaunch 🚀", "日本語", &path).unwrap();

        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let long = "word ".repeat(2000);

        render(&format!("Topic: X\n\nSummary:\n{}", long), "X", &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
