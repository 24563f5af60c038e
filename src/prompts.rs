//! Prompts for both model stages.
//!
//! Centralised so behavioural changes (e.g. tightening the table rules)
//! happen in exactly one place, and so unit tests can assert on prompt
//! construction without a live model.
//!
//! Callers override the scan prompt via
//! [`crate::config::AnalyzerConfig::scan_prompt`] and the analysis
//! instruction via the request's `custom_prompt`; the constants here apply
//! only when no override is provided.

/// Default prompt for the scan stage: transcribe one rendered page.
///
/// The vision model is asked for plain text rather than markup, but must
/// still describe non-textual content — diagrams, charts, embedded images —
/// so the analysis stage sees the whole page, not just its text layer.
pub const DEFAULT_SCAN_PROMPT: &str = "\
Transcribe this document page completely and accurately as plain text.

Rules:
- Preserve all text in natural reading order.
- Render tables row by row, separating cells with \" | \".
- For every diagram, chart, or image, write a concise description of what \
it shows, prefixed with [Figure].
- Do not add commentary, headers, or page numbers of your own.
- Output only the page content.";

/// Default instruction for the analysis stage, used when the request
/// carries no custom prompt.
pub const DEFAULT_ANALYSIS_INSTRUCTION: &str = "\
Summarize the key content of this document. Cover the main topics, the \
essential points, and any figures or tables that carry important \
information.";

/// Marker appended when the document text was cut to fit the analysis
/// model's input budget. `{sent}` and `{total}` are formatted in by
/// [`truncation_marker`].
pub const TRUNCATION_MARKER_PREFIX: &str = "[TRUNCATED: analysis input limited to";

/// Render the truncation marker for a document cut from `total` to `sent`
/// characters.
pub fn truncation_marker(sent: usize, total: usize) -> String {
    format!("{TRUNCATION_MARKER_PREFIX} {sent} of {total} characters]")
}

/// Build the full analysis prompt from an instruction and the document
/// text.
pub fn analysis_prompt(instruction: &str, document_text: &str) -> String {
    format!("{instruction}\n\nDocument:\n\n{document_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_contains_both_parts() {
        let p = analysis_prompt("Find the risks.", "page one text");
        assert!(p.starts_with("Find the risks."));
        assert!(p.contains("page one text"));
    }

    #[test]
    fn truncation_marker_reports_counts() {
        let m = truncation_marker(24_000, 31_544);
        assert!(m.starts_with(TRUNCATION_MARKER_PREFIX));
        assert!(m.contains("24000 of 31544"));
    }

    #[test]
    fn scan_prompt_asks_for_figures() {
        assert!(DEFAULT_SCAN_PROMPT.contains("[Figure]"));
    }
}
