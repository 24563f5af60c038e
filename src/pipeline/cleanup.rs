//! Deterministic cleanup of vision-model page transcriptions.
//!
//! Even well-prompted models occasionally wrap output in code fences,
//! emit Windows line endings, or sprinkle invisible Unicode into the text.
//! These rules are cheap, deterministic string passes that fix model quirks
//! without touching content, so `text_content` stays reproducible for
//! identical model output.
//!
//! Rule order matters: fences are stripped before whitespace passes so the
//! later rules see clean input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page's raw model output.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim outer whitespace
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip an outer code fence ────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCE.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Strip invisible Unicode ──────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' | '\u{2060}'
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_outer_fence() {
        let input = "```text\nPage content here\n```";
        assert_eq!(clean_text(input), "Page content here");
    }

    #[test]
    fn leaves_inner_fences_alone() {
        let input = "intro\n```\ncode\n```\noutro";
        assert_eq!(clean_text(input), input);
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_blank_runs() {
        let input = "a\n\n\n\n\n\nb";
        assert_eq!(clean_text(input), "a\n\n\nb");
    }

    #[test]
    fn removes_invisible_chars() {
        let input = "he\u{200B}llo\u{FEFF} world\u{00AD}";
        assert_eq!(clean_text(input), "hello world");
    }

    #[test]
    fn idempotent_on_clean_input() {
        let once = clean_text("Plain page text.\nSecond line.");
        assert_eq!(clean_text(&once), once);
    }
}
