//! Heading-based section segmenter.
//!
//! Splits generated documentation text into titled [`DocumentSection`]s for
//! structured retrieval. This is a best-effort heuristic, not a parser: it
//! knows nothing about how the agent formatted its answer and may treat an
//! ordinary sentence as a heading or the reverse. It only affects grouping;
//! the stored text is never modified.
//!
//! # Algorithm
//!
//! 1. Split the text into lines and drop blank lines entirely.
//! 2. A line is a heading if it is entirely upper-case, starts with `#`, or
//!    is shorter than 100 characters, ends with `:` or `.` and mentions one
//!    of [`SECTION_KEYWORDS`].
//! 3. A heading closes the open section (kept only if it has content) and
//!    opens a new one titled with the heading text.
//! 4. Any other line is appended to the open section. Lines before the first
//!    heading go to an implicit "Overview" section.
//! 5. When no heading is found at all, the whole text becomes a single
//!    "Documentation" section.
//!
//! # Example
//!
//! ```rust
//! use docsmith::sections::segment;
//!
//! let sections = segment("Installation:\n\ncargo install docsmith\n");
//! assert_eq!(sections.len(), 1);
//! assert_eq!(sections[0].title, "Installation");
//! assert_eq!(sections[0].content, "cargo install docsmith");
//! ```

use std::collections::HashMap;

use crate::models::DocumentSection;

/// Words that mark a short line ending in `:` or `.` as a heading.
pub const SECTION_KEYWORDS: &[&str] = &[
    "overview",
    "introduction",
    "setup",
    "installation",
    "configuration",
    "usage",
    "api",
    "features",
    "components",
    "architecture",
    "deployment",
    "testing",
    "troubleshooting",
];

/// Keyword headings must be shorter than this many characters.
const MAX_KEYWORD_HEADING_CHARS: usize = 100;

const IMPLICIT_TITLE: &str = "Overview";
const FALLBACK_TITLE: &str = "Documentation";

/// Returns `true` if the (trimmed) line looks like a section heading.
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    if line.starts_with('#') {
        return true;
    }
    if is_all_upper(line) {
        return true;
    }
    if line.chars().count() < MAX_KEYWORD_HEADING_CHARS
        && (line.ends_with(':') || line.ends_with('.'))
    {
        let lower = line.to_lowercase();
        return SECTION_KEYWORDS.iter().any(|k| lower.contains(k));
    }
    false
}

/// At least one cased character and none of them lower-case.
fn is_all_upper(line: &str) -> bool {
    let mut has_upper = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_upper = true;
        }
    }
    has_upper
}

/// Title text of a heading line: `#` markers and trailing `:`/`.` removed.
fn heading_title(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_end_matches([':', '.'])
        .trim()
        .to_string()
}

/// Section id derived from a title: lower-case, spaces to `-`, `:`/`.` removed.
pub fn section_id(title: &str) -> String {
    title
        .to_lowercase()
        .replace(' ', "-")
        .replace([':', '.'], "")
}

/// Open section while segmenting.
struct Draft {
    title: String,
    lines: Vec<String>,
}

/// Segment text into ordered, titled sections.
///
/// Deterministic: the same input always yields the same sections. Always
/// returns at least one section.
pub fn segment(text: &str) -> Vec<DocumentSection> {
    let mut drafts: Vec<Draft> = Vec::new();
    let mut current: Option<Draft> = None;
    let mut saw_heading = false;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if is_heading(line) {
            saw_heading = true;
            if let Some(done) = current.take() {
                if !done.lines.is_empty() {
                    drafts.push(done);
                }
            }
            current = Some(Draft {
                title: heading_title(line),
                lines: Vec::new(),
            });
        } else {
            current
                .get_or_insert_with(|| Draft {
                    title: IMPLICIT_TITLE.to_string(),
                    lines: Vec::new(),
                })
                .lines
                .push(line.to_string());
        }
    }

    if let Some(done) = current.take() {
        if !done.lines.is_empty() {
            drafts.push(done);
        }
    }

    if !saw_heading || drafts.is_empty() {
        return vec![DocumentSection {
            id: section_id(FALLBACK_TITLE),
            title: FALLBACK_TITLE.to_string(),
            content: text.to_string(),
        }];
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    drafts
        .into_iter()
        .map(|draft| {
            let base = section_id(&draft.title);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let id = if *count == 1 {
                base
            } else {
                format!("{}-{}", base, count)
            };
            DocumentSection {
                id,
                title: draft.title,
                content: draft.lines.join("\n"),
            }
        })
        .collect()
}

/// Keep only sections whose title or content contains `query`,
/// case-insensitively. A blank query keeps everything.
pub fn filter_sections(sections: Vec<DocumentSection>, query: &str) -> Vec<DocumentSection> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return sections;
    }
    sections
        .into_iter()
        .filter(|s| {
            s.title.to_lowercase().contains(&query) || s.content.to_lowercase().contains(&query)
        })
        .collect()
}
