//! Context assembly: turns accepted candidates into the text block placed in
//! the generation prompt.
use super::Candidate;

/// A truncated passage is only worth including with at least this much
/// budget left.
const MIN_PARTIAL_CHARS: usize = 100;

/// Concatenate accepted candidates within a character budget.
///
/// Passages are joined by a blank line. The first passage that does not fit
/// is cut to the remaining budget (suffixed with `...`) when more than
/// [`MIN_PARTIAL_CHARS`] remain, and assembly stops there. With
/// `annotate_scores` every passage is prefixed with its distance. Returns
/// `None` when nothing was included.
pub fn build_context(
    accepted: &[Candidate],
    max_chars: usize,
    annotate_scores: bool,
) -> Option<String> {
    let mut parts = Vec::new();
    let mut used = 0usize;

    for candidate in accepted {
        let text = candidate.content.as_str();
        let len = text.chars().count();

        let passage = if used + len <= max_chars {
            used += len;
            text.to_string()
        } else {
            let remaining = max_chars.saturating_sub(used);
            if remaining > MIN_PARTIAL_CHARS {
                let prefix: String = text.chars().take(remaining).collect();
                parts.push(annotate(&format!("{prefix}..."), candidate, annotate_scores));
            }
            break;
        };

        parts.push(annotate(&passage, candidate, annotate_scores));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn annotate(text: &str, candidate: &Candidate, annotate_scores: bool) -> String {
    if annotate_scores {
        format!("[Score: {:.3}] {text}", candidate.distance)
    } else {
        text.to_string()
    }
}
