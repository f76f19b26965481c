//! Plain-text rendering for the CLI.
use std::fmt::Write;

use crate::rag::SystemInfo;
use crate::retrieval::FilterResult;
use crate::retrieval::filter::BypassReason;

/// Accepted distances listed in the filter report.
const REPORT_DISTANCES: usize = 5;

pub const HELP: &str = "\
Available commands:
  /context        - Add multi-line context (finish with END, abort with CANCEL)
  /clear          - Delete every stored document
  /info           - Show system information
  /model [name]   - Show available models or switch the generation model
  /reload         - Re-read the configuration file
  /help           - Show this help
  /bye            - Exit
Anything else is sent as a question.";

/// Truncate at a character boundary, adding `...` when shortened.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Summary of one filtering pass.
pub fn filter_report(result: &FilterResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Distance filter: {} -> {} candidates",
        result.original_count, result.filtered_count
    );

    if let Some(best) = result.best_distance {
        let _ = writeln!(out, "  best distance: {best:.3}");
    }
    if let Some((min, max)) = result.distance_range {
        let _ = writeln!(out, "  accepted range: {min:.3} - {max:.3}");
    }

    match result.bypass {
        Some(BypassReason::Disabled) => {
            let _ = writeln!(out, "  bypassed: filtering disabled");
        }
        Some(BypassReason::TooFewCandidates { found, required }) => {
            let _ = writeln!(out, "  bypassed: {found} candidates, need {required} to filter");
        }
        None => {
            let names = result.stages.names();
            let stages = if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            };
            let _ = writeln!(out, "  stages applied: {stages}");
        }
    }

    if !result.accepted.is_empty() {
        let shown: Vec<String> = result
            .accepted
            .iter()
            .take(REPORT_DISTANCES)
            .map(|c| format!("{:.3}", c.distance))
            .collect();
        let _ = writeln!(out, "  distances: [{}]", shown.join(", "));
    }

    out.trim_end().to_string()
}

pub fn info_report(info: &SystemInfo) -> String {
    let f = &info.filter;
    let mut out = String::new();
    let _ = writeln!(out, "System information");
    let _ = writeln!(out, "  database:          {}", info.db_path);
    let _ = writeln!(out, "  collection:        {}", info.collection);
    let _ = writeln!(out, "  documents:         {}", info.document_count);
    let _ = writeln!(out, "  embedding model:   {}", info.embedding_model);
    let _ = writeln!(out, "  generation model:  {}", info.generation_model);
    let _ = writeln!(out, "  distance metric:   {:?}", info.distance_metric);
    let _ = writeln!(out, "  max results:       {}", info.max_results);
    let _ = writeln!(out, "  max context chars: {}", info.max_context_chars);
    let _ = writeln!(
        out,
        "  distance filter:   {} (base {}, ratio {}, min {}, fallback {})",
        if f.enabled { "on" } else { "off" },
        f.base_threshold,
        f.dynamic_ratio,
        f.min_results_for_filtering,
        f.fallback_threshold
    );

    if !info.recent.is_empty() {
        let _ = writeln!(out, "  recent documents:");
        for doc in &info.recent {
            let _ = writeln!(
                out,
                "    {} [{}] {}",
                doc.added_at.format("%Y-%m-%d %H:%M"),
                doc.source,
                truncate_str(&doc.content.replace('\n', " "), 60)
            );
        }
    }

    out.trim_end().to_string()
}
