//! Text and JSON renderings of published rounds.

use crate::error::Result;
use crate::models::Entry;
use crate::presentation::RoundResults;

/// Render a round as a numbered plain-text list.
pub fn render_plain(results: &RoundResults, hide_sub: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "> {} ({} entries, {}ms)\n",
        results.query,
        results.entries.len(),
        results.elapsed.as_millis()
    ));

    if results.entries.is_empty() {
        let placeholder = results.placeholder.as_deref().unwrap_or("no results");
        output.push_str(&format!("  {}\n", placeholder));
        return output;
    }

    let width = results.entries.len().to_string().len();
    for (index, entry) in results.entries.iter().enumerate() {
        output.push_str(&format!(
            "{:>width$}. {}\n",
            index + 1,
            entry_line(entry, hide_sub),
            width = width
        ));
    }

    output
}

fn entry_line(entry: &Entry, hide_sub: bool) -> String {
    let mut line = entry.label.clone();

    if !hide_sub && !entry.sub.is_empty() {
        line.push_str(&format!(" ({})", entry.sub));
    }

    line.push_str(&format!("  [{} {:.1}]", entry.provider, entry.score_final));
    line
}

/// Render a round as pretty-printed JSON.
pub fn render_json(results: &RoundResults) -> Result<String> {
    serde_json::to_string_pretty(results).map_err(Into::into)
}
