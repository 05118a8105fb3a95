//! Markdown digest and chat message rendering.
//!
//! Strategies appear in the order they were scored; no ranking is applied.

use std::fmt::Write;

use strategy_scout_shared::{Classification, Dimension, RunDate, ScoredStrategy};

/// Headline counts for one digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub scanned: usize,
    pub novel: usize,
    pub similar: usize,
    pub duplicate: usize,
    pub excluded: usize,
}

impl DigestStats {
    pub fn from_batch(batch: &[ScoredStrategy]) -> Self {
        let mut stats = Self {
            scanned: batch.len(),
            ..Self::default()
        };
        for s in batch {
            match s.deduped.classification {
                Classification::Novel => stats.novel += 1,
                Classification::Similar => stats.similar += 1,
                Classification::Duplicate => stats.duplicate += 1,
            }
            if s.feasibility.exclusion_flag {
                stats.excluded += 1;
            }
        }
        stats
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "N/A",
    }
}

/// Render the full Markdown digest.
pub fn render_digest(date: RunDate, batch: &[ScoredStrategy]) -> String {
    let stats = DigestStats::from_batch(batch);
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "# Strategy Scout: Daily Digest");
    let _ = writeln!(out, "**Date:** {date}");
    let _ = writeln!(out, "**Strategies scanned:** {}", stats.scanned);
    let _ = writeln!(
        out,
        "**Novel:** {} | **Similar:** {} | **Duplicate:** {} | **Excluded:** {}",
        stats.novel, stats.similar, stats.duplicate, stats.excluded
    );
    let _ = writeln!(out, "\n---\n");

    if batch.is_empty() {
        let _ = writeln!(out, "*No new strategies found today.*");
        return out;
    }

    for (i, scored) in batch.iter().enumerate() {
        let summary = &scored.deduped.summary;
        let feasibility = &scored.feasibility;

        let _ = writeln!(out, "## {}. {}\n", i + 1, summary.id);

        let _ = writeln!(out, "### Concept\n{}\n", summary.concept);

        let _ = writeln!(out, "### Implementation Blueprint");
        let _ = writeln!(out, "- Entry: {}", or_na(summary.entry_logic.as_deref()));
        let _ = writeln!(out, "- Exit: {}", or_na(summary.exit_logic.as_deref()));
        let _ = writeln!(out, "- Timeframe: {}", or_na(summary.timeframe.as_deref()));
        let _ = writeln!(out, "- Asset class: {}", or_na(summary.asset_class.as_deref()));
        let _ = writeln!(
            out,
            "- Data requirements: {}",
            or_na(summary.data_requirements.as_deref())
        );
        let _ = writeln!(out, "- Compatibility: {}\n", or_na(summary.compatibility.as_deref()));

        let _ = writeln!(out, "### Indicators");
        match summary.indicators.as_deref() {
            Some(list) if !list.is_empty() => {
                let _ = writeln!(out, "{}\n", list.join(", "));
            }
            _ => {
                let _ = writeln!(out, "None detected\n");
            }
        }

        let _ = writeln!(out, "### Feasibility\n");
        let _ = writeln!(out, "| Dimension | Score |");
        let _ = writeln!(out, "|-----------|-------|");
        for dimension in Dimension::ALL {
            let marker = if feasibility.defaulted.contains(&dimension) {
                " (default)"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "| {} | {}/10{marker} |",
                dimension.label(),
                feasibility.get(dimension)
            );
        }
        let _ = writeln!(out, "| **Total** | **{}/50** |\n", feasibility.total);

        if let Some(keyword) = &feasibility.matched_keyword {
            let _ = writeln!(out, "> **Excluded:** matched keyword `{keyword}`\n");
        }

        let novelty = match &scored.deduped.duplicate_of {
            Some(other) => format!(
                "{} (similarity: {:.2}, matches {other})",
                scored.deduped.classification, scored.deduped.similarity_score
            ),
            None => format!(
                "{} (similarity: {:.2})",
                scored.deduped.classification, scored.deduped.similarity_score
            ),
        };
        let _ = writeln!(out, "**Novelty:** {novelty}\n");
        let _ = writeln!(out, "---\n");
    }

    out
}

/// Render the short chat message, truncated to `max_chars` characters.
pub fn render_message(date: RunDate, batch: &[ScoredStrategy], max_chars: usize) -> String {
    let stats = DigestStats::from_batch(batch);
    let mut out = String::new();

    let _ = writeln!(out, "*Strategy Scout: {date}*");
    let _ = writeln!(
        out,
        "{} scanned, {} novel, {} similar, {} duplicate\n",
        stats.scanned, stats.novel, stats.similar, stats.duplicate
    );

    if batch.is_empty() {
        let _ = writeln!(out, "No new strategies found today.");
        return truncate(out, max_chars);
    }

    for (i, scored) in batch.iter().enumerate() {
        let summary = &scored.deduped.summary;
        let flag = if scored.feasibility.exclusion_flag {
            " [excluded]"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "*{}.* {} {}/50 | {}{flag}",
            i + 1,
            escape_markdown(&summary.id),
            scored.feasibility.total,
            scored.deduped.classification
        );
        let concept: String = summary.concept.chars().take(120).collect();
        let _ = writeln!(out, "   {}\n", escape_markdown(&concept));
    }

    truncate(out, max_chars)
}

/// Backslash-escape the characters Telegram's Markdown mode treats as markup.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Cut `text` to at most `max_chars` characters, ending with `...` when cut.
fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(3);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("...");
    cut
}
