use std::collections::HashMap;

use crate::ir::{Batch, BatchResult};
use crate::llm::LlmReply;
use crate::sentinels::{
    parse_delimited, parse_run_markers, split_blank_line_blocks, MISSING_TRANSLATION,
};
use crate::textutil::strip_think_blocks;

/// Reply text reduced to one translation per batch member.
pub struct ParsedReply {
    pub translations: Vec<String>,
    pub run_texts: Vec<Option<HashMap<usize, String>>>,
    pub logs: Vec<String>,
    /// Items the primary or fallback parser actually found, before padding.
    /// Zero for a non-empty batch means the reply was unusable and the
    /// attempt should be retried.
    pub recovered: usize,
}

/// Turn a raw model reply into exactly `batch.members.len()` translations.
///
/// The delimiter parser runs first. When it under-counts, the blank-line
/// fallback takes over if it finds more items. Whatever remains short is
/// padded with a placeholder, surplus items are dropped; neither fails the
/// batch, both are logged.
pub fn parse_batch_reply(batch: &Batch, raw: &str) -> ParsedReply {
    let clean = strip_think_blocks(raw);
    let want = batch.members.len();
    let mut logs: Vec<String> = Vec::new();

    let primary = parse_delimited(&clean, want);
    let primary_count = primary.iter().filter(|p| p.is_some()).count();

    let mut translations: Vec<String>;
    let mut recovered = primary_count;
    if primary_count == want {
        translations = primary.into_iter().map(|p| p.unwrap_or_default()).collect();
    } else {
        let blocks = split_blank_line_blocks(&clean);
        if blocks.len() > primary_count {
            logs.push(format!(
                "batch {}: delimiter parse found {primary_count}/{want}; blank-line fallback found {}",
                batch.id,
                blocks.len()
            ));
            recovered = blocks.len().min(want);
            translations = blocks;
        } else {
            logs.push(format!(
                "batch {}: delimiter parse found {primary_count}/{want}; keeping partial items",
                batch.id
            ));
            translations = primary
                .into_iter()
                .map(|p| p.unwrap_or_else(|| MISSING_TRANSLATION.to_string()))
                .collect();
        }
    }

    if translations.len() > want {
        logs.push(format!(
            "batch {}: discarding {} surplus item(s)",
            batch.id,
            translations.len() - want
        ));
        translations.truncate(want);
    }
    if translations.len() < want {
        logs.push(format!(
            "batch {}: padding {} missing item(s)",
            batch.id,
            want - translations.len()
        ));
        translations.resize_with(want, || MISSING_TRANSLATION.to_string());
    }

    let run_texts: Vec<Option<HashMap<usize, String>>> = if batch.use_robust {
        translations
            .iter()
            .map(|t| {
                let table = parse_run_markers(t);
                if table.is_empty() {
                    None
                } else {
                    Some(table)
                }
            })
            .collect()
    } else {
        vec![None; want]
    };

    ParsedReply {
        translations,
        run_texts,
        logs,
        recovered,
    }
}

pub fn build_batch_result(batch: &Batch, reply: &LlmReply, parsed: ParsedReply) -> BatchResult {
    BatchResult {
        batch_id: batch.id,
        translations: parsed.translations,
        run_texts: parsed.run_texts,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        total_tokens: reply.total_tokens,
        failed: false,
        logs: parsed.logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FilteredParagraph;
    use crate::sentinels::{run_close, run_open, translation_end, translation_start};

    fn batch_of(texts: &[&str], use_robust: bool) -> Batch {
        Batch {
            id: 7,
            members: texts
                .iter()
                .enumerate()
                .map(|(index, t)| FilteredParagraph {
                    index,
                    text: t.to_string(),
                })
                .collect(),
            use_robust,
            estimated_tokens: 0,
        }
    }

    #[test]
    fn exact_reply_parses_without_logs() {
        let batch = batch_of(&["one", "two"], false);
        let raw = format!(
            "{}uno{}\n{}dos{}",
            translation_start(1),
            translation_end(1),
            translation_start(2),
            translation_end(2)
        );
        let parsed = parse_batch_reply(&batch, &raw);
        assert_eq!(parsed.translations, vec!["uno", "dos"]);
        assert_eq!(parsed.recovered, 2);
        assert!(parsed.logs.is_empty());
    }

    #[test]
    fn think_blocks_are_stripped_before_parsing() {
        let batch = batch_of(&["one"], false);
        let raw = format!(
            "<think>musing about {} markers</think>{}uno{}",
            translation_start(1),
            translation_start(1),
            translation_end(1)
        );
        let parsed = parse_batch_reply(&batch, &raw);
        assert_eq!(parsed.translations, vec!["uno"]);
    }

    #[test]
    fn under_count_uses_blank_line_fallback() {
        let batch = batch_of(&["one", "two", "three"], false);
        let raw = "uno\n\ndos\n\ntres";
        let parsed = parse_batch_reply(&batch, raw);
        assert_eq!(parsed.translations, vec!["uno", "dos", "tres"]);
        assert_eq!(parsed.recovered, 3);
        assert_eq!(parsed.logs.len(), 1);
    }

    #[test]
    fn partial_primary_beats_worse_fallback() {
        let batch = batch_of(&["one", "two", "three"], false);
        // One well-formed item and no blank-line structure at all.
        let raw = format!("{}uno{}", translation_start(1), translation_end(1));
        let parsed = parse_batch_reply(&batch, &raw);
        assert_eq!(parsed.translations[0], "uno");
        assert_eq!(parsed.translations[1], MISSING_TRANSLATION);
        assert_eq!(parsed.translations[2], MISSING_TRANSLATION);
    }

    #[test]
    fn surplus_fallback_items_are_discarded() {
        let batch = batch_of(&["one"], false);
        let raw = "uno\n\ndos\n\ntres";
        let parsed = parse_batch_reply(&batch, raw);
        assert_eq!(parsed.translations, vec!["uno"]);
    }

    #[test]
    fn empty_reply_recovers_nothing() {
        let batch = batch_of(&["one"], false);
        let parsed = parse_batch_reply(&batch, "");
        assert_eq!(parsed.recovered, 0);
        assert_eq!(parsed.translations, vec![MISSING_TRANSLATION]);
    }

    #[test]
    fn robust_reply_attaches_run_tables() {
        let batch = batch_of(&["Welcome! Here we have italic text"], true);
        let payload = format!(
            "{}Bienvenue !{}{} ici {}",
            run_open(0, "B"),
            run_close(0),
            run_open(1, "I"),
            run_close(1)
        );
        let raw = format!("{}{payload}{}", translation_start(1), translation_end(1));
        let parsed = parse_batch_reply(&batch, &raw);
        let table = parsed.run_texts[0].as_ref().expect("run table");
        assert_eq!(table[&0], "Bienvenue !");
        assert_eq!(table[&1], " ici ");
    }

    #[test]
    fn robust_reply_without_markers_has_no_table() {
        let batch = batch_of(&["text"], true);
        let raw = format!("{}plain translation{}", translation_start(1), translation_end(1));
        let parsed = parse_batch_reply(&batch, &raw);
        assert!(parsed.run_texts[0].is_none());
    }
}
