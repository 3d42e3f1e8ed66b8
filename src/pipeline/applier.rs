use std::collections::HashMap;

use crate::docx::document::{DocxDocument, Paragraph};
use crate::ir::{Batch, BatchResult};
use crate::runlog::RunLog;
use crate::sentinels::{strip_run_markers, UNTRANSLATED_CLOSE, UNTRANSLATED_OPEN};
use crate::textutil::strip_think_blocks;

/// Write batch results back into the document, in batch order.
///
/// Nothing in here trims: leading and trailing spaces are semantically
/// significant (poetry indentation) and must reach the output file intact.
pub fn apply_results(
    doc: &mut DocxDocument,
    batches: &[Batch],
    results: &[BatchResult],
    log: &RunLog,
) {
    for (batch, result) in batches.iter().zip(results) {
        debug_assert_eq!(batch.id, result.batch_id);
        for (i, member) in batch.members.iter().enumerate() {
            let Some(para) = doc.paragraph_mut(member.index) else {
                log.push(format!(
                    "applier: paragraph {} vanished; batch {} member {i} dropped",
                    member.index, batch.id
                ));
                continue;
            };

            if result.failed {
                wrap_untranslated(para, member.index, log);
                continue;
            }

            let Some(translation) = result.translations.get(i) else {
                log.push(format!(
                    "applier: batch {} returned no item for member {i}",
                    batch.id
                ));
                continue;
            };
            let translation = strip_think_blocks(translation);

            if batch.use_robust {
                match result.run_texts.get(i).and_then(|t| t.as_ref()) {
                    Some(table) if table_covers(table, para.run_count()) => {
                        apply_run_table(para, table);
                        continue;
                    }
                    _ => {
                        log.push(format!(
                            "applier: paragraph {}: run markers lost in translation; falling back to whole-paragraph replacement",
                            member.index
                        ));
                        replace_whole_paragraph(para, &strip_run_markers(&translation));
                        continue;
                    }
                }
            }

            replace_whole_paragraph(para, &translation);
        }
    }
}

/// Standard path: the whole translation goes into the first run, every
/// other run is emptied. Paragraph-level style, alignment, indent and the
/// first run's attributes survive; intra-paragraph variation does not.
fn replace_whole_paragraph(para: &mut Paragraph, translation: &str) {
    for (i, run) in para.runs_mut().enumerate() {
        if i == 0 {
            run.set_text(translation);
        } else {
            run.set_text("");
        }
    }
}

/// Robust path: each run keeps its captured attributes and receives its own
/// translated slice. The caller verified the table covers every run.
fn apply_run_table(para: &mut Paragraph, table: &HashMap<usize, String>) {
    // Indices beyond the real run count are invented and ignored.
    for (r, run) in para.runs_mut().enumerate() {
        if let Some(text) = table.get(&r) {
            run.set_text(text.as_str());
        }
    }
}

fn table_covers(table: &HashMap<usize, String>, run_count: usize) -> bool {
    run_count > 0 && (0..run_count).all(|r| table.contains_key(&r))
}

/// Failed batch: the source text stays, wrapped in searchable markers on
/// the first and last run. A single-run paragraph gets both on that run.
fn wrap_untranslated(para: &mut Paragraph, index: usize, log: &RunLog) {
    let run_count = para.run_count();
    if run_count == 0 {
        log.push(format!(
            "applier: paragraph {index}: no runs to mark untranslated"
        ));
        return;
    }
    if run_count == 1 {
        log.push(format!(
            "applier: paragraph {index}: single run carries both untranslated markers"
        ));
    }
    for (i, run) in para.runs_mut().enumerate() {
        if i == 0 {
            run.set_text(format!("{UNTRANSLATED_OPEN}{}", run.text()));
        }
        if i == run_count - 1 {
            run.set_text(format!("{}{UNTRANSLATED_CLOSE}", run.text()));
        }
    }
}
