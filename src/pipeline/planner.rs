use crate::config::EngineConfig;
use crate::docx::document::{DocxDocument, Paragraph};
use crate::ir::{Batch, FilteredParagraph, ParagraphComplexity, SectionKind};
use crate::runlog::RunLog;
use crate::textutil::leading_whitespace_count;

/// Deliberately rough: one token per four bytes, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

pub fn paragraph_complexity(para: &Paragraph) -> ParagraphComplexity {
    let run_count = para.run_count();
    let text = para.text();

    let mut score = 0u32;
    if run_count > 2 {
        score += 3;
    }
    let newlines = text.chars().filter(|&c| c == '\n').count();
    if newlines > 2 || leading_whitespace_count(&text) > 2 {
        score += 2;
    }
    let emphasized_runs = para.runs().filter(|r| r.format.has_emphasis()).count();
    if emphasized_runs > 1 {
        score += 2;
    }

    let has_inline_formatting =
        run_count > 1 && para.runs().any(|r| r.format.has_explicit_format());

    ParagraphComplexity {
        score,
        is_complex: score >= 3,
        has_inline_formatting,
        run_count,
    }
}

fn classify_section(window: &[ParagraphComplexity]) -> SectionKind {
    if window.is_empty() {
        return SectionKind::Simple;
    }
    let n = window.len() as f64;
    let complex_ratio = window.iter().filter(|c| c.is_complex).count() as f64 / n;
    let inline_ratio = window.iter().filter(|c| c.has_inline_formatting).count() as f64 / n;

    if complex_ratio < 0.2 && inline_ratio < 0.3 {
        SectionKind::Simple
    } else if complex_ratio > 0.4 || inline_ratio > 0.5 {
        SectionKind::Complex
    } else {
        SectionKind::Moderate
    }
}

fn section_params(cfg: &EngineConfig, kind: SectionKind) -> (usize, bool) {
    match kind {
        SectionKind::Simple => (cfg.token_target_simple, false),
        SectionKind::Moderate => (cfg.token_target_moderate, true),
        SectionKind::Complex => (cfg.token_target_complex, true),
    }
}

/// Cut the filtered sequence into contiguous batches.
///
/// At every batch boundary the next `window_size` paragraphs are analyzed to
/// pick a token target and the translation path. Paragraphs are then
/// accumulated greedily until the next one would overflow the target; a
/// paragraph is never split, so one that alone exceeds the target becomes a
/// singleton batch. A just-closed batch is upgraded to the robust path when
/// its own run density says so, even inside a simple section.
pub fn plan_batches(
    doc: &DocxDocument,
    filtered: &[FilteredParagraph],
    cfg: &EngineConfig,
    log: &RunLog,
) -> Vec<Batch> {
    let complexities: Vec<ParagraphComplexity> = filtered
        .iter()
        .map(|fp| {
            doc.paragraph(fp.index)
                .map(paragraph_complexity)
                .unwrap_or(ParagraphComplexity {
                    score: 0,
                    is_complex: false,
                    has_inline_formatting: false,
                    run_count: 1,
                })
        })
        .collect();

    let mut batches: Vec<Batch> = Vec::new();
    let mut i = 0usize;
    while i < filtered.len() {
        let window_end = (i + cfg.window_size).min(filtered.len());
        let kind = classify_section(&complexities[i..window_end]);
        let (target, mut use_robust) = section_params(cfg, kind);

        let mut members: Vec<FilteredParagraph> = Vec::new();
        let mut member_complexities: Vec<ParagraphComplexity> = Vec::new();
        let mut tokens = 0usize;
        while i < filtered.len() {
            let next_tokens = estimate_tokens(&filtered[i].text);
            if !members.is_empty() && tokens + next_tokens > target {
                break;
            }
            members.push(filtered[i].clone());
            member_complexities.push(complexities[i]);
            tokens += next_tokens;
            i += 1;
        }

        if batch_is_run_dense(&member_complexities) {
            use_robust = true;
        }

        // The loop structure emits the trailing in-flight batch: members is
        // non-empty whenever the outer loop was entered.
        batches.push(Batch {
            id: batches.len(),
            members,
            use_robust,
            estimated_tokens: tokens,
        });
    }

    let robust = batches.iter().filter(|b| b.use_robust).count();
    log.push(format!(
        "planner: {} batch(es), {} robust, {} paragraph(s)",
        batches.len(),
        robust,
        filtered.len()
    ));
    batches
}

/// Local upgrade rule, independent of the section analysis.
fn batch_is_run_dense(members: &[ParagraphComplexity]) -> bool {
    if members.is_empty() {
        return false;
    }
    let n = members.len() as f64;
    let avg_runs = members.iter().map(|c| c.run_count).sum::<usize>() as f64 / n;
    let dense_frac = members.iter().filter(|c| c.run_count > 2).count() as f64 / n;
    avg_runs > 2.5 || dense_frac > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::testsupport::{doc_with_body, simple_para};

    fn filtered_all(doc: &DocxDocument) -> Vec<FilteredParagraph> {
        doc.paragraphs()
            .enumerate()
            .map(|(index, p)| FilteredParagraph {
                index,
                text: p.text(),
            })
            .collect()
    }

    fn plan(doc: &DocxDocument, cfg: &EngineConfig) -> Vec<Batch> {
        plan_batches(doc, &filtered_all(doc), cfg, &RunLog::new())
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn complexity_scores_follow_the_rules() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>a</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>b</w:t></w:r><w:r><w:t>c</w:t></w:r></w:p>"#;
        let doc = doc_with_body(body);
        let c = paragraph_complexity(doc.paragraph(0).unwrap());
        // 3 runs (+3) and two emphasized runs (+2).
        assert_eq!(c.score, 5);
        assert!(c.is_complex);
        assert!(c.has_inline_formatting);
        assert_eq!(c.run_count, 3);
    }

    #[test]
    fn indented_paragraph_scores_for_leading_whitespace() {
        let doc = doc_with_body(&simple_para("    indented verse line", None));
        let c = paragraph_complexity(doc.paragraph(0).unwrap());
        assert_eq!(c.score, 2);
        assert!(!c.is_complex);
    }

    #[test]
    fn every_filtered_paragraph_lands_in_exactly_one_batch() {
        let body: String = (0..40)
            .map(|i| simple_para(&format!("Paragraph number {i} with some length to it."), None))
            .collect();
        let doc = doc_with_body(&body);
        let cfg = EngineConfig {
            token_target_simple: 50,
            ..EngineConfig::default()
        };
        let batches = plan(&doc, &cfg);

        let member_total: usize = batches.iter().map(|b| b.members.len()).sum();
        assert_eq!(member_total, 40);

        let mut seen = Vec::new();
        for b in &batches {
            for m in &b.members {
                seen.push(m.index);
            }
        }
        let expected: Vec<usize> = (0..40).collect();
        assert_eq!(seen, expected, "batches must be contiguous and ordered");
    }

    #[test]
    fn trailing_partial_batch_is_emitted() {
        let body = format!(
            "{}{}",
            simple_para(&"long paragraph text ".repeat(40), None),
            simple_para("short tail.", None)
        );
        let doc = doc_with_body(&body);
        let cfg = EngineConfig {
            token_target_simple: 150,
            ..EngineConfig::default()
        };
        let batches = plan(&doc, &cfg);

        assert!(!batches.is_empty());
        let last = batches.last().unwrap();
        assert_eq!(last.members.last().unwrap().text, "short tail.");
    }

    #[test]
    fn oversized_paragraph_forms_a_singleton_batch() {
        let body = format!(
            "{}{}",
            simple_para(&"x".repeat(4000), None),
            simple_para("after", None)
        );
        let doc = doc_with_body(&body);
        let cfg = EngineConfig {
            token_target_simple: 100,
            ..EngineConfig::default()
        };
        let batches = plan(&doc, &cfg);
        assert_eq!(batches[0].members.len(), 1);
        assert!(batches[0].estimated_tokens > 100);
    }

    #[test]
    fn single_run_paragraphs_stay_on_the_standard_path() {
        let body: String = (0..10)
            .map(|i| simple_para(&format!("Plain paragraph {i}."), None))
            .collect();
        let doc = doc_with_body(&body);
        let batches = plan(&doc, &EngineConfig::default());
        assert!(batches.iter().all(|b| !b.use_robust));
    }

    #[test]
    fn run_dense_batch_upgrades_to_robust_in_simple_section() {
        // A dense two-paragraph cluster at the front, then enough plain
        // prose that the window still reads SIMPLE (complex ratio 2/32).
        let mut body = String::new();
        for _ in 0..2 {
            body.push_str(
                r#"<w:p><w:r><w:t>a</w:t></w:r><w:r><w:t>b</w:t></w:r><w:r><w:t>c</w:t></w:r></w:p>"#,
            );
        }
        for i in 0..30 {
            body.push_str(&simple_para(&format!("Plain paragraph number {i}."), None));
        }
        let doc = doc_with_body(&body);
        let cfg = EngineConfig {
            // Tight target so the dense cluster closes its own batch.
            token_target_simple: 3,
            ..EngineConfig::default()
        };
        let batches = plan(&doc, &cfg);
        let first = &batches[0];
        assert!(first.members.iter().all(|m| m.text == "abc"));
        assert!(first.use_robust, "locally dense batch must upgrade");
        // The rest of the simple section stays on the standard path.
        assert!(batches[1..].iter().all(|b| !b.use_robust));
    }

    #[test]
    fn planner_is_deterministic() {
        let body: String = (0..25)
            .map(|i| simple_para(&format!("Sentence {i} repeated for determinism."), None))
            .collect();
        let doc = doc_with_body(&body);
        let cfg = EngineConfig {
            token_target_simple: 60,
            ..EngineConfig::default()
        };
        let a = plan(&doc, &cfg);
        let b = plan(&doc, &cfg);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.members.len(), y.members.len());
            assert_eq!(x.use_robust, y.use_robust);
            assert_eq!(x.estimated_tokens, y.estimated_tokens);
        }
    }

    #[test]
    fn zero_paragraphs_means_zero_batches() {
        let doc = doc_with_body("");
        let batches = plan(&doc, &EngineConfig::default());
        assert!(batches.is_empty());
    }
}
