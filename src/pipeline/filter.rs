use crate::docx::document::DocxDocument;
use crate::ir::FilteredParagraph;
use crate::runlog::RunLog;
use crate::textutil::{is_all_uppercase, is_meaningful, word_count};

/// Select the paragraphs worth sending to the model.
///
/// Rule order matters:
/// 1. An orphaned decorative initial — a paragraph that is exactly one
///    uppercase letter whose immediate successor starts with an uppercase
///    letter — is physically removed from the document.
/// 2. Empty, whitespace-only, or letterless/digitless paragraphs are
///    skipped in place.
/// 3. Single-word paragraphs are skipped unless all-uppercase or styled as
///    a heading.
///
/// Skipped paragraphs stay in the document untranslated. The returned
/// indices are ordinals in the document as it stands after removals.
pub fn filter_document(doc: &mut DocxDocument, log: &RunLog) -> Vec<FilteredParagraph> {
    let orphans = orphan_initial_ordinals(doc);
    if !orphans.is_empty() {
        log.push(format!("filter: removed {} orphan initial(s)", orphans.len()));
        doc.remove_paragraphs(&orphans);
    }

    let mut kept: Vec<FilteredParagraph> = Vec::new();
    let mut skipped = 0usize;
    for (index, para) in doc.paragraphs().enumerate() {
        let text = para.text();
        if text.trim().is_empty() || !is_meaningful(&text) {
            skipped += 1;
            continue;
        }
        if word_count(&text) <= 1 && !is_all_uppercase(&text) && !has_heading_style(para.style()) {
            skipped += 1;
            continue;
        }
        kept.push(FilteredParagraph { index, text });
    }
    log.push(format!(
        "filter: {} translatable paragraph(s), {} skipped",
        kept.len(),
        skipped
    ));
    kept
}

fn has_heading_style(style: Option<&str>) -> bool {
    style.is_some_and(|s| s.trim().to_ascii_lowercase().starts_with("heading"))
}

fn orphan_initial_ordinals(doc: &DocxDocument) -> Vec<usize> {
    let texts: Vec<String> = doc.paragraphs().map(|p| p.text()).collect();
    let mut out = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        if !is_single_uppercase_letter(text) {
            continue;
        }
        let follower_starts_upper = texts
            .get(i + 1)
            .and_then(|t| t.chars().next())
            .is_some_and(|c| c.is_uppercase());
        if follower_starts_upper {
            out.push(i);
        }
    }
    out
}

fn is_single_uppercase_letter(text: &str) -> bool {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_alphabetic() && c.is_uppercase(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::testsupport::{doc_with_body, simple_para};

    fn texts_of(filtered: &[FilteredParagraph]) -> Vec<&str> {
        filtered.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn orphan_initial_is_physically_removed() {
        let body = format!(
            "{}{}",
            simple_para("A", None),
            simple_para("Brief history of everything.", None)
        );
        let mut doc = doc_with_body(&body);
        let filtered = filter_document(&mut doc, &RunLog::new());

        assert_eq!(doc.paragraph_count(), 1);
        assert_eq!(texts_of(&filtered), vec!["Brief history of everything."]);
        assert_eq!(filtered[0].index, 0);
    }

    #[test]
    fn orphan_letter_without_uppercase_follower_stays() {
        let body = format!("{}{}", simple_para("A", None), simple_para("quiet start", None));
        let mut doc = doc_with_body(&body);
        let filtered = filter_document(&mut doc, &RunLog::new());

        assert_eq!(doc.paragraph_count(), 2);
        // "A" survives removal but is a single word kept only by the
        // all-uppercase escape of rule 3.
        assert_eq!(texts_of(&filtered), vec!["A", "quiet start"]);
    }

    #[test]
    fn empty_and_decorative_paragraphs_are_skipped_in_place() {
        let body = format!(
            "{}{}{}{}",
            simple_para("", None),
            simple_para("   ", None),
            simple_para("* * *", None),
            simple_para("Actual prose to keep here.", None)
        );
        let mut doc = doc_with_body(&body);
        let filtered = filter_document(&mut doc, &RunLog::new());

        assert_eq!(doc.paragraph_count(), 4);
        assert_eq!(texts_of(&filtered), vec!["Actual prose to keep here."]);
        assert_eq!(filtered[0].index, 3);
    }

    #[test]
    fn single_word_rules() {
        let body = format!(
            "{}{}{}{}",
            simple_para("lonely", None),
            simple_para("PROLOGUE", None),
            simple_para("Chapter", Some("Heading1")),
            simple_para("two words", None)
        );
        let mut doc = doc_with_body(&body);
        let filtered = filter_document(&mut doc, &RunLog::new());

        assert_eq!(texts_of(&filtered), vec!["PROLOGUE", "Chapter", "two words"]);
    }

    #[test]
    fn heading_style_match_is_case_insensitive() {
        assert!(has_heading_style(Some("Heading2")));
        assert!(has_heading_style(Some("heading9")));
        assert!(has_heading_style(Some("HEADINGTitle")));
        assert!(!has_heading_style(Some("Title")));
        assert!(!has_heading_style(None));
    }

    #[test]
    fn filter_is_idempotent() {
        let body = format!(
            "{}{}{}{}",
            simple_para("A", None),
            simple_para("Brave new paragraph.", None),
            simple_para("* * *", None),
            simple_para("Another paragraph follows.", None)
        );
        let mut doc = doc_with_body(&body);
        let first = filter_document(&mut doc, &RunLog::new());
        let second = filter_document(&mut doc, &RunLog::new());

        assert_eq!(texts_of(&first), texts_of(&second));
        let idx_first: Vec<usize> = first.iter().map(|f| f.index).collect();
        let idx_second: Vec<usize> = second.iter().map(|f| f.index).collect();
        assert_eq!(idx_first, idx_second);
    }
}
