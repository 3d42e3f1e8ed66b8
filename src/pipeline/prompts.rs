use crate::docx::document::{DocxDocument, RunFormat};
use crate::ir::Batch;
use crate::sentinels::{run_close, run_open, translation_end, translation_start};

/// `{{var}}` substitution, no templating engine needed.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

/// The delimiter-based output format is deliberate: asking for JSON makes
/// providers normalize whitespace, which corrupts indentation and joins
/// words. Sources are framed with the same delimiters the model must answer
/// with, so an echoing model is already protocol-correct.
const STANDARD_TEMPLATE: &str = r#"You are a professional literary translator. Translate each numbered passage below into {{target_language}}.

Rules:
- Return exactly one translation per passage, in the same order.
- Preserve every space, newline, and indentation character of each passage exactly.
- Do NOT shorten, merge, split, or summarize passages.
- Do NOT translate or alter anything outside the passage markers.
- For each passage {id}, output exactly:
  <<<TRANSLATION_START_{id}>>>the translation, verbatim whitespace included<<<TRANSLATION_END_{id}>>>
- Output nothing else.

PASSAGES:
{{passages}}"#;

const ROBUST_TEMPLATE: &str = r#"You are a professional literary translator. Translate each numbered passage below into {{target_language}}.

Every passage is segmented into formatting runs wrapped as ««RUN{r}:{FLAGS}»»text««/RUN{r}»». The markers carry the formatting; the text between them is what you translate.

Rules:
- Keep every ««RUN...»» and ««/RUN...»» marker verbatim: same ids, same flags, same order, none added or dropped.
- Translate ONLY the text between run markers.
- Preserve every space, newline, and indentation character exactly.
- Do NOT shorten, merge, split, or summarize passages.
- For each passage {id}, output exactly:
  <<<TRANSLATION_START_{id}>>>the marked-up translation<<<TRANSLATION_END_{id}>>>
- Output nothing else.

PASSAGES:
{{passages}}"#;

pub fn build_standard_prompt(batch: &Batch, target_language: &str) -> String {
    let mut passages = String::new();
    for (i, member) in batch.members.iter().enumerate() {
        let id = i + 1;
        passages.push_str(&translation_start(id));
        passages.push_str(&member.text);
        passages.push_str(&translation_end(id));
        passages.push('\n');
    }
    render_template(
        STANDARD_TEMPLATE,
        &[("target_language", target_language), ("passages", &passages)],
    )
}

/// Robust variant: each member's text is re-rendered run by run with the
/// marker protocol so run boundaries survive the round trip.
pub fn build_robust_prompt(doc: &DocxDocument, batch: &Batch, target_language: &str) -> String {
    let mut passages = String::new();
    for (i, member) in batch.members.iter().enumerate() {
        let id = i + 1;
        passages.push_str(&translation_start(id));
        match doc.paragraph(member.index) {
            Some(para) => {
                for (r, run) in para.runs().enumerate() {
                    passages.push_str(&run_open(r, &encode_run_flags(&run.format)));
                    passages.push_str(run.text());
                    passages.push_str(&run_close(r));
                }
            }
            None => passages.push_str(&member.text),
        }
        passages.push_str(&translation_end(id));
        passages.push('\n');
    }
    render_template(
        ROBUST_TEMPLATE,
        &[("target_language", target_language), ("passages", &passages)],
    )
}

/// Compact flag list shown to the model; `PLAIN` when nothing is set.
/// Applying translations never decodes these — formatting is restored from
/// the run snapshots — so the encoding only has to be stable and readable.
pub fn encode_run_flags(format: &RunFormat) -> String {
    let mut flags: Vec<String> = Vec::new();
    if format.bold == Some(true) {
        flags.push("B".to_string());
    }
    if format.italic == Some(true) {
        flags.push("I".to_string());
    }
    if format.underline_active() {
        flags.push("U".to_string());
    }
    if format.strike == Some(true) {
        flags.push("S".to_string());
    }
    match format.vert_align.as_deref() {
        Some("subscript") => flags.push("SUB".to_string()),
        Some("superscript") => flags.push("SUP".to_string()),
        _ => {}
    }
    if format.caps == Some(true) {
        flags.push("CAPS".to_string());
    }
    if format.small_caps == Some(true) {
        flags.push("SMALLCAPS".to_string());
    }
    if let Some(font) = format.font.as_deref() {
        flags.push(format!("F:{font}"));
    }
    if let Some(points) = size_in_points(format.size.as_deref()) {
        flags.push(format!("SZ:{points}"));
    }
    if let Some(color) = format.color.as_deref() {
        if !color.eq_ignore_ascii_case("auto") {
            flags.push(format!("C:{color}"));
        }
    }
    if let Some(hl) = format.highlight.as_deref() {
        flags.push(format!("HL:{hl}"));
    }
    if flags.is_empty() {
        "PLAIN".to_string()
    } else {
        flags.join(",")
    }
}

/// `w:sz` is in half-points; show whole points when they divide evenly.
fn size_in_points(size: Option<&str>) -> Option<String> {
    let half_points: u32 = size?.parse().ok()?;
    if half_points % 2 == 0 {
        Some(format!("{}", half_points / 2))
    } else {
        Some(format!("{}", half_points as f32 / 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::testsupport::doc_with_body;
    use crate::ir::FilteredParagraph;

    fn batch_of(texts: &[&str], use_robust: bool) -> Batch {
        Batch {
            id: 0,
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
    fn standard_prompt_frames_each_passage() {
        let batch = batch_of(&["Hello world.", "    indented\nline"], false);
        let prompt = build_standard_prompt(&batch, "Spanish");
        assert!(prompt.contains("into Spanish"));
        assert!(prompt.contains("<<<TRANSLATION_START_1>>>Hello world.<<<TRANSLATION_END_1>>>"));
        assert!(prompt
            .contains("<<<TRANSLATION_START_2>>>    indented\nline<<<TRANSLATION_END_2>>>"));
    }

    #[test]
    fn robust_prompt_marks_runs_with_flags() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Welcome!</w:t></w:r><w:r><w:t xml:space="preserve"> Here we have </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>italic text</w:t></w:r></w:p>"#;
        let doc = doc_with_body(body);
        let batch = batch_of(&["Welcome! Here we have italic text"], true);
        let prompt = build_robust_prompt(&doc, &batch, "Spanish");
        assert!(prompt.contains(
            "««RUN0:B»»Welcome!««/RUN0»»««RUN1:PLAIN»» Here we have ««/RUN1»»««RUN2:I»»italic text««/RUN2»»"
        ));
    }

    #[test]
    fn flag_encoding_covers_attributes() {
        let format = RunFormat {
            bold: Some(true),
            italic: Some(true),
            underline: Some("single".to_string()),
            strike: Some(true),
            vert_align: Some("superscript".to_string()),
            font: Some("Arial".to_string()),
            size: Some("28".to_string()),
            color: Some("FF0000".to_string()),
            highlight: Some("yellow".to_string()),
            ..RunFormat::default()
        };
        assert_eq!(
            encode_run_flags(&format),
            "B,I,U,S,SUP,F:Arial,SZ:14,C:FF0000,HL:yellow"
        );
    }

    #[test]
    fn plain_run_encodes_as_plain() {
        assert_eq!(encode_run_flags(&RunFormat::default()), "PLAIN");
        let off = RunFormat {
            bold: Some(false),
            underline: Some("none".to_string()),
            ..RunFormat::default()
        };
        assert_eq!(encode_run_flags(&off), "PLAIN");
    }

    #[test]
    fn odd_half_point_sizes_keep_the_fraction() {
        let format = RunFormat {
            size: Some("27".to_string()),
            ..RunFormat::default()
        };
        assert_eq!(encode_run_flags(&format), "SZ:13.5");
    }
}
