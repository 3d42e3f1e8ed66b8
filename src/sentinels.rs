use std::collections::HashMap;

/// Literal markers wrapped around the runs of a paragraph whose batch
/// exhausted its retries. They make failures searchable in the output DOCX.
pub const UNTRANSLATED_OPEN: &str = "<untranslated>";
pub const UNTRANSLATED_CLOSE: &str = "</untranslated>";

/// Placeholder used when the model returned fewer items than asked for.
pub const MISSING_TRANSLATION: &str = "[Translation missing]";

const RUN_OPEN_LEAD: &str = "««RUN";
const RUN_CLOSE_LEAD: &str = "««/RUN";
const MARKER_TAIL: &str = "»»";

pub fn translation_start(id: usize) -> String {
    format!("<<<TRANSLATION_START_{id}>>>")
}

pub fn translation_end(id: usize) -> String {
    format!("<<<TRANSLATION_END_{id}>>>")
}

pub fn run_open(run_index: usize, flags: &str) -> String {
    format!("{RUN_OPEN_LEAD}{run_index}:{flags}{MARKER_TAIL}")
}

pub fn run_close(run_index: usize) -> String {
    format!("{RUN_CLOSE_LEAD}{run_index}{MARKER_TAIL}")
}

/// Extract the payloads between `<<<TRANSLATION_START_{id}>>>` and
/// `<<<TRANSLATION_END_{id}>>>` for ids 1..=count, in order.
///
/// Payloads are returned verbatim: no trimming, no whitespace normalization.
/// A missing or unterminated pair yields `None` at that position; scanning
/// continues so later ids can still be found. The markers are fixed literals,
/// so a plain substring scan is all this needs.
pub fn parse_delimited(text: &str, count: usize) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = Vec::with_capacity(count);
    let mut cursor = 0usize;
    for id in 1..=count {
        let start_marker = translation_start(id);
        let end_marker = translation_end(id);

        let Some(rel) = text[cursor..].find(&start_marker) else {
            out.push(None);
            continue;
        };
        let payload_start = cursor + rel + start_marker.len();
        let Some(rel_end) = text[payload_start..].find(&end_marker) else {
            out.push(None);
            continue;
        };
        let payload_end = payload_start + rel_end;
        out.push(Some(text[payload_start..payload_end].to_string()));
        cursor = payload_end + end_marker.len();
    }
    out
}

/// Fallback for replies that ignored the delimiter protocol: split the raw
/// response on blank lines. Any stray delimiter tokens inside a block are
/// removed. Lossier than the primary parser, used only when it under-counts.
pub fn split_blank_line_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
        .into_iter()
        .map(|b| strip_delimiter_tokens(&b))
        .filter(|b| !b.trim().is_empty())
        .collect()
}

fn strip_delimiter_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<<<TRANSLATION_") {
        match rest[start..].find(">>>") {
            Some(rel_end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + rel_end + 3..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Recover the `run index → translated text` table from a robust-path
/// payload of the shape `««RUN{r}:{FLAGS}»»text««/RUN{r}»»…`.
///
/// Returns whatever could be recovered; the applier decides whether the
/// table covers the paragraph. Malformed tails are ignored.
pub fn parse_run_markers(payload: &str) -> HashMap<usize, String> {
    let mut table: HashMap<usize, String> = HashMap::new();
    let mut cursor = 0usize;
    while let Some(rel) = payload[cursor..].find(RUN_OPEN_LEAD) {
        let open_at = cursor + rel;
        let head_start = open_at + RUN_OPEN_LEAD.len();
        let Some(colon_rel) = payload[head_start..].find(':') else {
            break;
        };
        let index_str = &payload[head_start..head_start + colon_rel];
        let Ok(run_index) = index_str.parse::<usize>() else {
            cursor = head_start;
            continue;
        };
        let Some(tail_rel) = payload[head_start + colon_rel..].find(MARKER_TAIL) else {
            break;
        };
        let text_start = head_start + colon_rel + tail_rel + MARKER_TAIL.len();

        let close_marker = run_close(run_index);
        let Some(close_rel) = payload[text_start..].find(&close_marker) else {
            break;
        };
        let text_end = text_start + close_rel;
        table.insert(run_index, payload[text_start..text_end].to_string());
        cursor = text_end + close_marker.len();
    }
    table
}

/// Drop every run marker from a robust payload, leaving the plain text.
/// Used when the recovered table does not cover the paragraph and the
/// applier falls back to a whole-paragraph replacement.
pub fn strip_run_markers(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut rest = payload;
    loop {
        let open = rest.find(RUN_OPEN_LEAD);
        let close = rest.find(RUN_CLOSE_LEAD);
        let at = match (open, close) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        let Some(tail_rel) = rest[at..].find(MARKER_TAIL) else {
            break;
        };
        out.push_str(&rest[..at]);
        rest = &rest[at + tail_rel + MARKER_TAIL.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_payloads_keep_whitespace() {
        let raw = format!(
            "{}    hola\n  mundo  {}\n{}second{}",
            translation_start(1),
            translation_end(1),
            translation_start(2),
            translation_end(2),
        );
        let got = parse_delimited(&raw, 2);
        assert_eq!(got[0].as_deref(), Some("    hola\n  mundo  "));
        assert_eq!(got[1].as_deref(), Some("second"));
    }

    #[test]
    fn delimited_missing_item_does_not_block_later_ones() {
        let raw = format!(
            "{}one{}\n{}three{}",
            translation_start(1),
            translation_end(1),
            translation_start(3),
            translation_end(3),
        );
        let got = parse_delimited(&raw, 3);
        assert_eq!(got[0].as_deref(), Some("one"));
        assert_eq!(got[1], None);
        assert_eq!(got[2].as_deref(), Some("three"));
    }

    #[test]
    fn blank_line_fallback_splits_and_strips_tokens() {
        let raw = "first block\nstill first\n\n<<<TRANSLATION_START_2>>>second<<<TRANSLATION_END_2>>>\n\n\nthird";
        let blocks = split_blank_line_blocks(raw);
        assert_eq!(blocks, vec!["first block\nstill first", "second", "third"]);
    }

    #[test]
    fn run_marker_roundtrip() {
        let payload = format!(
            "{}¡Bienvenido!{}{} Aquí tenemos {}{}texto en cursiva{}",
            run_open(0, "B"),
            run_close(0),
            run_open(1, "PLAIN"),
            run_close(1),
            run_open(2, "I"),
            run_close(2),
        );
        let table = parse_run_markers(&payload);
        assert_eq!(table.len(), 3);
        assert_eq!(table[&0], "¡Bienvenido!");
        assert_eq!(table[&1], " Aquí tenemos ");
        assert_eq!(table[&2], "texto en cursiva");
    }

    #[test]
    fn run_marker_parse_survives_truncated_tail() {
        let payload = format!("{}done{}{}cut off...", run_open(0, "B"), run_close(0), run_open(1, "I"));
        let table = parse_run_markers(&payload);
        assert_eq!(table.len(), 1);
        assert_eq!(table[&0], "done");
    }

    #[test]
    fn strip_run_markers_leaves_plain_text() {
        let payload = format!("{}Hello{}{} world{}", run_open(0, "B,SZ:14"), run_close(0), run_open(1, "PLAIN"), run_close(1));
        assert_eq!(strip_run_markers(&payload), "Hello world");
    }
}
