use std::collections::HashMap;

/// A paragraph that survived the filter and is eligible for translation.
///
/// `index` is the paragraph's ordinal position in the document (after any
/// physical removals the filter performed). `text` keeps every whitespace
/// character of the source, leading and trailing included.
#[derive(Clone, Debug)]
pub struct FilteredParagraph {
    pub index: usize,
    pub text: String,
}

/// Planner's read on the region ahead of a batch boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Simple,
    Moderate,
    Complex,
}

/// A contiguous slice of the filtered sequence, translated in one LLM call.
#[derive(Clone, Debug)]
pub struct Batch {
    pub id: usize,
    pub members: Vec<FilteredParagraph>,
    pub use_robust: bool,
    pub estimated_tokens: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ParagraphComplexity {
    pub score: u32,
    pub is_complex: bool,
    pub has_inline_formatting: bool,
    pub run_count: usize,
}

/// Outcome of one batch, reconciled so `translations.len()` equals the
/// batch's member count.
///
/// `run_texts[i]` carries the robust path's recovered run-index → text table
/// for member `i`, or `None` when the markers were lost (or the batch ran on
/// the standard path). A failed batch echoes the members' source texts.
#[derive(Clone, Debug)]
pub struct BatchResult {
    pub batch_id: usize,
    pub translations: Vec<String>,
    pub run_texts: Vec<Option<HashMap<usize, String>>>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub failed: bool,
    pub logs: Vec<String>,
}

impl BatchResult {
    pub fn failed_with_sources(batch: &Batch, logs: Vec<String>) -> Self {
        Self {
            batch_id: batch.id,
            translations: batch.members.iter().map(|m| m.text.clone()).collect(),
            run_texts: vec![None; batch.members.len()],
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            failed: true,
            logs,
        }
    }
}

/// Cumulative token counters for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl UsageTotals {
    pub fn absorb(&mut self, result: &BatchResult) {
        self.input += result.input_tokens;
        self.output += result.output_tokens;
        self.total += result.total_tokens;
    }
}
