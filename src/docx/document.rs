use std::collections::HashMap;

use anyhow::{anyhow, Context};

use crate::docx::package::DocxPackage;
use crate::docx::xml::{find_attr, parse_events, set_attr, write_events, XmlEvent};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraph-level properties parsed for inspection. The underlying `w:pPr`
/// events are kept verbatim, so serialization preserves them regardless of
/// what this snapshot captures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParagraphFormat {
    pub style: Option<String>,
    pub alignment: Option<String>,
    pub indent_left: Option<String>,
    pub indent_right: Option<String>,
    pub indent_first_line: Option<String>,
    pub indent_hanging: Option<String>,
    pub spacing_before: Option<String>,
    pub spacing_after: Option<String>,
    pub spacing_line: Option<String>,
}

/// Tri-state run formatting: `None` means the attribute is inherited from
/// the style chain, `Some` is an explicit on/off or value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<String>,
    pub strike: Option<bool>,
    pub vert_align: Option<String>,
    pub font: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub highlight: Option<String>,
    pub caps: Option<bool>,
    pub small_caps: Option<bool>,
}

impl RunFormat {
    pub fn underline_active(&self) -> bool {
        matches!(self.underline.as_deref(), Some(v) if !v.eq_ignore_ascii_case("none"))
    }

    /// Bold/italic/underline, the attributes the planner's complexity score
    /// counts.
    pub fn has_emphasis(&self) -> bool {
        self.bold == Some(true) || self.italic == Some(true) || self.underline_active()
    }

    /// Any explicitly set attribute at all.
    pub fn has_explicit_format(&self) -> bool {
        self.bold.is_some()
            || self.italic.is_some()
            || self.underline.is_some()
            || self.strike.is_some()
            || self.vert_align.is_some()
            || self.font.is_some()
            || self.size.is_some()
            || self.color.is_some()
            || self.highlight.is_some()
            || self.caps.is_some()
            || self.small_caps.is_some()
    }
}

/// A `w:r` span. Properties and non-text content (drawings, field chars)
/// are carried as verbatim events; the text itself is a plain string that
/// regenerates `w:t`/`w:tab`/`w:br` elements on write.
#[derive(Clone, Debug)]
pub struct Run {
    attrs: Vec<(String, String)>,
    props: Vec<XmlEvent>,
    extras: Vec<XmlEvent>,
    text: String,
    pub format: RunFormat,
}

impl Run {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    fn events(&self) -> Vec<XmlEvent> {
        let mut out = Vec::with_capacity(self.props.len() + self.extras.len() + 4);
        out.push(XmlEvent::Start {
            name: "w:r".to_string(),
            attrs: self.attrs.clone(),
        });
        out.extend(self.props.iter().cloned());
        out.extend(text_content_events(&self.text));
        out.extend(self.extras.iter().cloned());
        out.push(XmlEvent::end("w:r"));
        out
    }
}

/// Expand a text string back into WordprocessingML content: `\t` becomes
/// `w:tab`, `\n` becomes `w:br`, everything else lands in `w:t` chunks with
/// `xml:space="preserve"` whenever a chunk has edge spaces.
fn text_content_events(text: &str) -> Vec<XmlEvent> {
    let mut out: Vec<XmlEvent> = Vec::new();
    let mut chunk = String::new();

    fn flush(out: &mut Vec<XmlEvent>, chunk: &mut String) {
        if chunk.is_empty() {
            return;
        }
        let mut attrs: Vec<(String, String)> = Vec::new();
        if chunk.starts_with(' ') || chunk.ends_with(' ') {
            set_attr(&mut attrs, "xml:space", "preserve");
        }
        out.push(XmlEvent::Start {
            name: "w:t".to_string(),
            attrs,
        });
        out.push(XmlEvent::text(std::mem::take(chunk)));
        out.push(XmlEvent::end("w:t"));
    }

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut out, &mut chunk);
                out.push(XmlEvent::empty("w:tab"));
            }
            '\n' => {
                flush(&mut out, &mut chunk);
                out.push(XmlEvent::empty("w:br"));
            }
            _ => chunk.push(ch),
        }
    }
    flush(&mut out, &mut chunk);
    out
}

#[derive(Clone, Debug)]
enum ParaChild {
    Raw(Vec<XmlEvent>),
    Run(Run),
}

/// One `w:p`. Runs are modeled, everything else inside the paragraph
/// (bookmarks, hyperlink wrappers, properties) is kept as raw events in
/// original order.
#[derive(Clone, Debug)]
pub struct Paragraph {
    attrs: Vec<(String, String)>,
    children: Vec<ParaChild>,
    pub format: ParagraphFormat,
}

impl Paragraph {
    /// Raw concatenated run text, whitespace intact, no normalization.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let ParaChild::Run(run) = child {
                out.push_str(&run.text);
            }
        }
        out
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.children.iter().filter_map(|c| match c {
            ParaChild::Run(run) => Some(run),
            ParaChild::Raw(_) => None,
        })
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.children.iter_mut().filter_map(|c| match c {
            ParaChild::Run(run) => Some(run),
            ParaChild::Raw(_) => None,
        })
    }

    pub fn run_count(&self) -> usize {
        self.runs().count()
    }

    pub fn style(&self) -> Option<&str> {
        self.format.style.as_deref()
    }

    fn events(&self) -> Vec<XmlEvent> {
        let mut out = Vec::new();
        out.push(XmlEvent::Start {
            name: "w:p".to_string(),
            attrs: self.attrs.clone(),
        });
        for child in &self.children {
            match child {
                ParaChild::Raw(events) => out.extend(events.iter().cloned()),
                ParaChild::Run(run) => out.extend(run.events()),
            }
        }
        out.push(XmlEvent::end("w:p"));
        out
    }
}

#[derive(Clone, Debug)]
enum Block {
    Raw(Vec<XmlEvent>),
    Para(Paragraph),
}

/// The in-memory document: the zip package plus `word/document.xml`
/// decomposed into paragraph and non-paragraph spans. The applier mutates
/// paragraphs in place; `to_bytes` reassembles the part and repacks the zip
/// with every other entry untouched.
pub struct DocxDocument {
    package: DocxPackage,
    blocks: Vec<Block>,
}

impl DocxDocument {
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let package = DocxPackage::from_bytes(bytes)?;
        let entry = package
            .entry(DOCUMENT_PART)
            .ok_or_else(|| anyhow!("missing {DOCUMENT_PART}"))?;
        let events = parse_events(&entry.data).context("parse word/document.xml")?;
        let blocks = split_blocks(&events);
        Ok(Self { package, blocks })
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Para(p) => Some(p),
            Block::Raw(_) => None,
        })
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs().count()
    }

    pub fn paragraph(&self, ordinal: usize) -> Option<&Paragraph> {
        self.paragraphs().nth(ordinal)
    }

    pub fn paragraph_mut(&mut self, ordinal: usize) -> Option<&mut Paragraph> {
        self.blocks
            .iter_mut()
            .filter_map(|b| match b {
                Block::Para(p) => Some(p),
                Block::Raw(_) => None,
            })
            .nth(ordinal)
    }

    /// Physically drop the paragraphs at the given ordinals. Later ordinals
    /// shift down, exactly as if the elements never existed.
    pub fn remove_paragraphs(&mut self, ordinals: &[usize]) {
        if ordinals.is_empty() {
            return;
        }
        let doomed: std::collections::HashSet<usize> = ordinals.iter().copied().collect();
        let mut ordinal = 0usize;
        self.blocks.retain(|b| match b {
            Block::Para(_) => {
                let keep = !doomed.contains(&ordinal);
                ordinal += 1;
                keep
            }
            Block::Raw(_) => true,
        });
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut events: Vec<XmlEvent> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Raw(evs) => events.extend(evs.iter().cloned()),
                Block::Para(p) => events.extend(p.events()),
            }
        }
        let xml = write_events(&events).context("serialize word/document.xml")?;
        let mut replacements = HashMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), xml);
        self.package.to_bytes_with_replacements(&replacements)
    }
}

fn split_blocks(events: &[XmlEvent]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut raw: Vec<XmlEvent> = Vec::new();
    let mut i = 0usize;
    while i < events.len() {
        match &events[i] {
            XmlEvent::Start { name, .. } if name == "w:p" => {
                if !raw.is_empty() {
                    blocks.push(Block::Raw(std::mem::take(&mut raw)));
                }
                let end = subtree_end(events, i);
                blocks.push(Block::Para(parse_paragraph(&events[i..=end])));
                i = end + 1;
            }
            ev => {
                raw.push(ev.clone());
                i += 1;
            }
        }
    }
    if !raw.is_empty() {
        blocks.push(Block::Raw(raw));
    }
    blocks
}

/// Index of the `End` event matching the `Start` at `start_idx`. Depth
/// counting over all start/end pairs; well-formed input guaranteed by the
/// parser.
fn subtree_end(events: &[XmlEvent], start_idx: usize) -> usize {
    let mut depth = 0usize;
    for (i, ev) in events.iter().enumerate().skip(start_idx) {
        match ev {
            XmlEvent::Start { .. } => depth += 1,
            XmlEvent::End { .. } => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    events.len().saturating_sub(1)
}

fn parse_paragraph(span: &[XmlEvent]) -> Paragraph {
    let attrs = match &span[0] {
        XmlEvent::Start { attrs, .. } => attrs.clone(),
        _ => Vec::new(),
    };
    let inner = &span[1..span.len().saturating_sub(1)];

    let mut children: Vec<ParaChild> = Vec::new();
    let mut raw: Vec<XmlEvent> = Vec::new();
    let mut format = ParagraphFormat::default();

    let mut i = 0usize;
    while i < inner.len() {
        match &inner[i] {
            XmlEvent::Start { name, .. } if name == "w:pPr" => {
                let end = subtree_end(inner, i);
                parse_paragraph_format(&inner[i..=end], &mut format);
                raw.extend(inner[i..=end].iter().cloned());
                i = end + 1;
            }
            XmlEvent::Start { name, .. } if name == "w:r" => {
                if !raw.is_empty() {
                    children.push(ParaChild::Raw(std::mem::take(&mut raw)));
                }
                let end = subtree_end(inner, i);
                children.push(ParaChild::Run(parse_run(&inner[i..=end])));
                i = end + 1;
            }
            XmlEvent::Empty { name, attrs } if name == "w:r" => {
                if !raw.is_empty() {
                    children.push(ParaChild::Raw(std::mem::take(&mut raw)));
                }
                children.push(ParaChild::Run(Run {
                    attrs: attrs.clone(),
                    props: Vec::new(),
                    extras: Vec::new(),
                    text: String::new(),
                    format: RunFormat::default(),
                }));
                i += 1;
            }
            ev => {
                raw.push(ev.clone());
                i += 1;
            }
        }
    }
    if !raw.is_empty() {
        children.push(ParaChild::Raw(raw));
    }

    Paragraph {
        attrs,
        children,
        format,
    }
}

fn parse_run(span: &[XmlEvent]) -> Run {
    let attrs = match &span[0] {
        XmlEvent::Start { attrs, .. } => attrs.clone(),
        _ => Vec::new(),
    };
    let inner = &span[1..span.len().saturating_sub(1)];

    let mut props: Vec<XmlEvent> = Vec::new();
    let mut extras: Vec<XmlEvent> = Vec::new();
    let mut text = String::new();
    let mut format = RunFormat::default();

    let mut i = 0usize;
    while i < inner.len() {
        match &inner[i] {
            XmlEvent::Start { name, .. } if name == "w:rPr" => {
                let end = subtree_end(inner, i);
                parse_run_format(&inner[i..=end], &mut format);
                props.extend(inner[i..=end].iter().cloned());
                i = end + 1;
            }
            XmlEvent::Start { name, .. } if name == "w:t" => {
                let end = subtree_end(inner, i);
                for ev in &inner[i..end] {
                    if let XmlEvent::Text { text: t } = ev {
                        text.push_str(t);
                    }
                }
                i = end + 1;
            }
            XmlEvent::Empty { name, .. } if name == "w:t" => {
                i += 1;
            }
            XmlEvent::Empty { name, .. } if name == "w:tab" => {
                text.push('\t');
                i += 1;
            }
            XmlEvent::Empty { name, .. } if name == "w:br" || name == "w:cr" => {
                text.push('\n');
                i += 1;
            }
            XmlEvent::Start { .. } => {
                let end = subtree_end(inner, i);
                extras.extend(inner[i..=end].iter().cloned());
                i = end + 1;
            }
            ev => {
                extras.push(ev.clone());
                i += 1;
            }
        }
    }

    Run {
        attrs,
        props,
        extras,
        text,
        format,
    }
}

fn parse_paragraph_format(span: &[XmlEvent], format: &mut ParagraphFormat) {
    let mut depth = 0usize;
    for ev in span {
        let (name, attrs, enters) = match ev {
            XmlEvent::Start { name, attrs } => (name.as_str(), attrs.as_slice(), true),
            XmlEvent::Empty { name, attrs } => (name.as_str(), attrs.as_slice(), false),
            XmlEvent::End { .. } => {
                depth -= 1;
                continue;
            }
            _ => continue,
        };
        // Only direct children of w:pPr; w:rPr/w:pPrChange subtrees are
        // carried verbatim but not inspected.
        if depth == 1 {
            match name {
                "w:pStyle" => format.style = attr_string(attrs, "w:val"),
                "w:jc" => format.alignment = attr_string(attrs, "w:val"),
                "w:ind" => {
                    format.indent_left =
                        attr_string(attrs, "w:left").or_else(|| attr_string(attrs, "w:start"));
                    format.indent_right =
                        attr_string(attrs, "w:right").or_else(|| attr_string(attrs, "w:end"));
                    format.indent_first_line = attr_string(attrs, "w:firstLine");
                    format.indent_hanging = attr_string(attrs, "w:hanging");
                }
                "w:spacing" => {
                    format.spacing_before = attr_string(attrs, "w:before");
                    format.spacing_after = attr_string(attrs, "w:after");
                    format.spacing_line = attr_string(attrs, "w:line");
                }
                _ => {}
            }
        }
        if enters {
            depth += 1;
        }
    }
}

fn parse_run_format(span: &[XmlEvent], format: &mut RunFormat) {
    let mut depth = 0usize;
    for ev in span {
        let (name, attrs, enters) = match ev {
            XmlEvent::Start { name, attrs } => (name.as_str(), attrs.as_slice(), true),
            XmlEvent::Empty { name, attrs } => (name.as_str(), attrs.as_slice(), false),
            XmlEvent::End { .. } => {
                depth -= 1;
                continue;
            }
            _ => continue,
        };
        if depth == 1 {
            match name {
                "w:b" => format.bold = Some(parse_onoff(attrs)),
                "w:i" => format.italic = Some(parse_onoff(attrs)),
                "w:u" => format.underline = attr_string(attrs, "w:val"),
                "w:strike" => format.strike = Some(parse_onoff(attrs)),
                "w:vertAlign" => format.vert_align = attr_string(attrs, "w:val"),
                "w:rFonts" => {
                    format.font =
                        attr_string(attrs, "w:ascii").or_else(|| attr_string(attrs, "w:hAnsi"));
                }
                "w:sz" => format.size = attr_string(attrs, "w:val"),
                "w:color" => format.color = attr_string(attrs, "w:val"),
                "w:highlight" => format.highlight = attr_string(attrs, "w:val"),
                "w:caps" => format.caps = Some(parse_onoff(attrs)),
                "w:smallCaps" => format.small_caps = Some(parse_onoff(attrs)),
                _ => {}
            }
        }
        if enters {
            depth += 1;
        }
    }
}

fn attr_string(attrs: &[(String, String)], key: &str) -> Option<String> {
    find_attr(attrs, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Toggle properties default to "on" when the value attribute is absent.
fn parse_onoff(attrs: &[(String, String)]) -> bool {
    match find_attr(attrs, "w:val") {
        Some(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s == "0" || s == "false" || s == "off" || s == "none")
        }
        None => true,
    }
}
