use anyhow::Context;
use quick_xml::events::{BytesDecl, Event};
use quick_xml::Reader;

/// One event of a WordprocessingML part, kept losslessly enough that an
/// untouched part writes back byte-equivalent modulo entity choices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

impl XmlEvent {
    pub fn start(name: &str) -> Self {
        XmlEvent::Start {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn end(name: &str) -> Self {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    pub fn empty(name: &str) -> Self {
        XmlEvent::Empty {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        XmlEvent::Text { text: text.into() }
    }
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

pub fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: &str) {
    for (k, v) in attrs.iter_mut() {
        if k == key {
            *v = value.to_string();
            return;
        }
    }
    attrs.push((key.to_string(), value.to_string()));
}

pub fn parse_events(xml_bytes: &[u8]) -> anyhow::Result<Vec<XmlEvent>> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                let mut attrs: Vec<(String, String)> = Vec::new();
                for a in s.attributes() {
                    let a = a.context("attr")?;
                    // Attribute values stay raw (already escaped). Unescaping
                    // character references such as `&#13;&#10;` and writing
                    // them back would let XML attribute normalization turn
                    // the newlines into spaces, corrupting values like VML
                    // `o:gfxdata`.
                    attrs.push((bytes_to_string(a.key.as_ref()), bytes_to_string(a.value.as_ref())));
                }
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                let mut attrs: Vec<(String, String)> = Vec::new();
                for a in s.attributes() {
                    let a = a.context("attr")?;
                    attrs.push((bytes_to_string(a.key.as_ref()), bytes_to_string(a.value.as_ref())));
                }
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                events.push(XmlEvent::CData {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::Comment(t) => {
                events.push(XmlEvent::Comment {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                events.push(XmlEvent::PI {
                    content: format!("{target}{content}"),
                });
            }
            Event::DocType(t) => {
                events.push(XmlEvent::DocType {
                    text: bytes_to_string(t.into_inner()),
                });
            }
        }
    }
    Ok(events)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_events(events: &[XmlEvent]) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    for ev in events {
        write_event(&mut out, ev)?;
    }
    Ok(out)
}

fn write_event(out: &mut Vec<u8>, ev: &XmlEvent) -> anyhow::Result<()> {
    match ev {
        XmlEvent::Decl {
            version,
            encoding,
            standalone,
        } => {
            let d = BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
            let mut writer = quick_xml::Writer::new(Vec::new());
            writer.write_event(Event::Decl(d)).context("write decl")?;
            out.extend_from_slice(&writer.into_inner());
        }
        XmlEvent::Start { name, attrs } => write_tag(out, name, attrs, false),
        XmlEvent::Empty { name, attrs } => write_tag(out, name, attrs, true),
        XmlEvent::End { name } => {
            out.extend_from_slice(b"</");
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b">");
        }
        XmlEvent::Text { text } => push_escaped(out, text),
        XmlEvent::CData { text } => {
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"]]>");
        }
        XmlEvent::Comment { text } => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }
        XmlEvent::PI { content } => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(b"?>");
        }
        XmlEvent::DocType { text } => {
            out.extend_from_slice(b"<!DOCTYPE");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b">");
        }
    }
    Ok(())
}

fn write_tag(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
    out.extend_from_slice(b"<");
    out.extend_from_slice(name.as_bytes());
    // Attribute values are raw escaped bytes; do not escape again.
    for (k, v) in attrs {
        out.extend_from_slice(b" ");
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(v.as_bytes());
        out.extend_from_slice(b"\"");
    }
    if empty {
        out.extend_from_slice(b"/>");
    } else {
        out.extend_from_slice(b">");
    }
}

fn push_escaped(out: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
