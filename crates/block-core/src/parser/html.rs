use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::core::{BlockSpec, Props, TEXT_PROP};
use crate::schema::Schema;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "del", "em", "font", "i", "ins", "kbd", "mark", "s", "small",
    "span", "strong", "sub", "sup", "u",
];
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "title"];

/// XML entities plus the HTML ones that show up in pasted markup. Other named
/// entities resolve to nothing so the rest of the text survives.
fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_predefined_entity(entity).or(Some(match entity {
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        _ => "",
    }))
}

pub(crate) fn write_html(schema: &Schema, blocks: &[BlockSpec]) -> String {
    let mut out = String::new();
    for spec in blocks {
        write_block(schema, spec, &mut out);
    }
    out
}

fn write_block(schema: &Schema, spec: &BlockSpec, out: &mut String) {
    let tag = schema.html_tag(&spec.kind);
    out.push('<');
    out.push_str(tag);
    out.push_str(" data-kind=\"");
    out.push_str(&escape(spec.kind.as_str()));
    out.push('"');

    let mut props = spec.props.clone();
    let text = props.remove(TEXT_PROP);
    if !props.is_empty()
        && let Ok(json) = serde_json::to_string(&props)
    {
        out.push_str(" data-props=\"");
        out.push_str(&escape(json.as_str()));
        out.push('"');
    }
    if text.is_some() {
        out.push_str(" data-text=\"\"");
    }

    let text = text.as_ref().and_then(|v| v.as_str()).unwrap_or("");
    if VOID_TAGS.contains(&tag) && text.is_empty() && spec.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    out.push_str(&escape(text));
    for child in &spec.children {
        write_block(schema, child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

struct Open {
    tag: String,
    block: Option<OpenBlock>,
    skip: bool,
}

struct OpenBlock {
    spec: BlockSpec,
    text: String,
    has_text: bool,
    /// Markup written by this crate keeps its text verbatim; foreign markup
    /// gets its whitespace collapsed.
    exact: bool,
}

impl OpenBlock {
    fn push_text(&mut self, text: &str) {
        if self.exact {
            self.text.push_str(text);
            return;
        }
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return;
        }
        if !self.text.is_empty() && text.starts_with(char::is_whitespace) {
            self.text.push(' ');
        }
        self.text.push_str(&collapsed);
        if text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
    }

    fn finish(mut self) -> BlockSpec {
        let text = if self.exact {
            self.text
        } else {
            self.text.trim().to_string()
        };
        if self.has_text || !text.is_empty() {
            self.spec.props.insert(TEXT_PROP.to_string(), text.into());
        }
        self.spec
    }
}

struct HtmlReader<'a> {
    schema: &'a Schema,
    stack: Vec<Open>,
    roots: Vec<BlockSpec>,
    loose: Option<OpenBlock>,
}

impl<'a> HtmlReader<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            stack: Vec::new(),
            roots: Vec::new(),
            loose: None,
        }
    }

    fn skipping(&self) -> bool {
        self.stack.iter().any(|open| open.skip)
    }

    fn open_block(&self, tag: &str, element: &BytesStart<'_>) -> Option<OpenBlock> {
        let mut kind: Option<String> = None;
        let mut props = Props::new();
        let mut has_text = false;
        for attr in element.attributes().flatten() {
            let value = attr
                .unescape_value_with(resolve_entity)
                .map(|v| v.into_owned())
                .unwrap_or_default();
            match attr.key.as_ref() {
                b"data-kind" => kind = Some(value),
                b"data-props" => {
                    if let Ok(parsed) = serde_json::from_str::<Props>(&value) {
                        props = parsed;
                    }
                }
                b"data-text" => has_text = true,
                _ => {}
            }
        }

        let exact = kind.is_some() || tag == "pre";
        let kind = match kind {
            Some(kind) => kind,
            None => match tag {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    props.insert("type".into(), tag.into());
                    self.schema.fallback_kind().to_string()
                }
                "blockquote" => {
                    props.insert("type".into(), "quote".into());
                    self.schema.fallback_kind().to_string()
                }
                _ => self.schema.kind_for_html_tag(tag)?.to_string(),
            },
        };

        Some(OpenBlock {
            spec: BlockSpec {
                kind,
                props,
                children: Vec::new(),
            },
            text: String::new(),
            has_text,
            exact,
        })
    }

    fn current_block(&mut self) -> Option<&mut OpenBlock> {
        self.stack.iter_mut().rev().find_map(|open| open.block.as_mut())
    }

    fn attach(&mut self, spec: BlockSpec) {
        match self.current_block() {
            Some(parent) => parent.spec.children.push(spec),
            None => self.roots.push(spec),
        }
    }

    fn flush_loose(&mut self) {
        if let Some(loose) = self.loose.take() {
            let spec = loose.finish();
            if !spec.text_content().is_empty() {
                self.roots.push(spec);
            }
        }
    }

    fn start(&mut self, element: &BytesStart<'_>, empty: bool) {
        let tag = tag_name(element.local_name().as_ref());
        let inline = INLINE_TAGS.contains(&tag.as_str());
        if !inline {
            self.flush_loose();
        }
        if tag == "br" && !self.skipping() {
            if let Some(block) = self.current_block() {
                block.text.push('\n');
            }
            return;
        }

        let block = if inline || self.skipping() {
            None
        } else {
            self.open_block(&tag, element)
        };

        if empty || VOID_TAGS.contains(&tag.as_str()) {
            if let Some(block) = block {
                let spec = block.finish();
                self.attach(spec);
            }
            return;
        }

        let skip = SKIPPED_TAGS.contains(&tag.as_str());
        self.stack.push(Open { tag, block, skip });
    }

    fn end(&mut self, name: &[u8]) {
        let tag = tag_name(name);
        if !INLINE_TAGS.contains(&tag.as_str()) {
            self.flush_loose();
        }
        let Some(pos) = self.stack.iter().rposition(|open| open.tag == tag) else {
            return;
        };
        while self.stack.len() > pos {
            self.pop();
        }
    }

    fn pop(&mut self) {
        let Some(open) = self.stack.pop() else {
            return;
        };
        if let Some(block) = open.block {
            let spec = block.finish();
            self.attach(spec);
        }
    }

    fn text(&mut self, text: &str) {
        if self.skipping() {
            return;
        }
        if let Some(block) = self.current_block() {
            block.push_text(text);
            return;
        }
        if text.trim().is_empty() && self.loose.is_none() {
            return;
        }
        let fallback = self.schema.fallback_kind().to_string();
        self.loose
            .get_or_insert_with(|| OpenBlock {
                spec: BlockSpec::new(fallback),
                text: String::new(),
                has_text: false,
                exact: false,
            })
            .push_text(text);
    }

    fn finish(mut self) -> Vec<BlockSpec> {
        self.flush_loose();
        while !self.stack.is_empty() {
            self.pop();
        }
        self.roots
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

pub(crate) fn read_html(schema: &Schema, input: &str) -> Result<Vec<BlockSpec>, quick_xml::Error> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().check_end_names = false;
    let mut html = HtmlReader::new(schema);

    loop {
        match reader.read_event()? {
            Event::Start(element) => html.start(&element, false),
            Event::Empty(element) => html.start(&element, true),
            Event::End(element) => html.end(element.local_name().as_ref()),
            Event::Text(text) => {
                let decoded = text
                    .unescape_with(resolve_entity)
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                html.text(&decoded);
            }
            Event::CData(data) => {
                let decoded = String::from_utf8_lossy(&data).into_owned();
                html.text(&decoded);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(html.finish())
}

/// Drops everything between `<` and `>`; used when markup cannot be parsed.
pub(crate) fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => {
                in_tag = true;
                if !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_kind_props_and_nested_children() {
        let schema = Schema::standard();
        let html = write_html(
            &schema,
            &[BlockSpec::list("a < b").child(BlockSpec::paragraph("x"))],
        );
        assert!(html.starts_with("<li data-kind=\"list\" data-props=\""));
        assert!(html.contains("a &lt; b<p data-kind=\"paragraph\" data-text=\"\">x</p></li>"));
    }

    #[test]
    fn dividers_are_self_closing() {
        let schema = Schema::standard();
        assert_eq!(
            write_html(&schema, &[BlockSpec::divider()]),
            "<hr data-kind=\"divider\"/>"
        );
    }

    #[test]
    fn foreign_markup_maps_common_tags() {
        let schema = Schema::standard();
        let blocks = read_html(
            &schema,
            "<html><head><title>t</title></head><body>\
             <h2>Title</h2>\
             <p>Hello <b>bold</b>\n  world</p>\
             <ul><li>one<ul><li>nested</li></ul></li><li>two</li></ul>\
             <hr>\
             <pre>let x = 1;</pre>\
             </body></html>",
        )
        .unwrap();

        let kinds: Vec<&str> = blocks.iter().map(|b| b.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["paragraph", "paragraph", "list", "list", "divider", "code"]
        );
        assert_eq!(blocks[0].text_content(), "Title");
        assert_eq!(blocks[0].props.get("type").and_then(|v| v.as_str()), Some("h2"));
        assert_eq!(blocks[1].text_content(), "Hello bold world");
        assert_eq!(blocks[2].text_content(), "one");
        assert_eq!(blocks[2].children[0].text_content(), "nested");
        assert_eq!(blocks[3].text_content(), "two");
        assert_eq!(blocks[5].text_content(), "let x = 1;");
    }

    #[test]
    fn loose_text_becomes_fallback_blocks() {
        let schema = Schema::standard();
        let blocks = read_html(&schema, "<div>hello <i>there</i></div><div>next</div>").unwrap();
        let texts: Vec<&str> = blocks.iter().map(BlockSpec::text_content).collect();
        assert_eq!(texts, vec!["hello there", "next"]);
    }

    #[test]
    fn html_entities_are_decoded() {
        let schema = Schema::standard();
        let blocks = read_html(
            &schema,
            "<p>Fish&nbsp;&amp;&nbsp;chips &mdash; &bogus;ok</p><pre>a&nbsp;b &lt;c&gt;</pre>",
        )
        .unwrap();
        assert_eq!(blocks[0].text_content(), "Fish & chips \u{2014} ok");
        assert_eq!(blocks[1].text_content(), "a\u{a0}b <c>");
    }

    #[test]
    fn strip_tags_keeps_text_lines() {
        assert_eq!(strip_tags("<p>a</p><p>b <x</p>"), "a\nb");
    }
}
