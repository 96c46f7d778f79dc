use crate::core::BlockSpec;
use crate::schema::Schema;

/// One line per block that carries text, depth-first.
pub(crate) fn write_text(blocks: &[BlockSpec]) -> String {
    fn walk(spec: &BlockSpec, lines: &mut Vec<String>) {
        if spec.props.contains_key(crate::core::TEXT_PROP) {
            lines.push(spec.text_content().to_string());
        }
        for child in &spec.children {
            walk(child, lines);
        }
    }

    let mut lines = Vec::new();
    for spec in blocks {
        walk(spec, &mut lines);
    }
    lines.join("\n")
}

/// Every line becomes a flat block of the schema's fallback kind.
pub(crate) fn read_text(schema: &Schema, input: &str) -> Vec<BlockSpec> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n')
        .map(|line| BlockSpec::new(schema.fallback_kind()).text(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_flatten_to_lines() {
        let blocks = vec![
            BlockSpec::list("C")
                .child(BlockSpec::list("D"))
                .child(BlockSpec::list("E").child(BlockSpec::list("F"))),
            BlockSpec::divider(),
            BlockSpec::paragraph("tail"),
        ];
        assert_eq!(write_text(&blocks), "C\nD\nE\nF\ntail");
    }

    #[test]
    fn lines_become_paragraphs() {
        let schema = Schema::standard();
        let blocks = read_text(&schema, "one\r\ntwo\r\rfour\n");
        let texts: Vec<&str> = blocks.iter().map(BlockSpec::text_content).collect();
        assert_eq!(texts, vec!["one", "two", "", "four"]);
        assert!(blocks.iter().all(|b| b.kind == "paragraph"));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let schema = Schema::standard();
        assert!(read_text(&schema, "").is_empty());
        assert!(read_text(&schema, "\n").is_empty());
    }
}
