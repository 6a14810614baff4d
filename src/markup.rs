//! Wikitext to node tree.
//!
//! This is not a full MediaWiki grammar. It recognises the constructs the
//! cleaner needs to remove or render (templates, links, tags, tables,
//! comments, headings) and keeps everything else as text. Unbalanced markup
//! never aborts a parse: an unclosed opener is left in place as literal text
//! and reported as an [`Issue`].

use memchr::memmem;

/// Nesting beyond this is kept as text instead of being parsed further.
const MAX_DEPTH: usize = 32;

/// Tags whose body is never parsed as wikitext.
const RAW_CONTENT_TAGS: &[&str] = &[
    "nowiki",
    "pre",
    "math",
    "code",
    "syntaxhighlight",
    "source",
    "chem",
    "score",
    "timeline",
];

/// Tags that never have a body, even when written without `/>`.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

const URL_SCHEMES: &[&[u8]] = &[b"http://", b"https://", b"ftp://", b"//", b"mailto:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Comment,
    Template {
        name: String,
    },
    Link {
        target: String,
        label: Option<Vec<Node>>,
    },
    ExternalLink {
        url: String,
        label: Option<Vec<Node>>,
    },
    /// HTML-like tag; `{| ... |}` tables are tags named `table`.
    Tag {
        name: String,
        body: Vec<Node>,
    },
    Heading {
        level: u8,
        title: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    UnclosedTemplate,
    UnclosedLink,
    UnclosedTable,
    UnclosedTag(String),
    StrayClosingTag(String),
    TooDeep,
}

/// Parse result: the node tree plus every malformed construct with its byte offset.
#[derive(Debug, Default)]
pub struct Parsed {
    pub nodes: Vec<Node>,
    pub issues: Vec<(Issue, usize)>,
}

pub fn parse(text: &str) -> Parsed {
    let mut issues = Vec::new();
    let nodes = parse_fragment(text, 0, 0, &mut issues);
    Parsed { nodes, issues }
}

enum Scan {
    Node(Node, usize),
    Drop(usize),
    Literal(usize),
    NoMatch,
}

fn parse_fragment(text: &str, base: usize, depth: usize, issues: &mut Vec<(Issue, usize)>) -> Vec<Node> {
    if depth > MAX_DEPTH {
        issues.push((Issue::TooDeep, base));
        return vec![Node::Text(text.to_string())];
    }

    let bytes = text.as_bytes();
    let mut nodes = Vec::new();
    let mut i = 0;
    let mut run_start = 0;

    while i < bytes.len() {
        let line_start = i == 0 || bytes[i - 1] == b'\n';
        let scan = match bytes[i] {
            b'{' if bytes[i..].starts_with(b"{{") => scan_template(text, i, base, issues),
            b'{' if line_start && bytes[i..].starts_with(b"{|") => {
                scan_table(text, i, base, depth, issues)
            }
            b'[' if bytes[i..].starts_with(b"[[") => scan_link(text, i, base, depth, issues),
            b'[' => scan_external_link(text, i, base, depth, issues),
            b'<' if bytes[i..].starts_with(b"<!--") => scan_comment(text, i),
            b'<' => scan_tag(text, i, base, depth, issues),
            b'=' if line_start => scan_heading(text, i, base, depth, issues),
            _ => Scan::NoMatch,
        };

        match scan {
            Scan::Node(node, end) => {
                push_text(&mut nodes, &text[run_start..i]);
                nodes.push(node);
                i = end;
                run_start = end;
            }
            Scan::Drop(end) => {
                push_text(&mut nodes, &text[run_start..i]);
                i = end;
                run_start = end;
            }
            Scan::Literal(end) => i = end,
            Scan::NoMatch => i += 1,
        }
    }

    push_text(&mut nodes, &text[run_start..]);
    nodes
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// Position of the closer matching the opener at `start`, counting nested
/// openers. Both delimiters are two bytes long.
fn find_matching_close(bytes: &[u8], start: usize, open: &[u8; 2], close: &[u8; 2]) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == open[0] && bytes[i + 1] == open[1] {
            depth += 1;
            i += 2;
        } else if bytes[i] == close[0] && bytes[i + 1] == close[1] {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

/// Splits at the first `|` outside nested `[[ ]]` and `{{ }}`.
fn split_first_pipe(content: &str) -> (&str, Option<&str>) {
    let bytes = content.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        if i + 1 < bytes.len() && matches!(&bytes[i..i + 2], b"[[" | b"{{") {
            depth += 1;
            i += 2;
        } else if i + 1 < bytes.len() && matches!(&bytes[i..i + 2], b"]]" | b"}}") {
            depth -= 1;
            i += 2;
        } else if bytes[i] == b'|' && depth <= 0 {
            return (&content[..i], Some(&content[i + 1..]));
        } else {
            i += 1;
        }
    }
    (content, None)
}

fn scan_template(text: &str, start: usize, base: usize, issues: &mut Vec<(Issue, usize)>) -> Scan {
    match find_matching_close(text.as_bytes(), start, b"{{", b"}}") {
        Some(close) => {
            let (name, _) = split_first_pipe(&text[start + 2..close]);
            Scan::Node(
                Node::Template {
                    name: name.trim().to_string(),
                },
                close + 2,
            )
        }
        None => {
            issues.push((Issue::UnclosedTemplate, base + start));
            Scan::Literal(start + 2)
        }
    }
}

fn scan_link(text: &str, start: usize, base: usize, depth: usize, issues: &mut Vec<(Issue, usize)>) -> Scan {
    let Some(close) = find_matching_close(text.as_bytes(), start, b"[[", b"]]") else {
        issues.push((Issue::UnclosedLink, base + start));
        return Scan::Literal(start + 2);
    };

    let inner_start = start + 2;
    let (target, label) = split_first_pipe(&text[inner_start..close]);
    let label = label.map(|l| {
        let offset = inner_start + target.len() + 1;
        parse_fragment(l, base + offset, depth + 1, issues)
    });

    Scan::Node(
        Node::Link {
            target: target.trim().to_string(),
            label,
        },
        close + 2,
    )
}

fn scan_external_link(
    text: &str,
    start: usize,
    base: usize,
    depth: usize,
    issues: &mut Vec<(Issue, usize)>,
) -> Scan {
    let rest = &text.as_bytes()[start + 1..];
    let has_scheme = URL_SCHEMES
        .iter()
        .any(|scheme| rest.len() >= scheme.len() && rest[..scheme.len()].eq_ignore_ascii_case(scheme));
    if !has_scheme {
        return Scan::NoMatch;
    }

    let line_end = memchr::memchr(b'\n', rest).unwrap_or(rest.len());
    let Some(close) = memchr::memchr(b']', &rest[..line_end]) else {
        return Scan::NoMatch;
    };

    let inner = &text[start + 1..start + 1 + close];
    let (url, label) = match inner.find(char::is_whitespace) {
        Some(ws) => (&inner[..ws], inner[ws..].trim()),
        None => (inner, ""),
    };
    let label = if label.is_empty() {
        None
    } else {
        Some(parse_fragment(label, base + start + 1, depth + 1, issues))
    };

    Scan::Node(
        Node::ExternalLink {
            url: url.to_string(),
            label,
        },
        start + close + 2,
    )
}

/// An unclosed comment runs to the end of the text.
fn scan_comment(text: &str, start: usize) -> Scan {
    let end = memmem::find(&text.as_bytes()[start + 4..], b"-->")
        .map(|pos| start + 4 + pos + 3)
        .unwrap_or(text.len());
    Scan::Node(Node::Comment, end)
}

fn tag_name_len(bytes: &[u8]) -> usize {
    if !bytes.first().is_some_and(u8::is_ascii_alphabetic) {
        return 0;
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count()
}

fn scan_tag(text: &str, start: usize, base: usize, depth: usize, issues: &mut Vec<(Issue, usize)>) -> Scan {
    let bytes = text.as_bytes();
    let closing = bytes.get(start + 1) == Some(&b'/');
    let name_start = start + 1 + usize::from(closing);
    let name_len = tag_name_len(&bytes[name_start..]);
    if name_len == 0 {
        return Scan::NoMatch;
    }
    let name = text[name_start..name_start + name_len].to_ascii_lowercase();

    // The opening tag must end before any other '<'.
    let after_name = name_start + name_len;
    let Some(gt) = bytes[after_name..]
        .iter()
        .position(|&b| b == b'>' || b == b'<')
        .filter(|&pos| bytes[after_name + pos] == b'>')
        .map(|pos| after_name + pos)
    else {
        return Scan::NoMatch;
    };
    let open_end = gt + 1;

    if closing {
        issues.push((Issue::StrayClosingTag(name), base + start));
        return Scan::Drop(open_end);
    }

    let self_closing = bytes[gt - 1] == b'/';
    if self_closing || VOID_TAGS.contains(&name.as_str()) {
        return Scan::Node(Node::Tag { name, body: Vec::new() }, open_end);
    }

    let raw = RAW_CONTENT_TAGS.contains(&name.as_str());
    match find_closing_tag(bytes, open_end, name.as_bytes(), !raw) {
        Some((close_start, close_end)) => {
            let inner = &text[open_end..close_start];
            let body = if raw {
                vec![Node::Text(inner.to_string())]
            } else {
                parse_fragment(inner, base + open_end, depth + 1, issues)
            };
            Scan::Node(Node::Tag { name, body }, close_end)
        }
        None => {
            issues.push((Issue::UnclosedTag(name.clone()), base + start));
            Scan::Node(Node::Tag { name, body: Vec::new() }, open_end)
        }
    }
}

/// Finds `</name>` (ASCII case-insensitive). With `nested`, inner `<name ...>`
/// openers must be closed first.
fn find_closing_tag(bytes: &[u8], from: usize, name: &[u8], nested: bool) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    for lt in memchr::memchr_iter(b'<', &bytes[from..]).map(|pos| from + pos) {
        let closing = bytes.get(lt + 1) == Some(&b'/');
        let name_start = lt + 1 + usize::from(closing);
        let candidate = &bytes[name_start..];
        if candidate.len() < name.len()
            || !candidate[..name.len()].eq_ignore_ascii_case(name)
            || candidate
                .get(name.len())
                .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            continue;
        }

        let gt = match memchr::memchr(b'>', &bytes[name_start..]) {
            Some(pos) => name_start + pos,
            None => return None,
        };

        if closing {
            if depth == 0 {
                return Some((lt, gt + 1));
            }
            depth -= 1;
        } else if nested && bytes[gt - 1] != b'/' {
            depth += 1;
        }
    }
    None
}

/// `{| ... |}` with nesting. Delimiters only count at the start of a line.
fn scan_table(text: &str, start: usize, base: usize, depth: usize, issues: &mut Vec<(Issue, usize)>) -> Scan {
    let mut nesting = 0usize;
    let mut offset = start;

    for line in text[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if trimmed.starts_with("{|") {
            nesting += 1;
        } else if trimmed.starts_with("|}") {
            nesting -= 1;
            if nesting == 0 {
                let close = offset + indent;
                let body = parse_fragment(&text[start + 2..close], base + start + 2, depth + 1, issues);
                return Scan::Node(
                    Node::Tag {
                        name: "table".to_string(),
                        body,
                    },
                    close + 2,
                );
            }
        }
        offset += line.len();
    }

    issues.push((Issue::UnclosedTable, base + start));
    Scan::Literal(start + 2)
}

fn scan_heading(text: &str, start: usize, base: usize, depth: usize, issues: &mut Vec<(Issue, usize)>) -> Scan {
    let line_end = memchr::memchr(b'\n', &text.as_bytes()[start..])
        .map(|pos| start + pos)
        .unwrap_or(text.len());
    let mut line = text[start..line_end].trim_end();
    // Trailing comments do not stop a line from being a heading.
    while line.ends_with("-->") {
        match line.rfind("<!--") {
            Some(pos) => line = line[..pos].trim_end(),
            None => break,
        }
    }

    let open = line.bytes().take_while(|&b| b == b'=').count();
    let close = line.bytes().rev().take_while(|&b| b == b'=').count();
    let level = open.min(close).min(6);
    if level == 0 || line.len() <= 2 * level {
        return Scan::NoMatch;
    }

    let inner = &line[level..line.len() - level];
    let title = parse_fragment(inner.trim(), base + start + level, depth + 1, issues);
    Scan::Node(
        Node::Heading {
            level: level as u8,
            title,
        },
        line_end,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn plain_text_is_one_node() {
        assert_eq!(parse("just words").nodes, vec![text("just words")]);
    }

    #[test]
    fn empty_input() {
        let parsed = parse("");
        assert!(parsed.nodes.is_empty());
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn template_basic() {
        let parsed = parse("{{Info/País|nome=Brasil}}Capital do país.");
        assert_eq!(
            parsed.nodes,
            vec![
                Node::Template {
                    name: "Info/País".into()
                },
                text("Capital do país."),
            ]
        );
    }

    #[test]
    fn template_nested() {
        let parsed = parse("{{outer {{inner}} end}} text");
        assert_eq!(parsed.nodes.len(), 2);
        assert!(matches!(parsed.nodes[0], Node::Template { .. }));
        assert_eq!(parsed.nodes[1], text(" text"));
    }

    #[test]
    fn template_hides_headings() {
        let parsed = parse("{{Infobox\n== Not a heading ==\n}}\nLead");
        assert!(!parsed
            .nodes
            .iter()
            .any(|n| matches!(n, Node::Heading { .. })));
    }

    #[test]
    fn unclosed_template_is_literal() {
        let parsed = parse("{{unclosed|a=b text");
        assert_eq!(parsed.nodes, vec![text("{{unclosed|a=b text")]);
        assert_eq!(parsed.issues, vec![(Issue::UnclosedTemplate, 0)]);
    }

    #[test]
    fn link_with_label() {
        let parsed = parse("[[Brasil|país]]");
        assert_eq!(
            parsed.nodes,
            vec![Node::Link {
                target: "Brasil".into(),
                label: Some(vec![text("país")]),
            }]
        );
    }

    #[test]
    fn file_link_caption_with_nested_link() {
        let parsed = parse("[[Ficheiro:Mapa.png|thumb|Mapa do [[Brasil]]]] depois");
        match &parsed.nodes[0] {
            Node::Link { target, label } => {
                assert_eq!(target, "Ficheiro:Mapa.png");
                let label = label.as_ref().unwrap();
                assert!(label.iter().any(|n| matches!(n, Node::Link { .. })));
            }
            other => panic!("expected link, got {:?}", other),
        }
        assert_eq!(parsed.nodes[1], text(" depois"));
    }

    #[test]
    fn unclosed_link_is_literal() {
        let parsed = parse("a [[b c");
        assert_eq!(parsed.nodes, vec![text("a [[b c")]);
        assert_eq!(parsed.issues, vec![(Issue::UnclosedLink, 2)]);
    }

    #[test]
    fn external_link_with_label() {
        let parsed = parse("[https://example.com Site oficial]");
        assert_eq!(
            parsed.nodes,
            vec![Node::ExternalLink {
                url: "https://example.com".into(),
                label: Some(vec![text("Site oficial")]),
            }]
        );
    }

    #[test]
    fn bracket_without_scheme_is_text() {
        assert_eq!(parse("[nota 1]").nodes, vec![text("[nota 1]")]);
    }

    #[test]
    fn comment_removed() {
        let parsed = parse("a<!-- hidden -->b");
        assert_eq!(parsed.nodes, vec![text("a"), Node::Comment, text("b")]);
    }

    #[test]
    fn unclosed_comment_runs_to_end() {
        let parsed = parse("a<!-- never closed");
        assert_eq!(parsed.nodes, vec![text("a"), Node::Comment]);
    }

    #[test]
    fn ref_tag_with_body() {
        let parsed = parse("fato<ref name=\"x\">fonte</ref> segue");
        assert_eq!(
            parsed.nodes,
            vec![
                text("fato"),
                Node::Tag {
                    name: "ref".into(),
                    body: vec![text("fonte")],
                },
                text(" segue"),
            ]
        );
    }

    #[test]
    fn self_closing_and_void_tags() {
        let parsed = parse("a<ref name=\"x\" />b<br>c");
        assert_eq!(
            parsed.nodes,
            vec![
                text("a"),
                Node::Tag {
                    name: "ref".into(),
                    body: vec![],
                },
                text("b"),
                Node::Tag {
                    name: "br".into(),
                    body: vec![],
                },
                text("c"),
            ]
        );
    }

    #[test]
    fn nested_same_name_tags() {
        let parsed = parse("<div>a<div>b</div>c</div>d");
        match &parsed.nodes[0] {
            Node::Tag { name, body } => {
                assert_eq!(name, "div");
                assert_eq!(body.len(), 3);
            }
            other => panic!("expected tag, got {:?}", other),
        }
        assert_eq!(parsed.nodes[1], text("d"));
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        let parsed = parse("<REF>x</ref>");
        assert!(matches!(&parsed.nodes[0], Node::Tag { name, .. } if name == "ref"));
    }

    #[test]
    fn raw_content_tag_is_not_parsed() {
        let parsed = parse("<math>{{x}}</math>");
        assert_eq!(
            parsed.nodes,
            vec![Node::Tag {
                name: "math".into(),
                body: vec![text("{{x}}")],
            }]
        );
    }

    #[test]
    fn unclosed_tag_drops_opener() {
        let parsed = parse("a<ref name=x>b");
        assert_eq!(
            parsed.nodes,
            vec![
                text("a"),
                Node::Tag {
                    name: "ref".into(),
                    body: vec![],
                },
                text("b"),
            ]
        );
        assert_eq!(parsed.issues, vec![(Issue::UnclosedTag("ref".into()), 1)]);
    }

    #[test]
    fn stray_closing_tag_dropped() {
        let parsed = parse("a</small>b");
        assert_eq!(parsed.nodes, vec![text("ab")]);
        assert_eq!(parsed.issues, vec![(Issue::StrayClosingTag("small".into()), 1)]);
    }

    #[test]
    fn less_than_in_prose_is_text() {
        assert_eq!(parse("1 < 2 e 3 > 2").nodes, vec![text("1 < 2 e 3 > 2")]);
    }

    #[test]
    fn wikitable_becomes_table_tag() {
        let parsed = parse("antes\n{| class=\"wikitable\"\n| a || b\n|}\ndepois");
        assert_eq!(parsed.nodes[0], text("antes\n"));
        assert!(matches!(&parsed.nodes[1], Node::Tag { name, .. } if name == "table"));
        assert_eq!(parsed.nodes[2], text("\ndepois"));
    }

    #[test]
    fn nested_wikitable() {
        let parsed = parse("{|\n|\n{|\n| x\n|}\n|}\nfim");
        assert!(matches!(&parsed.nodes[0], Node::Tag { name, .. } if name == "table"));
        assert_eq!(parsed.nodes[1], text("\nfim"));
    }

    #[test]
    fn template_closing_pipe_is_not_table_end() {
        let parsed = parse("{|\n| {{x|}}\n|}");
        assert_eq!(parsed.nodes.len(), 1);
    }

    #[test]
    fn headings() {
        let parsed = parse("Lead\n== História ==\nTexto\n=== Sub ===\nMais");
        let levels: Vec<u8> = parsed
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Heading { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![2, 3]);
    }

    #[test]
    fn heading_title_is_parsed() {
        let parsed = parse("== [[Brasil]] ==");
        match &parsed.nodes[0] {
            Node::Heading { level, title } => {
                assert_eq!(*level, 2);
                assert!(matches!(title[0], Node::Link { .. }));
            }
            other => panic!("expected heading, got {:?}", other),
        }
    }

    #[test]
    fn heading_with_trailing_comments() {
        let parsed = parse("== História == <!-- ver --> <!-- x -->\nTexto");
        match &parsed.nodes[0] {
            Node::Heading { level, title } => {
                assert_eq!(*level, 2);
                assert_eq!(title, &vec![text("História")]);
            }
            other => panic!("expected heading, got {:?}", other),
        }
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn equals_mid_line_is_not_heading() {
        let parsed = parse("x == y ==");
        assert_eq!(parsed.nodes, vec![text("x == y ==")]);
    }

    #[test]
    fn bare_equals_line_is_not_heading() {
        assert_eq!(parse("==").nodes, vec![text("==")]);
    }

    #[test]
    fn non_ascii_offsets_are_safe() {
        let parsed = parse("Ünîcödé {{t}} çã [[Pã|ção]] fim");
        assert_eq!(parsed.nodes.len(), 5);
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let open = "[[a|".repeat(MAX_DEPTH + 5);
        let close = "]]".repeat(MAX_DEPTH + 5);
        let parsed = parse(&format!("{}x{}", open, close));
        assert!(parsed.issues.iter().any(|(i, _)| *i == Issue::TooDeep));
    }
}
