//! Wikitext to sectioned plain text.
//!
//! [`MarkupCleaner::clean`] runs a fixed sequence of passes. Order matters:
//!
//! 1. Drop list/definition lines (optional, before parsing)
//! 2. Parse into a node tree ([`crate::markup`])
//! 3. Remove media and category links
//! 4. Remove templates (never expanded)
//! 5. Remove noisy tags with their content (`<ref>`, tables, galleries, ...)
//! 6. Split at headings; the lead section is always present
//! 7. Render each section and scrub residual markup
//! 8. Drop short sections and join the rest with a blank line
//!
//! Passes 3-5 build a new tree instead of editing the old one in place.
//! Every removal and every malformed node is recorded in a [`CleanReport`].

use crate::markup::{self, Issue, Node};
use crate::models::CleanedPage;
use crate::rules::{alternation_regex, lowercased, CleanerRules};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashSet;
use std::borrow::Cow;
use std::mem;

static ENTITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap());

static BOLD_ITALIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,}").unwrap());

static LIST_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[*#:;]+[ \t]*").unwrap());

static RULE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^-{4,}").unwrap());

static MAGIC_WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"__[A-Z]+__").unwrap());

static BLANK_LINES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static PIXEL_SIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:x\d+)?\s?px\b").unwrap());

static STRAY_PIPES_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|(?:\s*\|)+").unwrap());

static PARAM_FRAGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*[\w\-]+\s*=[^|\n]*").unwrap());

static BRACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}]").unwrap());

static EMPTY_BRACKETS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*[,;:]?\s*\)|\[\s*\]").unwrap());

/// Void tags. `br` renders as a line break, the rest as nothing.
const INVISIBLE_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Parse,
    MediaLinks,
    Templates,
    NoisyTags,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Removed {
    MediaLink,
    CategoryLink,
    Template,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Removed { pass: Pass, what: Removed },
    /// The node could not be handled cleanly and was left as text or dropped.
    Malformed {
        pass: Pass,
        issue: MalformedNode,
        offset: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedNode {
    Markup(Issue),
    UndecodableEntity(String),
}

/// What the passes did to one page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl CleanReport {
    fn removed(&mut self, pass: Pass, what: Removed) {
        self.outcomes.push(NodeOutcome::Removed { pass, what });
    }

    fn malformed(&mut self, pass: Pass, issue: MalformedNode, offset: Option<usize>) {
        self.outcomes.push(NodeOutcome::Malformed {
            pass,
            issue,
            offset,
        });
    }

    pub fn removed_count(&self, what: Removed) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NodeOutcome::Removed { what: w, .. } if *w == what))
            .count()
    }

    pub fn malformed_nodes(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NodeOutcome::Malformed { .. }))
    }
}

pub struct MarkupCleaner {
    media_prefixes: Vec<String>,
    category_prefixes: Vec<String>,
    noisy_tags: FxHashSet<String>,
    media_options: Option<Regex>,
    link_options: Option<Regex>,
    alignment: Option<Regex>,
    infobox_tokens: Option<Regex>,
}

impl MarkupCleaner {
    pub fn new(rules: &CleanerRules) -> Result<Self, regex::Error> {
        Ok(Self {
            media_prefixes: lowercased(&rules.media_prefixes),
            category_prefixes: lowercased(&rules.category_prefixes),
            noisy_tags: lowercased(&rules.noisy_tags).into_iter().collect(),
            media_options: alternation_regex(r"(?i)\b(?:{})\b", &rules.media_option_keywords)?,
            link_options: alternation_regex(r"(?i)\b(?:{})=[^\s|]*", &rules.link_option_keys)?,
            alignment: alternation_regex(r"(?i)\b(?:{})\s*\|", &rules.alignment_keywords)?,
            infobox_tokens: alternation_regex(r"(?i)\b(?:{})[^\s|]*", &rules.infobox_tokens)?,
        })
    }

    pub fn clean(&self, raw_text: &str, drop_lists: bool, min_section_chars: usize) -> CleanedPage {
        self.clean_with_report(raw_text, drop_lists, min_section_chars).0
    }

    pub fn clean_with_report(
        &self,
        raw_text: &str,
        drop_lists: bool,
        min_section_chars: usize,
    ) -> (CleanedPage, CleanReport) {
        let mut report = CleanReport::default();

        let text: Cow<str> = if drop_lists {
            Cow::Owned(strip_list_lines(raw_text))
        } else {
            Cow::Borrowed(raw_text)
        };

        let parsed = markup::parse(&text);
        for (issue, offset) in parsed.issues {
            report.malformed(Pass::Parse, MalformedNode::Markup(issue), Some(offset));
        }

        let nodes = filter_tree(parsed.nodes, &mut |node| match self.link_kind(node) {
            Some(what) => {
                report.removed(Pass::MediaLinks, what);
                true
            }
            None => false,
        });

        let nodes = filter_tree(nodes, &mut |node| {
            let template = matches!(node, Node::Template { .. });
            if template {
                report.removed(Pass::Templates, Removed::Template);
            }
            template
        });

        let nodes = filter_tree(nodes, &mut |node| {
            let noisy = matches!(node, Node::Tag { name, .. } if self.noisy_tags.contains(name));
            if noisy {
                report.removed(Pass::NoisyTags, Removed::Tag);
            }
            noisy
        });

        let section_texts = split_sections(nodes)
            .iter()
            .map(|section| self.render_section(section, &mut report))
            .filter(|s| !s.is_empty() && s.chars().count() >= min_section_chars)
            .collect();

        (CleanedPage::from_sections(section_texts), report)
    }

    fn link_kind(&self, node: &Node) -> Option<Removed> {
        let Node::Link { target, .. } = node else {
            return None;
        };
        let target = target.trim_start().to_lowercase();
        if self.media_prefixes.iter().any(|p| target.starts_with(p)) {
            Some(Removed::MediaLink)
        } else if self.category_prefixes.iter().any(|p| target.starts_with(p)) {
            Some(Removed::CategoryLink)
        } else {
            None
        }
    }

    fn render_section(&self, nodes: &[Node], report: &mut CleanReport) -> String {
        let mut out = String::new();
        render_nodes(nodes, &mut out, report);
        let text = collapse_markup(&out);
        self.scrub_residue(&text)
    }

    /// Residual cleanup, in order. The last step collapses whitespace.
    fn scrub_residue(&self, text: &str) -> String {
        let mut s = text.to_string();
        if let Some(re) = &self.media_options {
            s = re.replace_all(&s, "").into_owned();
        }
        s = PIXEL_SIZE_REGEX.replace_all(&s, "").into_owned();
        if let Some(re) = &self.link_options {
            s = re.replace_all(&s, "").into_owned();
        }
        s = STRAY_PIPES_REGEX.replace_all(&s, " ").into_owned();
        if let Some(re) = &self.alignment {
            s = re.replace_all(&s, "").into_owned();
        }
        s = PARAM_FRAGMENT_REGEX.replace_all(&s, "").into_owned();
        if let Some(re) = &self.infobox_tokens {
            s = re.replace_all(&s, "").into_owned();
        }
        s = BRACE_REGEX.replace_all(&s, "").into_owned();
        s = EMPTY_BRACKETS_REGEX.replace_all(&s, "").into_owned();
        collapse_whitespace(&s)
    }
}

/// Deletes every line whose first non-blank character is a list or definition marker.
pub fn strip_list_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !matches!(line.trim_start().chars().next(), Some('*' | '#' | ':' | ';')))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Copies `nodes` into a new tree without the nodes `remove` selects, at any depth.
fn filter_tree<F>(nodes: Vec<Node>, remove: &mut F) -> Vec<Node>
where
    F: FnMut(&Node) -> bool,
{
    let mut kept = Vec::with_capacity(nodes.len());
    for node in nodes {
        if remove(&node) {
            continue;
        }
        kept.push(match node {
            Node::Link { target, label } => Node::Link {
                target,
                label: match label {
                    Some(label) => Some(filter_tree(label, remove)),
                    None => None,
                },
            },
            Node::ExternalLink { url, label } => Node::ExternalLink {
                url,
                label: match label {
                    Some(label) => Some(filter_tree(label, remove)),
                    None => None,
                },
            },
            Node::Tag { name, body } => Node::Tag {
                name,
                body: filter_tree(body, remove),
            },
            Node::Heading { level, title } => Node::Heading {
                level,
                title: filter_tree(title, remove),
            },
            other => other,
        });
    }
    kept
}

/// Lead section first, then one section per top-level heading. Headings are dropped.
fn split_sections(nodes: Vec<Node>) -> Vec<Vec<Node>> {
    let mut sections = Vec::new();
    let mut current = Vec::new();
    for node in nodes {
        if matches!(node, Node::Heading { .. }) {
            sections.push(mem::take(&mut current));
        } else {
            current.push(node);
        }
    }
    sections.push(current);
    sections
}

fn render_nodes(nodes: &[Node], out: &mut String, report: &mut CleanReport) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&decode_entities(text, report)),
            Node::Comment | Node::Template { .. } => {}
            Node::Link { target, label } => {
                let start = out.len();
                if let Some(label) = label {
                    render_nodes(label, out, report);
                }
                if out[start..].trim().is_empty() {
                    out.truncate(start);
                    out.push_str(target.trim_start_matches(':'));
                }
            }
            Node::ExternalLink { label, .. } => {
                if let Some(label) = label {
                    render_nodes(label, out, report);
                }
            }
            Node::Tag { name, body } => {
                if name == "br" {
                    out.push('\n');
                } else if !INVISIBLE_TAGS.contains(&name.as_str()) {
                    render_nodes(body, out, report);
                }
            }
            // Only top-level headings split sections. Nested ones are dropped.
            Node::Heading { .. } => {}
        }
    }
}

fn decode_entities<'a>(text: &'a str, report: &mut CleanReport) -> Cow<'a, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    ENTITY_REGEX.replace_all(text, |caps: &Captures| {
        let entity = &caps[0];
        match quick_xml::escape::unescape_with(entity, named_entity) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                report.malformed(
                    Pass::Render,
                    MalformedNode::UndecodableEntity(entity.to_string()),
                    None,
                );
                entity.to_string()
            }
        }
    })
}

/// Named references seen in article text. Numeric references are resolved by quick-xml.
fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" | "ensp" | "emsp" | "thinsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "minus" => "\u{2212}",
        "hellip" => "\u{2026}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "middot" => "\u{b7}",
        "times" => "\u{d7}",
        "deg" => "\u{b0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "shy" | "zwj" | "zwnj" => "",
        _ => return None,
    })
}

/// Strips inline markup that survives rendering: bold/italic quotes, list
/// markers, horizontal rules, behaviour switches, extra blank lines.
fn collapse_markup(text: &str) -> String {
    let s = BOLD_ITALIC_REGEX.replace_all(text, "");
    let s = LIST_MARKER_REGEX.replace_all(&s, "");
    let s = RULE_LINE_REGEX.replace_all(&s, "");
    let s = MAGIC_WORD_REGEX.replace_all(&s, "");
    BLANK_LINES_REGEX.replace_all(&s, "\n\n").into_owned()
}
