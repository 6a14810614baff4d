use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pattern tables used by the cleaner and the classifier.
///
/// Defaults cover Portuguese and English wikis. Every field can be overridden
/// from a JSON file; missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerRules {
    /// Link targets starting with these (case-insensitive) embed media.
    pub media_prefixes: Vec<String>,
    pub category_prefixes: Vec<String>,
    /// Tags removed together with their content.
    pub noisy_tags: Vec<String>,
    pub redirect_markers: Vec<String>,
    /// Words that mark a disambiguation title, e.g. `Banco (desambiguação)`.
    pub disambiguation_title_words: Vec<String>,
    /// Template names that mark a disambiguation page body.
    pub disambiguation_templates: Vec<String>,
    pub media_option_keywords: Vec<String>,
    pub link_option_keys: Vec<String>,
    pub alignment_keywords: Vec<String>,
    pub infobox_tokens: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CleanerRules {
    fn default() -> Self {
        Self {
            media_prefixes: strings(&[
                "file:",
                "image:",
                "media:",
                "arquivo:",
                "ficheiro:",
                "imagem:",
                "mídia:",
            ]),
            category_prefixes: strings(&["category:", "categoria:"]),
            noisy_tags: strings(&[
                "ref",
                "references",
                "table",
                "gallery",
                "math",
                "chem",
                "code",
                "pre",
                "syntaxhighlight",
                "source",
                "score",
                "timeline",
                "imagemap",
            ]),
            redirect_markers: strings(&["#redirect", "#redirecionamento"]),
            disambiguation_title_words: strings(&[
                "desambiguação",
                "desambiguacao",
                "disambiguation",
            ]),
            disambiguation_templates: strings(&[
                "desambiguação",
                "desambiguacao",
                "desambig",
                "disambig",
                "disambiguation",
                "dab",
                "hndis",
                "geodis",
            ]),
            media_option_keywords: strings(&[
                "thumb",
                "thumbnail",
                "miniaturadaimagem",
                "frameless",
                "upright",
            ]),
            link_option_keys: strings(&["link", "alt"]),
            alignment_keywords: strings(&[
                "left", "right", "center", "centre", "none", "esquerda", "direita", "centro",
            ]),
            infobox_tokens: strings(&["Infobox", "Info/"]),
        }
    }
}

impl CleanerRules {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid cleaner rules JSON")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to parse rules file: {}", path.display()))
    }
}

/// Lowercased copies, for prefix and name comparisons.
pub(crate) fn lowercased(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// Builds `pattern` with `{}` replaced by an escaped alternation of `words`.
/// An empty word list yields `None`: an empty alternation would match everywhere.
pub(crate) fn alternation_regex(pattern: &str, words: &[String]) -> Result<Option<Regex>, regex::Error> {
    let words: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    Regex::new(&pattern.replace("{}", &words.join("|"))).map(Some)
}
