// src/entity/render.rs

//! Minimal template rendering for generated files.
//!
//! Two constructs:
//!
//! - `{{define name}}` … `{{end}}` blocks (each marker on its own line)
//!   contribute a named snippet and are stripped from the emitting body.
//!   Ancestor templates are read first, so snippets defined closer to the
//!   file override those defined higher up.
//! - `{{name}}` placeholders substitute a snippet, then a variable of that
//!   name. Unknown placeholders are left untouched.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Extract `{{define}}` blocks from `content` into `snippets`, returning
/// the content with those blocks removed.
pub fn collect_snippets(content: &str, snippets: &mut BTreeMap<String, String>) -> String {
    let mut body = String::new();
    let mut current: Option<(String, String)> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if current.is_none() {
            if let Some(name) = trimmed
                .strip_prefix("{{define ")
                .and_then(|rest| rest.strip_suffix("}}"))
            {
                current = Some((name.trim().to_string(), String::new()));
                continue;
            }
        }

        if trimmed == "{{end}}" {
            if let Some((name, block)) = current.take() {
                snippets.insert(name, block.trim_end().to_string());
                continue;
            }
        }

        match &mut current {
            Some((_, block)) => {
                block.push_str(line);
                block.push('\n');
            }
            None => {
                body.push_str(line);
                body.push('\n');
            }
        }
    }

    // An unterminated block still contributes its snippet.
    if let Some((name, block)) = current.take() {
        snippets.insert(name, block.trim_end().to_string());
    }

    body
}

/// Replace `{{name}}` placeholders from snippets, then variables.
pub fn substitute(
    content: &str,
    snippets: &BTreeMap<String, String>,
    vars: &BTreeMap<String, String>,
) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder pattern")
    });

    re.replace_all(content, |caps: &Captures<'_>| {
        let key = &caps[1];
        snippets
            .get(key)
            .or_else(|| vars.get(key))
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
