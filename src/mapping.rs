// src/mapping.rs

//! Pattern-based dependency rules and their resolution into concrete edges.
//!
//! A rule declares, with a start and an end pattern, that any identifier
//! matching the start is a dependency of any identifier matching the end,
//! within the subtree of the scope declaring the rule. Rules accumulate
//! downward during traversal; candidates collected beneath a scope bubble
//! back up to the scope that declared the rule, which emits the
//! cross-product of its start and end matches.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::config::RuleSpec;
use crate::errors::{MetaforgeError, Result};

/// A compiled start/end rule.
///
/// Patterns are anchored; a literal `.` is escaped and `*` translates to
/// `.*`, so `file:*.x` matches `file:a.x` but not `file:a_x`.
#[derive(Debug, Clone)]
pub struct Rule {
    key: String,
    start: Regex,
    end: Regex,
    /// Parsed from the configuration for compatibility; inheritance is not
    /// depth-limited.
    pub recurrence: i64,
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self> {
        Ok(Self {
            key: format!("{} > {}", spec.start, spec.end),
            start: Regex::new(&translate(&spec.start))?,
            end: Regex::new(&translate(&spec.end))?,
            recurrence: spec.recurrence,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Compile a batch of rule specs.
pub fn compile_rules(specs: &[RuleSpec]) -> Result<Vec<Rule>> {
    specs.iter().map(Rule::compile).collect()
}

fn translate(pattern: &str) -> String {
    let escaped = pattern.replace('.', r"\.").replace('*', ".*");
    format!("^{escaped}$")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

/// A (rule, resolved side) pair waiting for its opposite side.
#[derive(Debug, Clone)]
pub struct Candidate {
    rule_key: String,
    side: Side,
    id: String,
}

/// The mapping rules in force at one point of the configuration tree,
/// together with the match candidates collected beneath it.
#[derive(Debug, Default)]
pub struct Scope {
    /// Inherited rules first, rules declared in this scope from `own_from`.
    rules: Vec<Rule>,
    own_from: usize,
    starts: HashMap<String, Vec<String>>,
    ends: HashMap<String, Vec<String>>,
}

impl Scope {
    /// Scope for the tree root: every rule counts as declared here.
    pub fn root(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            own_from: 0,
            starts: HashMap::new(),
            ends: HashMap::new(),
        }
    }

    /// Scope for a nested directory: inherits every rule in force at the
    /// parent and appends the rules declared on the directory itself.
    /// Inherited rules are never removed.
    pub fn child(parent: &Scope, own: Vec<Rule>) -> Self {
        let own_from = parent.rules.len();
        let mut rules = parent.rules.clone();
        rules.extend(own);
        Self {
            rules,
            own_from,
            starts: HashMap::new(),
            ends: HashMap::new(),
        }
    }

    /// Test a direct child identifier against every rule in scope.
    ///
    /// An identifier matching both sides of one rule is a configuration
    /// error, reported rather than silently resolved.
    pub fn offer(&mut self, id: &str) -> Result<()> {
        for rule in &self.rules {
            let starts = rule.start.is_match(id);
            let ends = rule.end.is_match(id);
            if starts && ends {
                return Err(MetaforgeError::MappingConflict {
                    id: id.to_string(),
                    rule: rule.key.clone(),
                });
            }
            if starts {
                debug!(id, rule = %rule.key, "start candidate");
                self.starts
                    .entry(rule.key.clone())
                    .or_default()
                    .push(id.to_string());
            }
            if ends {
                debug!(id, rule = %rule.key, "end candidate");
                self.ends
                    .entry(rule.key.clone())
                    .or_default()
                    .push(id.to_string());
            }
        }
        Ok(())
    }

    /// Take over candidates bubbled up from a nested scope.
    pub fn absorb(&mut self, candidates: Vec<Candidate>) {
        for c in candidates {
            let bucket = match c.side {
                Side::Start => self.starts.entry(c.rule_key).or_default(),
                Side::End => self.ends.entry(c.rule_key).or_default(),
            };
            bucket.push(c.id);
        }
    }

    /// Resolve this scope: emit the cross-product of start and end
    /// candidates for every rule declared here, and return the candidates
    /// for inherited rules so the caller can bubble them up.
    ///
    /// A rule that never collected both sides emits nothing; that is not an
    /// error, the matching sibling may simply not exist.
    pub fn resolve<F>(mut self, mut emit: F) -> Result<Vec<Candidate>>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        for rule in &self.rules[self.own_from..] {
            let starts = self.starts.remove(&rule.key).unwrap_or_default();
            let ends = self.ends.remove(&rule.key).unwrap_or_default();
            for start in &starts {
                for end in &ends {
                    if start != end {
                        debug!(start = %start, end = %end, rule = %rule.key, "resolved mapping");
                        emit(start, end)?;
                    }
                }
            }
        }

        let mut leftover = Vec::new();
        for rule in &self.rules[..self.own_from] {
            if let Some(ids) = self.starts.remove(&rule.key) {
                leftover.extend(ids.into_iter().map(|id| Candidate {
                    rule_key: rule.key.clone(),
                    side: Side::Start,
                    id,
                }));
            }
            if let Some(ids) = self.ends.remove(&rule.key) {
                leftover.extend(ids.into_iter().map(|id| Candidate {
                    rule_key: rule.key.clone(),
                    side: Side::End,
                    id,
                }));
            }
        }
        Ok(leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(start: &str, end: &str) -> Rule {
        Rule::compile(&RuleSpec {
            start: start.to_string(),
            end: end.to_string(),
            recurrence: 0,
        })
        .unwrap()
    }

    fn collect(scope: Scope) -> (Vec<(String, String)>, Vec<Candidate>) {
        let mut edges = Vec::new();
        let leftover = scope
            .resolve(|s, e| {
                edges.push((s.to_string(), e.to_string()));
                Ok(())
            })
            .unwrap();
        (edges, leftover)
    }

    #[test]
    fn translate_anchors_and_escapes() {
        let r = rule("file:*.x", "file:*.y");
        assert!(r.start.is_match("file:a.x"));
        assert!(!r.start.is_match("file:a_x"));
        assert!(!r.start.is_match("prefix file:a.x"));
        assert!(r.end.is_match("file:deep/b.y"));
    }

    #[test]
    fn same_scope_cross_product() {
        let mut scope = Scope::root(vec![rule("file:*.x", "file:*.y")]);
        scope.offer("file:a.x").unwrap();
        scope.offer("file:b.y").unwrap();
        scope.offer("file:c.y").unwrap();
        scope.offer("exec:other").unwrap();

        let (mut edges, leftover) = collect(scope);
        edges.sort();
        assert_eq!(
            edges,
            vec![
                ("file:a.x".to_string(), "file:b.y".to_string()),
                ("file:a.x".to_string(), "file:c.y".to_string()),
            ]
        );
        assert!(leftover.is_empty());
    }

    #[test]
    fn both_sides_match_is_error() {
        let mut scope = Scope::root(vec![rule("file:*", "file:*.y")]);
        let err = scope.offer("file:a.y").unwrap_err();
        assert!(matches!(err, MetaforgeError::MappingConflict { .. }));
    }

    #[test]
    fn candidates_bubble_to_declaring_scope() {
        let root = Scope::root(vec![rule("file:*.x", "file:*.y")]);

        // Start matched in one subtree.
        let mut left = Scope::child(&root, Vec::new());
        left.offer("file:sub1/a.x").unwrap();
        let (edges, left_over) = collect(left);
        assert!(edges.is_empty());
        assert_eq!(left_over.len(), 1);

        // End matched in a sibling subtree.
        let mut right = Scope::child(&root, Vec::new());
        right.offer("file:sub2/b.y").unwrap();
        let (edges, right_over) = collect(right);
        assert!(edges.is_empty());

        let mut root = root;
        root.absorb(left_over);
        root.absorb(right_over);
        let (edges, leftover) = collect(root);
        assert_eq!(
            edges,
            vec![("file:sub1/a.x".to_string(), "file:sub2/b.y".to_string())]
        );
        assert!(leftover.is_empty());
    }

    #[test]
    fn unresolved_rule_is_not_an_error() {
        let mut scope = Scope::root(vec![rule("file:*.x", "file:*.y")]);
        scope.offer("file:a.x").unwrap();
        let (edges, leftover) = collect(scope);
        assert!(edges.is_empty());
        assert!(leftover.is_empty());
    }

    #[test]
    fn child_rules_resolve_in_child_only() {
        let root = Scope::root(Vec::new());
        let mut child = Scope::child(&root, vec![rule("exec:gen-*", "file:*.out")]);
        child.offer("exec:gen-api").unwrap();
        child.offer("file:api.out").unwrap();

        let (edges, leftover) = collect(child);
        assert_eq!(
            edges,
            vec![("exec:gen-api".to_string(), "file:api.out".to_string())]
        );
        assert!(leftover.is_empty());
    }
}
