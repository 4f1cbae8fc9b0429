//! Rewrite hostnames embedded in a backed up hierarchy.
//!
//! Groups are matched against class names. When a group has at least one
//! matching class, its rule tree and the parameters of every matching class
//! are routed through the [`HostnameMap`]. Everything else is left exactly as
//! it was parsed.

use crate::api::{Group, Hierarchy, ValueNode};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid hostname mapping '{0}', expected OLD:NEW")]
    InvalidMapping(String),
    #[error("Invalid class matcher '{pattern}': {message}")]
    InvalidMatcher { pattern: String, message: String },
}

/// Total rewrite function from old to new hostnames.
///
/// Keys absent from the map resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostnameMap {
    entries: HashMap<String, String>,
}

impl HostnameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.entries.insert(old.into(), new.into());
    }

    pub fn lookup<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Parse a single `OLD:NEW` mapping as given on the command line.
    pub fn parse_pair(pair: &str) -> Result<(String, String), TransformError> {
        match pair.split_once(':') {
            Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
                Ok((old.trim().to_string(), new.trim().to_string()))
            }
            _ => Err(TransformError::InvalidMapping(pair.to_string())),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HostnameMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HostnameMap::new();
        for (old, new) in iter {
            map.insert(old, new);
        }
        map
    }
}

#[derive(Debug, Clone)]
pub struct ClassMatcher {
    regex: Regex,
}

impl ClassMatcher {
    pub fn new(pattern: &str) -> Result<Self, TransformError> {
        let regex = Regex::new(pattern).map_err(|e| TransformError::InvalidMatcher {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, class_name: &str) -> bool {
        self.regex.is_match(class_name)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct Transformer {
    hostname_map: HostnameMap,
    matcher: ClassMatcher,
}

impl Transformer {
    pub fn new(hostname_map: HostnameMap, matcher: ClassMatcher) -> Self {
        Self {
            hostname_map,
            matcher,
        }
    }

    pub fn hostname_map(&self) -> &HostnameMap {
        &self.hostname_map
    }

    pub fn matcher(&self) -> &ClassMatcher {
        &self.matcher
    }

    /// Transform every in-scope group, preserving hierarchy order.
    pub fn transform(&self, hierarchy: Hierarchy) -> Hierarchy {
        hierarchy
            .into_iter()
            .map(|group| {
                if self.group_matches(&group) {
                    self.transform_group(group)
                } else {
                    group
                }
            })
            .collect()
    }

    pub fn group_matches(&self, group: &Group) -> bool {
        let classes = group.class_names();
        let matched = classes.iter().any(|name| self.matcher.is_match(name));
        debug!(
            group = group.name().unwrap_or_default(),
            classes = ?classes,
            "{} group",
            if matched { "Matched" } else { "Did not match" }
        );
        matched
    }

    /// Rewrite the rule tree and matching class parameters of a group.
    pub fn transform_group(&self, mut group: Group) -> Group {
        let fields = group.fields_mut();

        if let Some(rule) = fields.get_mut("rule").filter(|rule| !rule.is_null()) {
            let node = ValueNode::from(rule.take());
            *rule = Value::from(self.transform_rules(node));
        }

        if let Some(Value::Object(classes)) = fields.get_mut("classes") {
            for (name, params) in classes.iter_mut() {
                if self.matcher.is_match(name) {
                    self.transform_params(params);
                }
            }
        }

        group
    }

    /// Recursively map every string leaf of a rule tree.
    pub fn transform_rules(&self, node: ValueNode) -> ValueNode {
        match node {
            ValueNode::Text(text) => ValueNode::Text(self.map_hostname(text)),
            ValueNode::List(items) => {
                ValueNode::List(items.into_iter().map(|item| self.transform_rules(item)).collect())
            }
            opaque @ ValueNode::Opaque(_) => opaque,
        }
    }

    /// Map string values and the string elements of array values.
    pub fn transform_params(&self, params: &mut Value) {
        let Value::Object(params) = params else {
            return;
        };

        for value in params.values_mut() {
            let node = match ValueNode::from(value.take()) {
                ValueNode::Text(text) => ValueNode::Text(self.map_hostname(text)),
                ValueNode::List(items) => ValueNode::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            ValueNode::Text(text) => ValueNode::Text(self.map_hostname(text)),
                            other => other,
                        })
                        .collect(),
                ),
                opaque @ ValueNode::Opaque(_) => opaque,
            };
            *value = Value::from(node);
        }
    }

    fn map_hostname(&self, text: String) -> String {
        self.hostname_map.lookup(&text).to_owned()
    }
}
