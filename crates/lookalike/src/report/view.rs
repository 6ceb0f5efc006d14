//! Template rendering.
//!
//! [`MustacheView`] implements the logic-less subset of mustache the report
//! templates need:
//!
//! - `{{name}}` HTML-escaped value, `{{{name}}}` or `{{&name}}` raw value
//! - dotted names (`{{summary.passed}}`) and the current item (`{{.}}`)
//! - `{{#name}}...{{/name}}` sections: lists repeat, truthy values render once
//! - `{{^name}}...{{/name}}` inverted sections
//! - `{{! comments }}`
//!
//! Missing names render as nothing. `null`, `false`, `""` and `[]` are falsy.

use crate::result::{LookalikeError, LookalikeResult};
use serde_json::Value;
use std::fmt;

/// Render capability consumed by the report service
pub trait ReportView: Send + Sync + fmt::Debug {
    /// Render `template` against `model`
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::Template`] if the template is malformed
    fn render(&self, template: &str, model: &Value) -> LookalikeResult<String>;
}

/// Built-in mustache-style renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheView;

impl MustacheView {
    /// Create a renderer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ReportView for MustacheView {
    fn render(&self, template: &str, model: &Value) -> LookalikeResult<String> {
        let nodes = parse(template)?;
        let mut out = String::with_capacity(template.len());
        let mut stack = vec![model];
        render_nodes(&nodes, &mut stack, &mut out);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable {
        name: String,
        escape: bool,
    },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

fn parse(template: &str) -> LookalikeResult<Vec<Node>> {
    // Open sections: (name, inverted, siblings collected before the section)
    let mut open: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut current = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            current.push(Node::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let (tag, triple, consumed) = if let Some(inner) = after.strip_prefix('{') {
            let end = inner
                .find("}}}")
                .ok_or_else(|| LookalikeError::template("unterminated '{{{' tag"))?;
            (&inner[..end], true, end + 4)
        } else {
            let end = after
                .find("}}")
                .ok_or_else(|| LookalikeError::template("unterminated '{{' tag"))?;
            (&after[..end], false, end + 2)
        };
        rest = &after[consumed..];
        let tag = tag.trim();

        if triple {
            current.push(Node::Variable {
                name: tag.to_string(),
                escape: false,
            });
            continue;
        }

        match tag.as_bytes().first() {
            Some(b'#' | b'^') => {
                let name = tag[1..].trim().to_string();
                open.push((name, tag.starts_with('^'), std::mem::take(&mut current)));
            }
            Some(b'/') => {
                let name = tag[1..].trim();
                let (opened, inverted, parent) = open.pop().ok_or_else(|| {
                    LookalikeError::template(format!("closing tag '/{name}' has no open section"))
                })?;
                if opened != name {
                    return Err(LookalikeError::template(format!(
                        "section '{opened}' closed by '/{name}'"
                    )));
                }
                let children = std::mem::replace(&mut current, parent);
                current.push(Node::Section {
                    name: opened,
                    inverted,
                    children,
                });
            }
            Some(b'!') => {}
            Some(b'&') => current.push(Node::Variable {
                name: tag[1..].trim().to_string(),
                escape: false,
            }),
            _ => current.push(Node::Variable {
                name: tag.to_string(),
                escape: true,
            }),
        }
    }

    if let Some((name, _, _)) = open.pop() {
        return Err(LookalikeError::template(format!("unclosed section '{name}'")));
    }
    if !rest.is_empty() {
        current.push(Node::Text(rest.to_string()));
    }
    Ok(current)
}

fn render_nodes<'a>(nodes: &[Node], stack: &mut Vec<&'a Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                if let Some(value) = lookup(stack, name) {
                    let text = to_text(value);
                    if *escape {
                        out.push_str(&escape_xml(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                if *inverted {
                    if !is_truthy(value) {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(value) if is_truthy(Some(value)) => {
                        stack.push(value);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    if name == "." {
        return stack.last().copied();
    }
    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = stack.iter().rev().copied().find_map(|ctx| ctx.get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape XML/HTML special characters
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
