use serde_json::Value;

use crate::error::{EditorError, Result};

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `.name` or `['name']`
    Field(String),
    /// `[3]` or `[-1]`
    Index(i64),
    /// `[*]`
    Wildcard,
}

/// A concrete location inside a document, produced by matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Idx(usize),
}

/// A parsed JSONPath expression.
///
/// Supported subset: `$` root, `.key` and `['key']` member access, `[n]`
/// index access (negative counts from the end), and `[*]` wildcard over
/// arrays and objects. Recursive descent (`..`) is rejected.
#[derive(Debug, Clone)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut chars = raw.chars().peekable();
        if chars.next() != Some('$') {
            return Err(parse_error(raw, "must start with '$'"));
        }

        let mut segments = Vec::new();
        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    chars.next();
                    if chars.peek() == Some(&'.') {
                        return Err(parse_error(raw, "recursive descent ('..') is not supported"));
                    }
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n == '.' || n == '[' {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(parse_error(raw, "empty member name after '.'"));
                    }
                    segments.push(Segment::Field(name));
                }
                '[' => {
                    chars.next();
                    let mut inner = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(n);
                    }
                    if !closed {
                        return Err(parse_error(raw, "unterminated '['"));
                    }
                    let inner = inner.trim();
                    if inner == "*" {
                        segments.push(Segment::Wildcard);
                    } else if (inner.starts_with('\'') && inner.ends_with('\'') && inner.len() >= 2)
                        || (inner.starts_with('"') && inner.ends_with('"') && inner.len() >= 2)
                    {
                        segments.push(Segment::Field(inner[1..inner.len() - 1].to_string()));
                    } else {
                        let index: i64 = inner
                            .parse()
                            .map_err(|_| parse_error(raw, "expected an index, '*', or a quoted key inside '[]'"))?;
                        segments.push(Segment::Index(index));
                    }
                }
                _ => return Err(parse_error(raw, "expected '.' or '[' after a segment")),
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The parent path (all but the last segment) and the final segment.
    /// `None` for the bare root.
    pub fn split_last(&self) -> Option<(JsonPath, &Segment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            JsonPath {
                segments: rest.to_vec(),
            },
            last,
        ))
    }

    /// Every concrete location this path matches in `root`.
    pub fn resolve(&self, root: &Value) -> Vec<Vec<Step>> {
        let mut matches = vec![Vec::new()];
        for segment in &self.segments {
            let mut next = Vec::new();
            for concrete in &matches {
                let Some(value) = lookup(root, concrete) else {
                    continue;
                };
                match segment {
                    Segment::Field(name) => {
                        if value.get(name.as_str()).is_some() {
                            let mut path = concrete.clone();
                            path.push(Step::Key(name.clone()));
                            next.push(path);
                        }
                    }
                    Segment::Index(index) => {
                        if let Value::Array(items) = value {
                            if let Some(idx) = absolute_index(*index, items.len()) {
                                let mut path = concrete.clone();
                                path.push(Step::Idx(idx));
                                next.push(path);
                            }
                        }
                    }
                    Segment::Wildcard => match value {
                        Value::Array(items) => {
                            for idx in 0..items.len() {
                                let mut path = concrete.clone();
                                path.push(Step::Idx(idx));
                                next.push(path);
                            }
                        }
                        Value::Object(map) => {
                            for key in map.keys() {
                                let mut path = concrete.clone();
                                path.push(Step::Key(key.clone()));
                                next.push(path);
                            }
                        }
                        _ => {}
                    },
                }
            }
            matches = next;
        }
        matches
    }
}

/// Resolve a concrete step list to a value reference.
pub fn lookup<'a>(root: &'a Value, steps: &[Step]) -> Option<&'a Value> {
    let mut current = root;
    for step in steps {
        current = match step {
            Step::Key(key) => current.get(key.as_str())?,
            Step::Idx(idx) => current.get(*idx)?,
        };
    }
    Some(current)
}

/// Resolve a concrete step list to a mutable value reference.
pub fn lookup_mut<'a>(root: &'a mut Value, steps: &[Step]) -> Option<&'a mut Value> {
    let mut current = root;
    for step in steps {
        current = match step {
            Step::Key(key) => current.get_mut(key.as_str())?,
            Step::Idx(idx) => current.get_mut(*idx)?,
        };
    }
    Some(current)
}

/// Render a concrete step list back as a JSONPath string.
pub fn render_steps(steps: &[Step]) -> String {
    let mut out = String::from("$");
    for step in steps {
        match step {
            Step::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            Step::Idx(idx) => {
                out.push_str(&format!("[{idx}]"));
            }
        }
    }
    out
}

fn absolute_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let idx = index as usize;
        (idx < len).then_some(idx)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

fn parse_error(raw: &str, reason: &str) -> EditorError {
    EditorError::Parse(format!("invalid JSONPath expression '{raw}': {reason}"))
}
