//! Minimal JSONPath: `$`, `.name`, `['name']`, `[n]`, `[*]`, `.*`, `..name` and `..*`.

use crate::error::ExpressionError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

/// Parsed JSONPath query.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parses a query. The query must start with `$`.
    pub fn parse(path: &str) -> Result<Self, ExpressionError> {
        let path = path.trim();
        let rest = path
            .strip_prefix('$')
            .ok_or_else(|| syntax(path, "query must start with `$`"))?;

        let chars: Vec<char> = rest.chars().collect();
        let mut segments = vec![];
        let mut pos = 0;

        while pos < chars.len() {
            match chars[pos] {
                '.' if chars.get(pos + 1) == Some(&'.') => {
                    pos += 2;
                    if chars.get(pos) == Some(&'*') {
                        pos += 1;
                        segments.push(Segment::DescendantWildcard);
                    } else {
                        let name = read_name(&chars, &mut pos);
                        if name.is_empty() {
                            return Err(syntax(path, "expected a name after `..`"));
                        }
                        segments.push(Segment::Descendant(name));
                    }
                }
                '.' => {
                    pos += 1;
                    if chars.get(pos) == Some(&'*') {
                        pos += 1;
                        segments.push(Segment::Wildcard);
                    } else {
                        let name = read_name(&chars, &mut pos);
                        if name.is_empty() {
                            return Err(syntax(path, "expected a name after `.`"));
                        }
                        segments.push(Segment::Child(name));
                    }
                }
                '[' => {
                    pos += 1;
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .ok_or_else(|| syntax(path, "unclosed `[`"))?;
                    let inner: String = chars[pos..pos + close].iter().collect();
                    pos += close + 1;
                    segments.push(bracket_segment(inner.trim()).ok_or_else(|| {
                        syntax(path, &format!("invalid selector `[{inner}]`"))
                    })?);
                }
                other => return Err(syntax(path, &format!("unexpected `{other}`"))),
            }
        }

        Ok(Self { segments })
    }

    /// Returns all matches in document order.
    pub fn query<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = vec![];
            for node in current {
                match segment {
                    Segment::Child(name) => next.extend(node.get(name.as_str())),
                    Segment::Index(index) => {
                        if let Value::Array(items) = node {
                            let index = if *index < 0 {
                                items.len() as i64 + index
                            } else {
                                *index
                            };
                            if index >= 0 {
                                next.extend(items.get(index as usize));
                            }
                        }
                    }
                    Segment::Wildcard => next.extend(children(node)),
                    Segment::Descendant(name) => {
                        let mut all = vec![node];
                        collect_descendants(node, &mut all);
                        next.extend(all.into_iter().filter_map(|v| v.get(name.as_str())));
                    }
                    Segment::DescendantWildcard => collect_descendants(node, &mut next),
                }
            }
            current = next;
        }

        current
    }

    /// Returns the first match.
    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.query(root).into_iter().next()
    }
}

fn syntax(path: &str, message: &str) -> ExpressionError {
    ExpressionError::Syntax(format!("JSONPath `{path}`: {message}"))
}

fn read_name(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && chars[*pos] != '.' && chars[*pos] != '[' {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn bracket_segment(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }

    for quote in ['\'', '"'] {
        if let Some(name) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Some(Segment::Child(name.to_string()));
        }
    }

    inner.parse().ok().map(Segment::Index)
}

fn children(node: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match node {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(object) => Box::new(object.values()),
        _ => Box::new(std::iter::empty()),
    }
}

fn collect_descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    for child in children(node) {
        out.push(child);
        collect_descendants(child, out);
    }
}
