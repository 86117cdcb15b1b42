//! `${name}` URI templates
//!
//! Templates are resolved in stages (kind template, then sheet parameters,
//! then entity fields), so a name with no value leaves its placeholder intact.
//! Values are inserted verbatim; callers encode them first when needed.

use std::collections::HashMap;

/// Replace every `${name}` whose name is in `params`
pub fn resolve(template: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    scan(template, |part| match part {
        Part::Literal(text) => out.push_str(text),
        Part::Placeholder(name) => match params.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        },
    });
    out
}

/// Names of the placeholders left in `template`, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    scan(template, |part| {
        if let Part::Placeholder(name) = part
            && !names.iter().any(|n| n == name)
        {
            names.push(name.to_string());
        }
    });
    names
}

/// Whether no placeholder remains
pub fn is_resolved(uri: &str) -> bool {
    placeholders(uri).is_empty()
}

/// Append `query` (already encoded, without `?`) to `uri`
pub fn append_query(uri: &str, query: &str) -> String {
    if query.is_empty() {
        uri.to_string()
    } else if uri.contains('?') {
        format!("{}&{}", uri, query)
    } else {
        format!("{}?{}", uri, query)
    }
}

enum Part<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn scan<'a>(template: &'a str, mut visit: impl FnMut(Part<'a>)) {
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unclosed placeholder, the remainder is literal text
            break;
        };

        if start > 0 {
            visit(Part::Literal(&rest[..start]));
        }
        visit(Part::Placeholder(&after[..end]));
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        visit(Part::Literal(rest));
    }
}
