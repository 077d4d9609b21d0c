//! Document Rendering
//!
//! The renderer is the pipeline's expensive collaborator: a pure function from
//! a template and input data to output markup.

use serde_json::Value;

use crate::error::RenderError;
use crate::pipeline::Template;

// == Document Renderer ==
/// Turns a template plus structured input into a document.
///
/// Implementations must be pure: identical arguments give identical output.
/// The pipeline may call them on a worker thread or on the caller's task.
pub trait DocumentRenderer: Send + Sync + 'static {
    fn render(&self, template: &Template, input: &Value) -> Result<String, RenderError>;
}

impl<F> DocumentRenderer for F
where
    F: Fn(&Template, &Value) -> Result<String, RenderError> + Send + Sync + 'static,
{
    fn render(&self, template: &Template, input: &Value) -> Result<String, RenderError> {
        self(template, input)
    }
}

// == Placeholder Renderer ==
/// Replaces `{{path.to.field}}` placeholders with HTML-escaped input values.
///
/// Arrays are addressed by index (`{{jobs.0.title}}`). A placeholder whose
/// path is missing from the input is an error when `strict` is set and
/// renders as an empty string otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer {
    pub strict: bool,
}

impl PlaceholderRenderer {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl DocumentRenderer for PlaceholderRenderer {
    fn render(&self, template: &Template, input: &Value) -> Result<String, RenderError> {
        let body = template.body.as_str();
        let mut out = String::with_capacity(body.len());
        let mut rest = body;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                RenderError::new(format!("unclosed placeholder in template {}", template.id))
            })?;
            let path = after[..end].trim();

            match lookup(input, path) {
                Some(value) => push_escaped(&mut out, &display(value)),
                None if self.strict => {
                    return Err(RenderError::new(format!("missing field: {path}")));
                }
                None => {}
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn lookup<'a>(input: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(input, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
