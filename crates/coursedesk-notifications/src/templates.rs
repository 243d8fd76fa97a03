use std::collections::HashMap;

use crate::error::NotificationError;

/// Template id of the "new assignment" mail.
pub const ASSIGNMENT_CREATED: &str = "assignment_created";

const ASSIGNMENT_CREATED_SUBJECT: &str = "New assignment: {{title}}";
const ASSIGNMENT_CREATED_HTML: &str = "<h2>New assignment: {{title}}</h2>\
<p>{{teacher}} has published a new assignment.</p>\
<p>{{description}}</p>\
<p><strong>Due:</strong> {{due_date}}</p>";

/// Simple template renderer using {{variable}} syntax.
///
/// Values substituted into the HTML body are escaped; the subject is plain
/// text and is left as is. Unknown placeholders render as empty strings.
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// A renderer preloaded with the built-in templates.
    pub fn with_builtin() -> Self {
        let mut renderer = Self::new();
        renderer.register(Template {
            id: ASSIGNMENT_CREATED.to_string(),
            subject: ASSIGNMENT_CREATED_SUBJECT.to_string(),
            html_body: ASSIGNMENT_CREATED_HTML.to_string(),
        });
        renderer
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.get(template_id)
    }

    pub fn render(
        &self,
        template_id: &str,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<RenderedEmail, NotificationError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or(NotificationError::TemplateNotFound(template_id.to_string()))?;

        Ok(RenderedEmail {
            subject: render_string(&template.subject, data, false),
            html_body: render_string(&template.html_body, data, true),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        _ => value.to_string(),
    }
}

// Single pass, so substituted values are never rescanned for placeholders.
fn render_string(
    template: &str,
    data: &HashMap<String, serde_json::Value>,
    escape: bool,
) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let key = after[..end].trim();
        if let Some(value) = data.get(key) {
            let value = value_to_string(value);
            if escape {
                result.push_str(&escape_html(&value));
            } else {
                result.push_str(&value);
            }
        }
        rest = &after[end + 2..];
    }

    result.push_str(rest);
    result
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_template() {
        let mut renderer = TemplateRenderer::new();
        renderer.register(Template {
            id: "test".to_string(),
            subject: "Hello {{name}}".to_string(),
            html_body: "<p>You have {{count}} new submissions</p>".to_string(),
        });

        let result = renderer
            .render(
                "test",
                &data(&[
                    ("name", serde_json::json!("Ada")),
                    ("count", serde_json::json!(5)),
                ]),
            )
            .unwrap();
        assert_eq!(result.subject, "Hello Ada");
        assert_eq!(result.html_body, "<p>You have 5 new submissions</p>");
    }

    #[test]
    fn html_values_are_escaped_but_subject_is_not() {
        let renderer = TemplateRenderer::with_builtin();
        let result = renderer
            .render(
                ASSIGNMENT_CREATED,
                &data(&[
                    ("title", serde_json::json!("<b>Loops & Lists</b>")),
                    ("teacher", serde_json::json!("grace")),
                    ("description", serde_json::json!("Read ch. 3")),
                    ("due_date", serde_json::json!("2026-11-01T12:00:00Z")),
                ]),
            )
            .unwrap();

        assert_eq!(result.subject, "New assignment: <b>Loops & Lists</b>");
        assert!(
            result
                .html_body
                .contains("&lt;b&gt;Loops &amp; Lists&lt;/b&gt;")
        );
        assert!(result.html_body.contains("2026-11-01T12:00:00Z"));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let rendered = render_string(
            "{{a}}|{{b}}",
            &data(&[
                ("a", serde_json::json!("{{b}}")),
                ("b", serde_json::json!("x")),
            ]),
            false,
        );
        assert_eq!(rendered, "{{b}}|x");
    }

    #[test]
    fn unknown_and_unterminated_placeholders() {
        let empty = HashMap::new();
        assert_eq!(render_string("a{{missing}}b", &empty, true), "ab");
        assert_eq!(render_string("a{{open", &empty, true), "a{{open");
    }

    #[test]
    fn test_template_not_found() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("nonexistent", &HashMap::new());
        assert!(matches!(
            result,
            Err(NotificationError::TemplateNotFound(_))
        ));
    }
}
