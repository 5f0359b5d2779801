use super::escape_html;

#[derive(Debug, Clone, Default)]
pub struct InputProps {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    pub input_type: Option<String>,
    pub value: String,
    pub placeholder: Option<String>,
    pub required: bool,
    /// Caller-supplied validation message.
    pub error: Option<String>,
}

pub fn render_input(props: &InputProps) -> String {
    let id = escape_html(&props.id);
    let mut out = String::from("<div class=\"field\">");

    if let Some(label) = &props.label {
        out.push_str(&format!("<label for=\"{id}\">{}</label>", escape_html(label)));
    }

    out.push_str(&format!(
        "<input id=\"{id}\" name=\"{}\" type=\"{}\" value=\"{}\"",
        escape_html(&props.name),
        escape_html(props.input_type.as_deref().unwrap_or("text")),
        escape_html(&props.value),
    ));
    if let Some(placeholder) = &props.placeholder {
        out.push_str(&format!(" placeholder=\"{}\"", escape_html(placeholder)));
    }
    if props.required {
        out.push_str(" required");
    }
    match props.error.as_deref().filter(|e| !e.is_empty()) {
        Some(error) => {
            out.push_str(&format!(
                " aria-invalid=\"true\" aria-describedby=\"{id}-error\"><p id=\"{id}-error\" class=\"field-error\">{}</p>",
                escape_html(error)
            ));
        }
        None => out.push('>'),
    }

    out.push_str("</div>");
    out
}
