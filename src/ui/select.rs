use super::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectProps {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    pub options: Vec<SelectOption>,
    pub selected: Option<String>,
    pub placeholder: Option<String>,
    pub error: Option<String>,
}

impl SelectProps {
    /// Options built from a `(value, label)` list for an enum.
    pub fn options_from<T, F>(values: &[T], label: F) -> Vec<SelectOption>
    where
        T: std::fmt::Display,
        F: Fn(&T) -> &'static str,
    {
        values
            .iter()
            .map(|v| SelectOption::new(&v.to_string(), label(v)))
            .collect()
    }
}

/// One `<option>` per supplied pair, in the supplied order. The placeholder,
/// when present, is rendered as a disabled empty option before them.
pub fn render_select(props: &SelectProps) -> String {
    let id = escape_html(&props.id);
    let error = props.error.as_deref().filter(|e| !e.is_empty());
    let mut out = String::from("<div class=\"field\">");

    if let Some(label) = &props.label {
        out.push_str(&format!("<label for=\"{id}\">{}</label>", escape_html(label)));
    }
    out.push_str(&format!(
        "<select id=\"{id}\" name=\"{}\"",
        escape_html(&props.name)
    ));
    if error.is_some() {
        out.push_str(" aria-invalid=\"true\"");
    }
    out.push('>');

    if let Some(placeholder) = &props.placeholder {
        out.push_str(&format!(
            "<option value=\"\" disabled{}>{}</option>",
            if props.selected.is_none() { " selected" } else { "" },
            escape_html(placeholder)
        ));
    }
    for option in &props.options {
        let selected = props.selected.as_deref() == Some(option.value.as_str());
        out.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            escape_html(&option.value),
            if selected { " selected" } else { "" },
            escape_html(&option.label)
        ));
    }
    out.push_str("</select>");

    if let Some(error) = error {
        out.push_str(&format!("<p class=\"field-error\">{}</p>", escape_html(error)));
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseStatus;
    use crate::status::StatusBadge;

    fn region_props() -> SelectProps {
        SelectProps {
            id: "region".into(),
            name: "anatomy_region".into(),
            options: vec![
                SelectOption::new("LUMBAR", "Lumbar"),
                SelectOption::new("CERVICAL", "Cervical"),
                SelectOption::new("THORACIC", "Thoracic"),
                SelectOption::new("OTHER", "Other"),
            ],
            ..SelectProps::default()
        }
    }

    #[test]
    fn one_option_per_pair_in_order() {
        let props = region_props();
        let html = render_select(&props);
        assert_eq!(html.matches("<option").count(), props.options.len());

        let mut last = 0;
        for option in &props.options {
            let pos = html
                .find(&format!("value=\"{}\"", option.value))
                .expect("option rendered");
            assert!(pos > last, "{} out of order", option.value);
            last = pos;
        }
    }

    #[test]
    fn selected_value_is_marked_once() {
        let mut props = region_props();
        props.selected = Some("THORACIC".into());
        let html = render_select(&props);
        assert_eq!(html.matches(" selected").count(), 1);
        assert!(html.contains("<option value=\"THORACIC\" selected>Thoracic</option>"));
    }

    #[test]
    fn placeholder_is_extra_disabled_option() {
        let mut props = region_props();
        props.placeholder = Some("Choose a region".into());
        let html = render_select(&props);
        assert_eq!(html.matches("<option").count(), props.options.len() + 1);
        assert!(html.contains("<option value=\"\" disabled selected>Choose a region</option>"));
    }

    #[test]
    fn error_marks_select_invalid() {
        let mut props = region_props();
        props.error = Some("Region is required".into());
        let html = render_select(&props);
        assert!(html.contains("aria-invalid=\"true\""));
        assert!(html.contains("<p class=\"field-error\">Region is required</p>"));
    }

    #[test]
    fn empty_error_is_not_rendered() {
        let mut props = region_props();
        props.error = Some(String::new());
        let html = render_select(&props);
        assert!(!html.contains("aria-invalid"));
        assert!(!html.contains("field-error"));
    }

    #[test]
    fn options_from_enum_preserve_declaration_order() {
        let options = SelectProps::options_from(CaseStatus::ALL, |s| s.badge().label);
        assert_eq!(options.first().map(|o| o.value.as_str()), Some("DRAFT"));
        assert_eq!(options[2].label, "Under Review");
        assert_eq!(options.len(), CaseStatus::ALL.len());
    }
}
