use super::escape_html;
use crate::status::{StatusBadge, StatusDisplay};

fn render_display(display: StatusDisplay) -> String {
    format!(
        "<span class=\"badge badge-{}\">{}</span>",
        display.variant.as_str(),
        escape_html(display.label)
    )
}

pub fn render_badge<T: StatusBadge>(status: &T) -> String {
    render_display(status.badge())
}
