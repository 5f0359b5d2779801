//! Server-rendered presentational controls.
//!
//! Each control is a pure function of its props to escaped HTML markup; none
//! validates input beyond showing an error string supplied by the caller.

pub mod accordion;
pub mod badge;
pub mod input;
pub mod select;

pub use accordion::{Accordion, AccordionItem};
pub use badge::render_badge;
pub use input::{render_input, InputProps};
pub use select::{render_select, SelectOption, SelectProps};

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b class="x">O'Neil & co</b>"#),
            "&lt;b class=&quot;x&quot;&gt;O&#39;Neil &amp; co&lt;/b&gt;"
        );
    }
}
