use super::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccordionItem {
    pub title: String,
    pub body: String,
    pub default_open: bool,
}

impl AccordionItem {
    pub fn new(title: &str, body: &str, default_open: bool) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            default_open,
        }
    }
}

/// A stack of sections, each with its own open/closed flag.
#[derive(Debug, Clone)]
pub struct Accordion {
    items: Vec<AccordionItem>,
    open: Vec<bool>,
}

impl Accordion {
    pub fn new(items: Vec<AccordionItem>) -> Self {
        let open = items.iter().map(|i| i.default_open).collect();
        Self { items, open }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_open(&self, index: usize) -> Option<bool> {
        self.open.get(index).copied()
    }

    /// Flip one section. Returns its new state, or `None` for a bad index.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let state = self.open.get_mut(index)?;
        *state = !*state;
        Some(*state)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("<div class=\"accordion\">");
        for (index, (item, open)) in self.items.iter().zip(&self.open).enumerate() {
            out.push_str(&format!(
                "<section class=\"accordion-item\"><button type=\"button\" aria-expanded=\"{open}\" aria-controls=\"accordion-panel-{index}\">{}</button>",
                escape_html(&item.title)
            ));
            if *open {
                out.push_str(&format!(
                    "<div id=\"accordion-panel-{index}\" class=\"accordion-panel\">{}</div>",
                    escape_html(&item.body)
                ));
            }
            out.push_str("</section>");
        }
        out.push_str("</div>");
        out
    }
}
