/// Embedded frame for the served URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub src: String,
    pub title: &'static str,
}

impl PreviewFrame {
    /// Nothing is rendered until a non-empty URL is available.
    pub fn from_served_url(served_url: Option<&str>) -> Option<Self> {
        let src = served_url.map(str::trim).filter(|url| !url.is_empty())?;
        Some(Self {
            src: src.to_string(),
            title: crate::HEADER_TITLE,
        })
    }

    /// Isolated iframe markup embedding the served URL.
    pub fn to_html(&self) -> String {
        format!(
            "<iframe src=\"{}\" title=\"{}\" class=\"preview-iframe\" sandbox=\"allow-scripts allow-same-origin allow-forms\"></iframe>",
            escape_attr(&self.src),
            escape_attr(self.title)
        )
    }
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
