use preview_core::{AppViewModel, HEADER_TITLE};

use super::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Heading,
    Information,
    Hint,
    Error,
}

/// One line of the terminal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLine {
    pub severity: Severity,
    pub text: String,
}

impl FrameLine {
    fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    /// Text with color codes, for interactive terminals.
    pub fn styled(&self) -> String {
        match self.severity {
            Severity::Heading => format!("{ANSI_BOLD}{}{ANSI_RESET}", self.text),
            Severity::Information => self.text.clone(),
            Severity::Hint => format!("{ANSI_DIM}{}{ANSI_RESET}", self.text),
            Severity::Error => format!("{ANSI_RED}{}{ANSI_RESET}", self.text),
        }
    }
}

pub fn render(view: &AppViewModel) -> Vec<FrameLine> {
    let mut lines = Vec::new();

    if view.show_header {
        lines.push(FrameLine::new(
            Severity::Heading,
            format!("{HEADER_RULE} {HEADER_TITLE} {HEADER_RULE}"),
        ));
    }

    if let Some(label) = &view.status_label {
        let text = match view.spinner {
            Some(glyph) => format!("{glyph} {label}"),
            None => label.clone(),
        };
        let severity = if view.failed {
            Severity::Error
        } else {
            Severity::Information
        };
        lines.push(FrameLine::new(severity, text));
    }

    if let Some(tip) = view.tip {
        lines.push(FrameLine::new(Severity::Hint, format!("{TIP_PREFIX}{tip}")));
    }

    if let Some(frame) = &view.preview {
        lines.push(FrameLine::new(
            Severity::Heading,
            format!("{PREVIEW_PREFIX}{}", frame.src),
        ));
        lines.push(FrameLine::new(Severity::Hint, frame.to_html()));
    }

    lines
}
