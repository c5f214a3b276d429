pub const HEADER_RULE: &str = "==";
pub const TIP_PREFIX: &str = "  tip: ";
pub const PREVIEW_PREFIX: &str = "Preview ready at ";

pub const ANSI_RED: &str = "\u{1b}[31m";
pub const ANSI_DIM: &str = "\u{1b}[2m";
pub const ANSI_BOLD: &str = "\u{1b}[1m";
pub const ANSI_RESET: &str = "\u{1b}[0m";
pub const ANSI_CLEAR_BELOW: &str = "\u{1b}[J";
