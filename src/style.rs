//! Terminal styling utilities for the verification report

/// ANSI color codes
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

use colors::*;

/// Styling that can be switched off for files, pipes and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
}

impl Style {
    pub const PLAIN: Style = Style { color: false };

    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    pub fn for_stdout() -> Self {
        use std::io::IsTerminal;
        Self {
            color: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.color {
            format!("{}{}{}", code, s, RESET)
        } else {
            s.to_string()
        }
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    pub fn red(&self, s: &str) -> String {
        self.paint(RED, s)
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint(YELLOW, s)
    }

    pub fn cyan(&self, s: &str) -> String {
        self.paint(CYAN, s)
    }

    pub fn gray(&self, s: &str) -> String {
        self.paint(GRAY, s)
    }

    // Status indicators
    pub fn icon_success(&self) -> String {
        self.green("✓")
    }

    pub fn icon_error(&self) -> String {
        self.red("✗")
    }

    pub fn icon_warning(&self) -> String {
        self.yellow("⚠")
    }

    // Section headers
    pub fn header(&self, title: &str) -> String {
        let rule = "─".repeat(50usize.saturating_sub(title.chars().count()));
        self.bold(&self.cyan(&format!("{} {}", title, rule)))
    }

    pub fn section(&self, title: &str) -> String {
        let rule = "-".repeat(54usize.saturating_sub(title.chars().count()));
        format!("{} {}", self.bold(&format!("- {}", title)), self.dim(&rule))
    }
}

/// Fraction as a percentage with one decimal, `NA` when absent
pub fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", 100.0 * v))
        .unwrap_or_else(|| "NA".to_string())
}

/// Probability with four decimals, `NA` when absent
pub fn prob(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "NA".to_string())
}

/// 0/1 flag as written in the input, `NA` when absent
pub fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "1".to_string(),
        Some(false) => "0".to_string(),
        None => "NA".to_string(),
    }
}

// Print helpers for the binaries
pub fn print_error(msg: &str) {
    use std::io::IsTerminal;
    let style = Style {
        color: std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    };
    eprintln!("{} {}", style.icon_error(), style.red(msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_style_has_no_escapes() {
        let style = Style::PLAIN;
        assert_eq!(style.red("x"), "x");
        assert!(!style.header("Summary").contains('\x1b'));
    }

    #[test]
    fn test_colored_style_wraps() {
        let style = Style { color: true };
        assert_eq!(style.green("ok"), "\x1b[32mok\x1b[0m");
    }

    #[test]
    fn test_formatters() {
        assert_eq!(pct(Some(0.75)), "75.0%");
        assert_eq!(pct(None), "NA");
        assert_eq!(prob(Some(0.5)), "0.5000");
        assert_eq!(flag(Some(false)), "0");
        assert_eq!(flag(None), "NA");
    }
}
