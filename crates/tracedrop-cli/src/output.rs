//! Console output in human or JSON form

use serde_json::json;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Writes status lines to stdout and problems to stderr.
///
/// Human output uses check marks and indentation; JSON output emits one
/// object per status line and drops informational lines.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    format: OutputFormat,
    quiet: bool,
}

impl Console {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

impl OutputFormatter for Console {
    fn success(&self, message: &str) {
        if self.is_json() {
            println!("{}", json!({ "success": true, "message": message }));
        } else {
            println!("\u{2713} {message}");
        }
    }

    fn error(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", json!({ "success": false, "error": message }));
        } else {
            eprintln!("\u{2717} Error: {message}");
        }
    }

    fn warn(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", json!({ "level": "warning", "message": message }));
        } else {
            eprintln!("\u{26a0} Warning: {message}");
        }
    }

    fn info(&self, message: &str) {
        if !self.is_json() && !self.quiet {
            println!("  {message}");
        }
    }

    fn print_json(&self, value: &serde_json::Value) {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    Box::new(Console::new(format, quiet))
}
