//! Terminal output in human or JSON form
//!
//! Human mode prints marked lines; JSON mode prints one document per
//! command and keeps stdout free of prose so it can be piped.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tone {
    Success,
    Info,
    Warn,
    Error,
}

/// Writes command results in the selected format
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format.is_json()
    }

    pub fn success(&self, message: &str) {
        self.emit(Tone::Success, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Tone::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Tone::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Tone::Error, message);
    }

    /// Prints `value` as pretty JSON; ignored in human mode
    pub fn document<T: Serialize + ?Sized>(&self, value: &T) {
        if !self.is_json() {
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("Could not render output: {e}")),
        }
    }

    fn emit(&self, tone: Tone, message: &str) {
        let Some(line) = self.render(tone, message) else {
            return;
        };
        match tone {
            Tone::Success | Tone::Info => println!("{line}"),
            Tone::Warn | Tone::Error => eprintln!("{line}"),
        }
    }

    /// The line printed for a message, or `None` when the format drops it
    fn render(&self, tone: Tone, message: &str) -> Option<String> {
        match (self.format, tone) {
            (OutputFormat::Human, Tone::Success) => Some(format!("\u{2713} {message}")),
            (OutputFormat::Human, Tone::Info) => Some(format!("  {message}")),
            (OutputFormat::Human, Tone::Warn) => Some(format!("\u{26a0} Warning: {message}")),
            (OutputFormat::Human, Tone::Error) => Some(format!("\u{2717} Error: {message}")),
            (OutputFormat::Json, Tone::Info) => None,
            (OutputFormat::Json, Tone::Success) => {
                Some(serde_json::json!({"success": true, "message": message}).to_string())
            }
            (OutputFormat::Json, Tone::Warn) => {
                Some(serde_json::json!({"level": "warning", "message": message}).to_string())
            }
            (OutputFormat::Json, Tone::Error) => {
                Some(serde_json::json!({"success": false, "error": message}).to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_lines_are_marked() {
        let out = Output::new(OutputFormat::Human);
        assert_eq!(out.render(Tone::Success, "Synced 2").as_deref(), Some("\u{2713} Synced 2"));
        assert_eq!(out.render(Tone::Info, "Queued: 1").as_deref(), Some("  Queued: 1"));
        assert!(out.render(Tone::Warn, "Offline").unwrap().contains("Warning: Offline"));
    }

    #[test]
    fn test_json_mode_keeps_stdout_machine_readable() {
        let out = Output::new(OutputFormat::Json);
        assert!(out.render(Tone::Info, "detail").is_none());

        let line = out.render(Tone::Error, "boom").unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "boom");
    }
}
