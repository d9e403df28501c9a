use sourcebridge_core::domain::IngestError;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Sink for everything a command reports to the user
///
/// Results go to stdout; errors and warnings go to stderr so that
/// `--json` output stays parseable when piped.
pub trait OutputFormatter: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Terminal output with status glyphs
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON object per line; `info` lines are dropped
pub struct JsonFormatter;

impl JsonFormatter {
    fn line(level: &str, message: &str) -> serde_json::Value {
        serde_json::json!({ "level": level, "message": message })
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::line("success", message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::line("error", message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::line("warning", message));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", Self::line("error", &e.to_string())),
        }
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Prints the follow-up command for errors the user can fix
///
/// The error itself is reported by `main` once the command returns it.
pub fn print_hint(fmt: &dyn OutputFormatter, err: &IngestError, provider: &str) {
    match err {
        IngestError::NotConnected(_) => {
            fmt.info(&format!("Run `sourcebridge auth connect {provider}` first."));
        }
        IngestError::MissingConfiguration(_) => {
            fmt.info("Set the client id with `sourcebridge config init` and edit the file.");
        }
        e if e.suggests_reconnect() => {
            fmt.info(&format!(
                "Run `sourcebridge auth reconnect {provider}` to refresh access."
            ));
        }
        _ => {}
    }
}

/// Formats a byte count as a short human-readable size
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
