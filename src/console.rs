//! Console output formatting with ANSI color support.
//!
//! Provides styled terminal output with automatic TTY detection
//! and respect for the NO_COLOR environment variable. Status lines go to
//! stderr so that listings on stdout can be piped.

use crate::adapters::{Episode, SearchResult, VideoOutcome};
use crate::source::MediaSource;
use std::io::{self, IsTerminal};

/// ANSI style codes for terminal formatting.
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Bold,
    Dim,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Gray,
}

impl Style {
    /// Returns the ANSI escape code for this style.
    fn code(self) -> &'static str {
        match self {
            Style::Bold => "1",
            Style::Dim => "2",
            Style::Red => "31",
            Style::Green => "32",
            Style::Yellow => "33",
            Style::Blue => "34",
            Style::Magenta => "35",
            Style::Cyan => "36",
            Style::Gray => "90",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Console output handler with color support detection.
#[derive(Debug)]
pub struct Console {
    colors_enabled: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Creates a new Console instance, detecting color support.
    ///
    /// Colors are disabled if:
    /// - The `NO_COLOR` environment variable is set
    /// - stderr, where status lines go, is not a terminal (TTY)
    pub fn new() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Self::with_colors(colors_supported(no_color, io::stderr().is_terminal()))
    }

    /// Creates a Console with colors explicitly enabled or disabled.
    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
        }
    }

    /// Applies ANSI styles to text if colors are enabled.
    pub fn style(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors_enabled || styles.is_empty() {
            return text.to_string();
        }

        let codes: Vec<&str> = styles.iter().map(|s| s.code()).collect();
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }

    /// Creates a colored label like `[INFO]`.
    pub fn label(&self, label: &str, color: Style) -> String {
        let styled = self.style(label, &[color, Style::Bold]);
        format!("[{}]", styled)
    }

    /// A labelled status line, e.g. `[WARN] message`.
    pub fn status_line(&self, label: &str, color: Style, message: &str) -> String {
        format!("{} {}", self.label(label, color), message)
    }

    /// Prints an info message with blue `[INFO]` label.
    pub fn info(&self, message: &str) {
        eprintln!("{}", self.status_line("INFO", Style::Blue, message));
    }

    /// Prints a success message with green `[OK]` label.
    pub fn success(&self, message: &str) {
        eprintln!("{}", self.status_line("OK", Style::Green, message));
    }

    /// Prints a warning message with yellow `[WARN]` label.
    pub fn warning(&self, message: &str) {
        eprintln!("{}", self.status_line("WARN", Style::Yellow, message));
    }

    /// Prints an error message with red `[ERROR]` label.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.status_line("ERROR", Style::Red, message));
    }

    /// Prints a section header in magenta bold.
    pub fn section(&self, message: &str) {
        println!();
        println!("{}", self.style(message, &[Style::Magenta, Style::Bold]));
    }

    /// Returns text styled as muted (dim gray).
    pub fn muted(&self, text: &str) -> String {
        self.style(text, &[Style::Gray, Style::Dim])
    }

    /// Formats a count with styling.
    pub fn count(&self, n: usize) -> String {
        self.style(&n.to_string(), &[Style::Green, Style::Bold])
    }

    /// One line per configured source.
    pub fn source_line(&self, source: &MediaSource) -> String {
        let url = source
            .search_config()
            .search_url
            .as_deref()
            .unwrap_or("(no searchUrl)");
        format!(
            "{}  {}",
            self.style(source.name(), &[Style::Bold]),
            self.muted(url)
        )
    }

    /// Numbered search result with its detail URL underneath.
    pub fn search_result(&self, index: usize, result: &SearchResult) -> String {
        format!(
            "{:>2}. {} {}\n    {}",
            index + 1,
            self.style(&result.title, &[Style::Bold]),
            self.muted(&format!("({})", result.source_name)),
            self.style(&result.url, &[Style::Cyan])
        )
    }

    /// Episode title, sort label and URL.
    pub fn episode_line(&self, episode: &Episode) -> String {
        let sort = if episode.sort.is_empty() {
            "-"
        } else {
            episode.sort.as_str()
        };
        format!(
            "{:>5}  {}  {}",
            self.style(sort, &[Style::Yellow]),
            episode.title,
            self.muted(&episode.url)
        )
    }

    /// Prints the result of a video extraction, with its trace when unresolved.
    pub fn video_outcome(&self, outcome: &VideoOutcome) {
        match &outcome.video_url {
            Some(url) => {
                self.success("Video URL resolved");
                println!("{}", url);
            }
            None => {
                self.warning("No video URL found");
                for step in &outcome.debug.steps {
                    let data = if step.data.is_null() {
                        String::new()
                    } else {
                        step.data.to_string()
                    };
                    eprintln!("  {} {}", self.style(&step.label, &[Style::Gray]), data);
                }
            }
        }
    }
}

fn colors_supported(no_color: bool, stderr_is_tty: bool) -> bool {
    !no_color && stderr_is_tty
}
