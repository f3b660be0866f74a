//! Interactive conflict prompt on stdin/stderr.

use std::io::{BufRead, Write};
use std::path::Path;

use pagesieve_core::rename::conflict::{ConflictPrompt, PromptChoice};

/// Asks on the terminal; any read failure falls back to renaming, so a
/// closed stdin never blocks a run.
pub struct StdinPrompt;

impl ConflictPrompt for StdinPrompt {
    fn resolve(&self, path: &Path) -> PromptChoice {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        eprintln!("File already exists: {name}");
        eprint!("  [o]verwrite, [r]ename, [s]kip (default r): ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return PromptChoice::Rename;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "o" | "overwrite" => PromptChoice::Overwrite,
            "s" | "skip" => PromptChoice::Skip,
            _ => PromptChoice::Rename,
        }
    }
}
