//! CLI output formatting

use crate::core::target::Target;
use crate::project::GeneratedFile;
use console::Emoji;

pub use console::style;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// One line per generated file
pub fn format_file(file: &GeneratedFile) -> String {
    let lines = file.content.lines().count();
    if file.executable {
        format!("  {} {}", style(&file.path).bold(), style(format!("({} lines, executable)", lines)).dim())
    } else {
        format!("  {} {}", style(&file.path).bold(), style(format!("({} lines)", lines)).dim())
    }
}

pub fn format_target(target: Target) -> String {
    style(target.as_str()).cyan().to_string()
}

/// Print generated content, truncated to `max_lines` per file
pub fn format_preview(file: &GeneratedFile, max_lines: usize) -> String {
    let lines: Vec<&str> = file.content.lines().collect();
    let mut preview = format!("{}\n", style(format!("--- {}", file.path)).dim());

    if lines.len() <= max_lines {
        preview.push_str(&file.content);
    } else {
        preview.push_str(&lines[..max_lines].join("\n"));
        preview.push_str(&format!(
            "\n{}... ({} more lines)",
            style("[truncated]").dim(),
            lines.len() - max_lines
        ));
    }
    preview
}
