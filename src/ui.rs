//! Terminal output: color control and stage lines.
//!
//! Colors follow the NO_COLOR standard (<https://no-color.org/>) and the
//! CLICOLOR conventions, falling back to TTY detection on stdout.

use brewsmith::Stage;
use colored::{Colorize, control};
use std::io::IsTerminal;

/// Decide once whether output is colored
pub fn init_colors() {
    control::set_override(colors_enabled(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var("CLICOLOR").ok().as_deref(),
        std::env::var("CLICOLOR_FORCE").ok().as_deref(),
        std::io::stdout().is_terminal(),
    ));
}

fn colors_enabled(no_color: bool, clicolor: Option<&str>, force: Option<&str>, tty: bool) -> bool {
    if no_color {
        return false;
    }
    if force.is_some_and(|v| v != "0") {
        return true;
    }
    if clicolor == Some("0") {
        return false;
    }
    tty
}

/// Whether a download progress bar would render usefully
pub fn show_progress() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn stage_verb(stage: Stage) -> &'static str {
    match stage {
        Stage::Recipe => "Reading recipe",
        Stage::Fetch => "Fetching",
        Stage::Verify => "Verifying",
        Stage::Extract => "Extracting",
        Stage::Build => "Building",
        Stage::Install => "Installing",
        Stage::Test => "Testing",
    }
}

/// `==> Fetching git-secrets 1.3.1`
pub fn stage_line(stage: Stage, name: &str, version: &str) {
    println!(
        "{} {} {} {}",
        "==>".blue().bold(),
        stage_verb(stage).bold(),
        name.cyan(),
        version.dimmed()
    );
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn failure(stage: Stage, message: &str) {
    eprintln!("{} {}", format!("Error [{}]:", stage).red().bold(), message);
}
