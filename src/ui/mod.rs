//! Terminal output for the operator.
//!
//! Step headers, results and warnings go to stdout; failures go to stderr.

pub mod icons;

use console::style;

/// Announce a step, e.g. "Setting up configuration files for staging".
pub fn step(message: &str) {
    println!("{}{}", icons::ARROW, style(message).bold());
}

pub fn success(message: &str) {
    println!("{}{}", icons::CHECK, style(message).green());
}

/// A soft failure the run continues past.
pub fn warning(message: &str) {
    println!("{}{}", icons::WARN, style(message).yellow());
}

pub fn failure(message: &str) {
    eprintln!("{}{}", icons::CROSS, style(message).red().bold());
}

pub fn created(path: &std::path::Path) {
    println!("  {}{}", icons::FILE_NEW, path.display());
}

/// Print a generated secret once.
pub fn secret(label: &str, value: &str) {
    println!("{}{} {}", icons::KEY, label, style(value).bold());
}
