//! Output and reporting for Hoist

use colored::Colorize;

/// Print the deployment header
pub fn deploy_header(name: &str) {
    let header = format!("DEPLOY [{}]", name);
    let stars = "*".repeat(80_usize.saturating_sub(header.len()));
    println!("\n{} {}", header.bright_white().bold(), stars.bright_black());
}

/// Print a step header
pub fn step_header(name: &str) {
    let header = format!("STEP [{}]", name);
    let stars = "*".repeat(80_usize.saturating_sub(header.len()));
    println!("\n{} {}", header.bright_white().bold(), stars.bright_black());
}

/// Print a created result
pub fn created(resource: &str, detail: &str) {
    println!(
        "{}: [{}] => {}",
        "created".yellow(),
        resource.bright_white().bold(),
        detail
    );
}

/// Print an unchanged result
pub fn ok(resource: &str, detail: &str) {
    println!(
        "{}: [{}] => {}",
        "ok".green(),
        resource.bright_white().bold(),
        detail
    );
}

/// Print a would-change result (check mode)
pub fn would(resource: &str, detail: &str) {
    println!(
        "{}: [{}] => {}",
        "would".cyan(),
        resource.bright_white().bold(),
        detail
    );
}

/// Print a deleted result
pub fn deleted(resource: &str, detail: &str) {
    println!(
        "{}: [{}] => {}",
        "deleted".yellow(),
        resource.bright_white().bold(),
        detail
    );
}

/// Print a skipped result
pub fn skipped(resource: &str, detail: &str) {
    println!(
        "{}: [{}] => {}",
        "skipping".cyan(),
        resource.bright_white().bold(),
        detail
    );
}

/// Print a failed result
pub fn failed(resource: &str, msg: &str) {
    println!(
        "{}: [{}] => {}",
        "failed".red().bold(),
        resource.bright_white().bold(),
        msg
    );
}

/// Print the deployment recap
pub fn recap(created: u32, unchanged: u32, deleted: u32, skipped: u32, failed: u32) {
    println!(
        "\n{} {}",
        "DEPLOY RECAP".bright_white().bold(),
        "*".repeat(68).bright_black()
    );

    println!(
        "{}={:<4} {}={:<4} {}={:<4} {}={:<4} {}={:<4}",
        "created".yellow(),
        created,
        "ok".green(),
        unchanged,
        "deleted".yellow(),
        deleted,
        "skipped".cyan(),
        skipped,
        "failed".red(),
        failed,
    );
}
