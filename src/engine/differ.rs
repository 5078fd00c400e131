//! Plan display

use colored::Colorize;
use declarative::{DeletePolicy, Plan, ResourceAdapter, ServerCache};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

/// Print one kind's plan inside a box
///
/// With `verbose`, every update is followed by a line diff of the server
/// resource against the payload that would be sent.
pub fn display_plan(
    plan: &Plan,
    policy: &DeletePolicy,
    adapter: &dyn ResourceAdapter,
    cache: &ServerCache,
    verbose: bool,
) {
    let diff = &plan.diff;
    let deletions: Vec<_> = diff.deletions(policy).collect();
    let kept = diff.delete.len() - deletions.len();

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", title(plan.kind).bold());

    for d in &diff.create {
        println!("│   {} {:<40} {}", "+".green(), d.key().to_string(), "(create)".dimmed());
    }
    for update in &diff.update {
        let mode = if update.partial { "(partial update)" } else { "(full update)" };
        println!(
            "│   {} {:<40} {}",
            "~".yellow(),
            update.desired.key().to_string(),
            mode.dimmed()
        );
        if verbose {
            match adapter.build_payload(&update.desired, cache, Some(&update.server), update.partial) {
                Ok(payload) => print_json_diff(&update.server.raw, &payload),
                Err(e) => println!("│       {}", format!("payload unavailable: {e:#}").red()),
            }
        }
    }
    for server in &deletions {
        println!("│   {} {:<40} {}", "-".red(), server.key().to_string(), "(delete)".dimmed());
    }
    for rejected in &plan.rejected {
        println!("│   {} {:<40} {}", "✗".red(), rejected.key.to_string(), rejected.reason.red());
    }
    for warning in &plan.warnings {
        println!("│   {} {}", "⚠".yellow(), warning.yellow());
    }
    for tag in &plan.created_tags {
        println!("│   {} tag '{}'", "+".green(), tag.label);
    }

    if !diff.unchanged.is_empty() || kept > 0 {
        let mut notes = Vec::new();
        if !diff.unchanged.is_empty() {
            notes.push(format!("{} unchanged", diff.unchanged.len()));
        }
        if kept > 0 {
            notes.push(format!("{kept} unmanaged kept"));
        }
        println!("│   {}", notes.join(", ").dimmed());
    }

    if !diff.has_changes(policy) && plan.rejected.is_empty() {
        println!("│   {} No changes needed", "✓".green());
    }
    println!("└─────────────────────────────────────────────────────┘");
}

/// "download client" -> "Download clients"
fn title(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("{}{}s", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Changed lines of two pretty-printed JSON documents
pub fn json_diff_lines(old: &Value, new: &Value) -> Vec<(ChangeTag, String)> {
    let old = serde_json::to_string_pretty(old).unwrap_or_default();
    let new = serde_json::to_string_pretty(new).unwrap_or_default();
    let diff = TextDiff::from_lines(&old, &new);
    diff.iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.value().trim_end().to_string()))
        .collect()
}

fn print_json_diff(old: &Value, new: &Value) {
    for (tag, line) in json_diff_lines(old, new) {
        match tag {
            ChangeTag::Delete => println!("│       {}", format!("- {line}").red()),
            ChangeTag::Insert => println!("│       {}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
    }
}
