use anyhow::Result;
use arrclient::{Backend, Dialect};
use colored::Colorize;
use rayon::prelude::*;

use super::connect;
use crate::Context;
use crate::cli::CheckArgs;
use crate::config::{Config, InstanceConfig};
use crate::ui;

struct Issue {
    instance: String,
    summary: String,
    fix: Option<String>,
}

pub fn run(ctx: &Context, args: &CheckArgs) -> Result<()> {
    ui::header("Configuration Check");

    let config = Config::load(ctx.config.as_deref())?;
    ui::kv("config", &config.source.display().to_string());
    if config.instances.is_empty() {
        anyhow::bail!("No instances configured");
    }
    let instances = config.select(args.instance.as_deref())?;

    let mut issues = Vec::new();
    let mut valid = Vec::new();
    for &(name, instance) in &instances {
        match instance.validate() {
            Ok(()) => {
                let kinds: Vec<&str> = instance.sections().map(|(k, _)| k.label()).collect();
                let managed = if kinds.is_empty() {
                    "nothing managed".to_string()
                } else {
                    kinds.join(", ")
                };
                println!("  {} {name} - {}", "✓".green(), managed.dimmed());
                valid.push((name, instance));
            }
            Err(e) => {
                println!("  {} {name} - {}", "✗".red(), format!("{e:#}").red());
                issues.push(Issue {
                    instance: name.to_string(),
                    summary: format!("{e:#}"),
                    fix: Some(format!("Edit {}", config.source.display())),
                });
            }
        }
    }

    if args.offline {
        ui::dim("Skipping connectivity checks (--offline)");
    } else if !valid.is_empty() {
        issues.extend(check_connectivity(&valid));
    }

    println!();
    if issues.is_empty() {
        ui::success("All instances healthy!");
        return Ok(());
    }

    let label = if issues.len() == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{} {label} Found", issues.len()));
    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.instance).dimmed()
        );
        if let Some(fix) = &issue.fix {
            println!("      {} {fix}", "Fix:".cyan());
        }
    }
    anyhow::bail!("Check failed")
}

/// Probe every instance concurrently, report in config order
fn check_connectivity(instances: &[(&str, &InstanceConfig)]) -> Vec<Issue> {
    ui::header("Connectivity");

    let results: Vec<_> = instances
        .par_iter()
        .map(|&(name, instance)| {
            let result = instance.dialect().and_then(|dialect| {
                let backend = connect(instance)?;
                Ok(probe(name, dialect, backend.as_ref()))
            });
            (name, result)
        })
        .collect();

    let mut issues = Vec::new();
    for (name, result) in results {
        match result {
            Ok(Ok(version)) => println!("  {} {name} - {}", "✓".green(), version.dimmed()),
            Ok(Err(issue)) => {
                println!("  {} {name} - {}", "✗".red(), issue.summary.red());
                issues.push(issue);
            }
            Err(e) => {
                println!("  {} {name} - {}", "✗".red(), format!("{e:#}").red());
                issues.push(Issue {
                    instance: name.to_string(),
                    summary: format!("{e:#}"),
                    fix: None,
                });
            }
        }
    }
    issues
}

/// Ask the server who it is; a reply from another application is an issue
fn probe(name: &str, dialect: Dialect, backend: &dyn Backend) -> std::result::Result<String, Issue> {
    match backend.system_status() {
        Ok(status) => {
            if !status.app_name.is_empty() && !status.app_name.eq_ignore_ascii_case(dialect.name()) {
                return Err(Issue {
                    instance: name.to_string(),
                    summary: format!("configured as {dialect} but the server is {}", status.app_name),
                    fix: Some(format!("Set dialect = \"{}\"", status.app_name.to_lowercase())),
                });
            }
            log::debug!("{name}: {} {}", status.app_name, status.version);
            Ok(format!("{dialect} {}", status.version).trim_end().to_string())
        }
        Err(e) => {
            let category = e.category();
            Err(Issue {
                instance: name.to_string(),
                summary: format!("{}: {e}", category.description()),
                fix: Some(category.advice().to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrclient::MockBackend;
    use serde_json::json;

    #[test]
    fn test_probe_reports_version() {
        let backend = MockBackend::new(Dialect::Sonarr);
        let version = probe("tv", Dialect::Sonarr, &backend).unwrap_or_else(|i| panic!("{}", i.summary));
        assert_eq!(version, "sonarr 0.0.0");
    }

    #[test]
    fn test_probe_dialect_mismatch() {
        let backend = MockBackend::new(Dialect::Radarr);
        let issue = probe("tv", Dialect::Sonarr, &backend).unwrap_err();
        assert!(issue.summary.contains("configured as"));
        assert!(issue.fix.unwrap().contains("radarr"));
    }

    #[test]
    fn test_probe_auth_failure_has_advice() {
        let backend = MockBackend::new(Dialect::Lidarr);
        backend.fail("GET system/status", 401, json!({"message": "Unauthorized"}));
        let issue = probe("music", Dialect::Lidarr, &backend).unwrap_err();
        assert!(issue.summary.starts_with("Authentication failed"));
        assert!(issue.fix.unwrap().contains("api_key"));
    }
}
