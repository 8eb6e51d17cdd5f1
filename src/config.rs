use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::scan::{default_m2_repository, scan_source_jars};
use crate::source::ProjectClasspath;

/// Feature flag deciding whether hierarchy questions go through the engine.
pub const ENABLE_ENV: &str = "CLASS_HIERARCHY_ENGINE";

pub fn engine_enabled() -> bool {
    parse_enabled(env::var(ENABLE_ENV).ok().as_deref())
}

pub fn parse_enabled(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => !matches!(v.as_str(), "0" | "false" | "off" | "no"),
        None => true,
    }
}

pub fn resolve_m2_repo(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.m2.clone() {
        return Ok(p);
    }
    default_m2_repository()
}

pub fn resolve_classpath(cli: &Cli) -> Result<ProjectClasspath> {
    let mut roots = cli.sources.clone();

    if cli.m2_sources {
        let m2 = resolve_m2_repo(cli)?;
        let jars = scan_source_jars(&m2)
            .with_context(|| format!("Failed to scan Maven repository: {}", m2.display()))?;
        roots.extend(jars);
    }

    if roots.is_empty() {
        anyhow::bail!("No source roots given. Use --source <PATH> or --m2-sources");
    }

    Ok(ProjectClasspath::new(roots))
}
