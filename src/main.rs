use anyhow::{Context, Result};
use clap::Parser;
use class_hierarchy::cli::{Cli, Commands, LogLevel, OutputFormat};
use class_hierarchy::config::{ENABLE_ENV, engine_enabled, resolve_classpath};
use class_hierarchy::element::TypeName;
use class_hierarchy::engine::{ProjectStats, TypeHierarchyEngine};
use class_hierarchy::source::{ProjectClasspath, SourceClassReaderFactory};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    if !engine_enabled() {
        anyhow::bail!("Type hierarchy engine is disabled by {ENABLE_ENV}");
    }

    let classpath = resolve_classpath(&cli)?;
    let queries = match cli.command.clone() {
        Commands::Supertype { type_name } => vec![Query::Supertype {
            type_name,
            cleanup: false,
        }],
        Commands::Interfaces { type_name } => vec![Query::Interfaces {
            type_name,
            cleanup: false,
        }],
        Commands::Extends {
            type_name,
            super_name,
        } => vec![Query::Extends {
            type_name,
            super_name,
            cleanup: false,
        }],
        Commands::Implements {
            type_name,
            interface_name,
        } => vec![Query::Implements {
            type_name,
            interface_name,
            cleanup: false,
        }],
        Commands::Batch { input } => parse_queries(&read_input(&input)?)?,
    };

    let engine = TypeHierarchyEngine::new(SourceClassReaderFactory);
    let report = run_queries(&engine, &classpath, &queries);
    engine.cleanup_all();

    write_report(&report, cli.format)
}

fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Query {
    Supertype {
        type_name: String,
        #[serde(default)]
        cleanup: bool,
    },
    Interfaces {
        type_name: String,
        #[serde(default)]
        cleanup: bool,
    },
    Extends {
        type_name: String,
        super_name: String,
        #[serde(default)]
        cleanup: bool,
    },
    Implements {
        type_name: String,
        interface_name: String,
        #[serde(default)]
        cleanup: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Answer {
    Name(Option<TypeName>),
    Names(Option<Vec<TypeName>>),
    Flag(bool),
}

#[derive(Debug, Serialize)]
struct QueryResult {
    op: &'static str,
    type_name: String,
    target: Option<String>,
    answer: Answer,
}

#[derive(Debug, Serialize)]
struct Report {
    project: String,
    roots: Vec<String>,
    duration_ms: u64,
    results: Vec<QueryResult>,
    stats: Option<ProjectStats>,
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read queries from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read queries: {}", input.display()))
}

fn parse_queries(content: &str) -> Result<Vec<Query>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid query on line {}: {line}", idx + 1))
        })
        .collect()
}

fn run_queries(
    engine: &TypeHierarchyEngine<ProjectClasspath>,
    classpath: &ProjectClasspath,
    queries: &[Query],
) -> Report {
    let start = Instant::now();
    let results = queries
        .iter()
        .map(|query| answer_query(engine, classpath, query))
        .collect();

    Report {
        project: classpath.fingerprint(),
        roots: classpath
            .roots()
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        duration_ms: start.elapsed().as_millis() as u64,
        results,
        stats: engine.stats(classpath),
    }
}

fn answer_query(
    engine: &TypeHierarchyEngine<ProjectClasspath>,
    classpath: &ProjectClasspath,
    query: &Query,
) -> QueryResult {
    match query {
        Query::Supertype { type_name, cleanup } => QueryResult {
            op: "supertype",
            type_name: type_name.clone(),
            target: None,
            answer: Answer::Name(engine.get_supertype(classpath, type_name, *cleanup)),
        },
        Query::Interfaces { type_name, cleanup } => QueryResult {
            op: "interfaces",
            type_name: type_name.clone(),
            target: None,
            answer: Answer::Names(engine.get_interfaces(classpath, type_name, *cleanup)),
        },
        Query::Extends {
            type_name,
            super_name,
            cleanup,
        } => QueryResult {
            op: "extends",
            type_name: type_name.clone(),
            target: Some(super_name.clone()),
            answer: Answer::Flag(engine.does_extend(classpath, type_name, super_name, *cleanup)),
        },
        Query::Implements {
            type_name,
            interface_name,
            cleanup,
        } => QueryResult {
            op: "implements",
            type_name: type_name.clone(),
            target: Some(interface_name.clone()),
            answer: Answer::Flag(engine.does_implement(
                classpath,
                type_name,
                interface_name,
                *cleanup,
            )),
        },
    }
}

fn write_report(report: &Report, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => render_text(report),
    };

    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for result in &report.results {
        let answer = match &result.answer {
            Answer::Name(Some(name)) => name.to_string(),
            Answer::Names(Some(names)) => names
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Answer::Name(None) | Answer::Names(None) => "<unresolved>".to_string(),
            Answer::Flag(flag) => flag.to_string(),
        };
        match &result.target {
            Some(target) => out.push_str(&format!(
                "{} {} {}: {answer}\n",
                result.op, result.type_name, target
            )),
            None => out.push_str(&format!("{} {}: {answer}\n", result.op, result.type_name)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_queries_reads_json_lines() {
        let input = r#"
{"op": "supertype", "type_name": "a.B"}

{"op": "implements", "type_name": "a.B", "interface_name": "a.I", "cleanup": true}
"#;
        let queries = parse_queries(input).unwrap();
        assert_eq!(queries.len(), 2);
        assert!(matches!(
            &queries[1],
            Query::Implements { cleanup: true, interface_name, .. } if interface_name == "a.I"
        ));
    }

    #[test]
    fn parse_queries_reports_line_numbers() {
        let err = parse_queries("{\"op\": \"supertype\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn render_text_marks_unresolved_answers() {
        let report = Report {
            project: String::new(),
            roots: Vec::new(),
            duration_ms: 0,
            results: vec![
                QueryResult {
                    op: "supertype",
                    type_name: "a.B".to_string(),
                    target: None,
                    answer: Answer::Name(None),
                },
                QueryResult {
                    op: "extends",
                    type_name: "a.B".to_string(),
                    target: Some("a.A".to_string()),
                    answer: Answer::Flag(true),
                },
            ],
            stats: None,
        };

        assert_eq!(
            render_text(&report),
            "supertype a.B: <unresolved>\nextends a.B a.A: true\n"
        );
    }
}
