//! Minimal CLI: schema file → (constraints | parse payloads)
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indexmap::IndexMap;
use rayon::prelude::*;

use form_schema::form::{FormData, ReplyOptions, SubmissionReply};
use form_schema::lower::{load_schema_file, lower_schema_file};
use form_schema::parse::{parse_with_schema, ParseOptions, SchemaSource};
use form_schema::path_de::from_str_with_path;
use form_schema::resolution::Resolution;
use form_schema::{get_constraint, Config};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive HTML constraints from a form schema, or validate submitted payloads against it
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the constraint map (field path → HTML validation attributes)
    Constraints(ConstraintsOut),
    /// validate payload files and print one submission reply per file
    Parse(ParseOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema definition (.json): one schema, or `{"intents": {..}, "default": ..}`
    #[arg(long, short)]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct EngineSettings {
    /// engine options as JSON (`abortEarly`, `abortPipeEarly`, `lang`); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// stop at the first issue anywhere
    #[arg(long, default_value_t = false)]
    abort_early: bool,

    /// stop each pipeline at its first issue
    #[arg(long, default_value_t = false)]
    abort_pipe_early: bool,

    /// language tag attached to issues
    #[arg(long)]
    lang: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadFormat {
    /// a JSON object of field names
    Json,
    /// `application/x-www-form-urlencoded` text
    Urlencoded,
}

#[derive(clap::Parser, Debug)]
struct ConstraintsOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// pick the schema registered for this intent
    #[arg(long)]
    intent: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ParseOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    engine_settings: EngineSettings,

    /// One or more payload files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[arg(long, value_enum, default_value_t = PayloadFormat::Json)]
    format: PayloadFormat,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<SchemaSource> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema file {}", self.schema.display()))?;
        let file = load_schema_file(&source)
            .with_context(|| format!("invalid schema file {}", self.schema.display()))?;
        let source = lower_schema_file(&file)
            .with_context(|| format!("invalid schema file {}", self.schema.display()))?;
        Ok(source)
    }
}

impl EngineSettings {
    fn config(&self) -> Result<Config> {
        let mut config = match self.config.as_ref() {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                from_str_with_path::<Config>(&source)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Config::default(),
        };
        config.abort_early |= self.abort_early;
        config.abort_pipe_early |= self.abort_pipe_early;
        if let Some(lang) = self.lang.as_ref() {
            config.lang = Some(lang.clone());
        }
        Ok(config)
    }
}

impl PayloadFormat {
    fn read(self, path: &Path) -> Result<FormData> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {}", path.display()))?;
        match self {
            PayloadFormat::Urlencoded => Ok(FormData::from_urlencoded(&source)),
            PayloadFormat::Json => {
                let json = serde_json::from_str::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON payload {}", path.display()))?;
                Ok(FormData::from_json(&json)?)
            }
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Constraints(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let source = target.schema_settings.load()?;
                let schema = source.resolve(target.intent.as_deref())?;
                let constraints = get_constraint(&schema)?;
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&constraints)?)
            }
            Command::Parse(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                // 1) shared, immutable inputs
                let source = target.schema_settings.load()?;
                let config = target.engine_settings.config()?;
                let paths = resolve_file_path_patterns(&target.input)?;

                // 2) one submission per payload file
                let results: Vec<(PathBuf, Result<SubmissionReply>)> = paths
                    .into_par_iter()
                    .map(|path| {
                        let reply = submit(&path, target.format, &source, &config);
                        (path, reply)
                    })
                    .collect();

                // 3) report
                let mut replies = IndexMap::new();
                let mut failed = 0usize;
                for (path, reply) in results {
                    let name = path.to_string_lossy().to_string();
                    match reply {
                        Ok(reply) => {
                            if reply.error.is_empty() {
                                eprintln!("{} {name}", "valid".green().bold());
                            } else {
                                eprintln!(
                                    "{} {name} ({} field(s) with errors)",
                                    "invalid".yellow().bold(),
                                    reply.error.len()
                                );
                            }
                            replies.insert(name, reply);
                        }
                        Err(error) => {
                            failed += 1;
                            eprintln!("{} {name}: {error:#}", "failed".red().bold());
                        }
                    }
                }
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&replies)?)?;
                if failed > 0 {
                    bail!("{failed} payload file(s) could not be processed");
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn submit(
    path: &Path,
    format: PayloadFormat,
    source: &SchemaSource,
    config: &Config,
) -> Result<SubmissionReply> {
    let form = format.read(path)?;
    let options = ParseOptions::new(source.clone()).with_info(config.clone());
    let submission = match parse_with_schema(&form, options)? {
        Resolution::Ready(submission) => submission,
        Resolution::Pending(pending) => tokio::runtime::Builder::new_current_thread()
            .build()
            .context("failed to start async runtime")?
            .block_on(pending),
    };
    Ok(submission.reply(ReplyOptions::default()))
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents)
                .with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
