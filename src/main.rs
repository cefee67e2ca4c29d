use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use scene_lang::error::SceneError;
use scene_lang::options::ParserOptions;

#[derive(Parser)]
#[command(name = "scene", version)]
#[command(about = "Parse and evaluate scene description files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a scene file and report warnings
    Check {
        /// Input scene file
        file: PathBuf,

        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Evaluate a single expression
    Eval {
        /// Expression text, e.g. "1 + <1, 2, 3>"
        expression: String,

        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Parse a scene file and print its global symbols as JSON
    Dump {
        /// Input scene file
        file: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        opts: OptionArgs,
    },
}

#[derive(Args)]
struct OptionArgs {
    /// Parser options as JSON; the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Additional include search paths
    #[arg(long = "lib")]
    lib_dirs: Vec<PathBuf>,

    /// Value of `clock`; also sets `clock_on`
    #[arg(long)]
    clock: Option<f64>,

    /// Working gamma (assumed_gamma)
    #[arg(long)]
    gamma: Option<f64>,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

impl OptionArgs {
    fn load(&self) -> anyhow::Result<ParserOptions> {
        let mut options = match &self.config {
            Some(path) => ParserOptions::from_json_file(path)
                .with_context(|| format!("loading options from '{}'", path.display()))?,
            None => ParserOptions::default(),
        };
        options.lib_dirs.extend(self.lib_dirs.iter().cloned());
        if let Some(clock) = self.clock {
            options.clock = clock;
            options.clock_on = true;
        }
        if self.gamma.is_some() {
            options.assumed_gamma = self.gamma;
        }
        options.strict |= self.strict;
        Ok(options)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Check { file, opts } => {
            let options = opts.load()?;
            let scene = parse_or_exit(&file, &options)?;
            for w in &scene.warnings {
                eprintln!("warning: {w}");
            }
            eprintln!(
                "{}: ok ({} globals, {} warnings)",
                file.display(),
                scene.globals.as_object().map(|m| m.len()).unwrap_or(0),
                scene.warnings.len()
            );
        }

        Commands::Eval { expression, opts } => {
            let options = opts.load()?;
            match scene_lang::eval_expression(&expression, &options) {
                Ok(out) => {
                    for w in &out.warnings {
                        eprintln!("warning: {w}");
                    }
                    println!("{}", out.value);
                }
                Err(e) => {
                    print_error(&e, &expression);
                    process::exit(1);
                }
            }
        }

        Commands::Dump { file, pretty, opts } => {
            let options = opts.load()?;
            let scene = parse_or_exit(&file, &options)?;
            for w in &scene.warnings {
                eprintln!("warning: {w}");
            }
            let json = if pretty {
                serde_json::to_string_pretty(&scene)?
            } else {
                serde_json::to_string(&scene)?
            };
            println!("{json}");
        }
    }
    Ok(())
}

/// Parse `file`, printing a located diagnostic and exiting on a parse error.
fn parse_or_exit(file: &Path, options: &ParserOptions) -> anyhow::Result<scene_lang::parser::Scene> {
    let source = fs::read_to_string(file).with_context(|| format!("cannot read '{}'", file.display()))?;
    match scene_lang::parse_file(file, options) {
        Ok(scene) => Ok(scene),
        Err(e) => {
            // errors inside an include point into that file
            let text = match &e.file {
                Some(path) if path != file => fs::read_to_string(path).unwrap_or_default(),
                _ => source,
            };
            print_error(&e, &text);
            process::exit(1);
        }
    }
}

fn print_error(e: &SceneError, source: &str) {
    eprintln!("error: {e}");

    let Some(span) = &e.span else {
        return;
    };
    if span.start > source.len() || !source.is_char_boundary(span.start) {
        return;
    }
    let line_num = source[..span.start].chars().filter(|c| *c == '\n').count() + 1;
    let line_start = source[..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[span.start..]
        .find('\n')
        .map(|i| span.start + i)
        .unwrap_or(source.len());
    let line = &source[line_start..line_end];
    let col = span.start - line_start;
    let width = span.end.saturating_sub(span.start).clamp(1, line_end - span.start.min(line_end) + 1);

    eprintln!();
    eprintln!("  {line_num} | {line}");
    eprintln!(
        "  {} | {}{}",
        " ".repeat(line_num.to_string().len()),
        " ".repeat(col),
        "^".repeat(width)
    );
}
