//! codefmt CLI - rule-driven C# and Visual Basic formatter

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use codefmt::config::{CliOverrides, ColorMode, Config, OutputFormat};
use codefmt::engine::{host_failure, Engine, EngineError};
use codefmt::loader::{load_target, LoadedTarget};
use codefmt::output::{get_formatter, TargetReport};
use codefmt::plugins::analyzers::{builtin_analyzers, builtin_fixers};
use codefmt::plugins::rules::builtin_catalog;
use codefmt::plugins::text::TextProvider;
use codefmt::{AnalysisProvider, Language, Workspace};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "codefmt",
    version,
    about = "C# and Visual Basic code formatter",
    long_about = "Applies ordered, toggleable formatting rules to every document of a project or solution."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the documents of one or more targets
    Format(FormatArgs),
    /// List available rules and analyzers
    List {
        /// Show formatting rules
        #[arg(long)]
        rules: bool,

        /// Show analyzer diagnostics
        #[arg(long)]
        analyzers: bool,

        /// Configuration file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FormatArgs {
    /// Response file, solution manifest or directory to format
    #[arg(short, long = "target", required = true)]
    targets: Vec<PathBuf>,

    /// Only format files with these names (comma-separated)
    #[arg(long, value_delimiter = ',')]
    file_filter: Vec<String>,

    /// Language of response file targets
    #[arg(short, long, value_enum, default_value = "csharp")]
    lang: Lang,

    /// Preprocessor symbols to define while formatting (comma-separated)
    #[arg(short = 'c', long, value_delimiter = ',')]
    define_config: Vec<String>,

    /// File holding the copyright header
    #[arg(long)]
    copyright: Option<PathBuf>,

    /// Enable rules or diagnostics (comma-separated)
    #[arg(long, value_delimiter = ',')]
    enable: Vec<String>,

    /// Disable rules or diagnostics (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Log per-document timing and print rule timing statistics
    #[arg(short, long)]
    verbose: bool,

    /// Define CODE_FORMATTER while formatting
    #[arg(long)]
    define_formatter_symbol: bool,

    /// Run analyzers and apply their fixes instead of rules
    #[arg(long)]
    use_analyzers: bool,

    /// Settings file passed to analyzers
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Report changes without writing files
    #[arg(long)]
    dry_run: bool,

    /// Show a diff of every changed file
    #[arg(long)]
    diff: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Lang {
    Csharp,
    Vb,
}

impl From<Lang> for Language {
    fn from(lang: Lang) -> Self {
        match lang {
            Lang::Csharp => Language::CSharp,
            Lang::Vb => Language::VisualBasic,
        }
    }
}

/// Exit code after Ctrl-C, following the shell's 128 + SIGINT convention
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Commands::Format(args) if args.verbose);
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Format(args) => run_format(args),
        Commands::List {
            rules,
            analyzers,
            config,
        } => run_list(rules, analyzers, config.as_deref()),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Config::load_default().context("Failed to load config"),
    }
}

fn read_copyright(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read copyright file {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

fn build_engine(config: &Config) -> Result<Engine, EngineError> {
    let mut builder = Engine::builder(config.to_formatting_options())
        .catalog(builtin_catalog())
        .engine_config(config.engine.clone())
        .exclude(config.files.exclude.clone());
    for analyzer in builtin_analyzers() {
        builder = builder.analyzer(analyzer);
    }
    for fixer in builtin_fixers() {
        builder = builder.fixer(fixer);
    }
    let mut engine = builder.build()?;

    for name in &config.rules.enabled {
        engine.toggle_rule(name, true)?;
    }
    for name in &config.rules.disabled {
        engine.toggle_rule(name, false)?;
    }
    for id in &config.diagnostics.enabled {
        engine.toggle_diagnostic(id, true)?;
    }
    for id in &config.diagnostics.disabled {
        engine.toggle_diagnostic(id, false)?;
    }
    Ok(engine)
}

fn run_format(args: FormatArgs) -> Result<i32> {
    let mut config = load_config(args.config.as_deref())?;
    let copyright_header = args.copyright.as_deref().map(read_copyright).transpose()?;
    config.merge_cli(CliOverrides {
        format: args.format.map(|f| match f {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }),
        verbose: args.verbose,
        no_color: args.no_color,
        jobs: args.jobs,
        enable: args.enable,
        disable: args.disable,
        copyright_header,
        file_names: args.file_filter,
        preprocessor_symbols: args.define_config,
        allow_tables: args.define_formatter_symbol,
        use_analyzers: args.use_analyzers,
        settings: args.settings,
    });

    match config.output.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let engine = build_engine(&config)?;

    let provider: Arc<dyn AnalysisProvider> = Arc::new(TextProvider::new());
    let language = Language::from(args.lang);
    let mut targets: Vec<LoadedTarget> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    for path in &args.targets {
        match load_target(path, language, Arc::clone(&provider)) {
            Ok(target) => targets.push(target),
            Err(e) => failures.push(e.to_string()),
        }
    }
    if !failures.is_empty() {
        return Err(host_failure(failures).into());
    }

    let formatter = get_formatter(
        config.output.format,
        config.output.color != ColorMode::Never,
        args.diff,
    );
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Cancelling...");
        handler_token.cancel();
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }
    let mut exit_code = 0;

    for target in targets {
        let report = engine
            .format_solution(&target.solution, &cancel)
            .with_context(|| format!("Failed to format {}", target.path.display()))?;

        let documents = target.solution.document_count();
        let mut workspace = Workspace::new(target.solution).with_dry_run(args.dry_run);
        let applied = report
            .persist(&mut workspace)
            .with_context(|| format!("Failed to save changes for {}", target.path.display()))?;

        println!(
            "{}",
            formatter.format(&TargetReport {
                target: &target.path,
                documents,
                run: &report,
                applied: &applied,
            })
        );

        if config.output.verbose {
            eprintln!("{}", report.timings.format_timings());
        }
        if !report.is_success() {
            exit_code = 1;
        }
        if report.cancelled {
            exit_code = EXIT_INTERRUPTED;
            break;
        }
    }

    Ok(exit_code)
}

fn run_list(rules: bool, analyzers: bool, config: Option<&Path>) -> Result<i32> {
    let config = load_config(config)?;
    let engine = build_engine(&config)?;
    let (show_rules, show_analyzers) = if !rules && !analyzers {
        (true, true)
    } else {
        (rules, analyzers)
    };

    if show_rules {
        println!("{}", "Rules".bold());
        for rule in engine.rules() {
            let state = if engine.is_rule_enabled(&rule.name) {
                "enabled".green()
            } else {
                "disabled".red()
            };
            let languages: Vec<&str> = rule.languages.iter().map(|l| l.name()).collect();
            println!(
                "  {:<24} {:<16} {:>3}  {:<8}  {}",
                rule.name.cyan(),
                rule.class.to_string(),
                rule.order,
                state,
                languages.join(", ")
            );
            if !rule.description.is_empty() {
                println!("      {}", rule.description);
            }
        }
    }

    if show_analyzers {
        if show_rules {
            println!();
        }
        println!("{}", "Diagnostics".bold());
        for descriptor in engine.supported_diagnostics() {
            let state = if engine.is_diagnostic_enabled(&descriptor.id) {
                "enabled".green()
            } else {
                "disabled".red()
            };
            println!(
                "  {:<10} {:<8} {:<8}  {}",
                descriptor.id.cyan(),
                descriptor.default_severity.to_string(),
                state,
                descriptor.title
            );
        }
    }

    Ok(0)
}
