mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cel_ast::adorned::adorned;
use cel_parser::{ParserOptions, UnparserOptions};
use cel_typeck::{CheckerOptions, Container, Env, MessageRegistry};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::{ConfigError, EnvConfig};

#[derive(Parser)]
#[command(name = "cel", about = "Parse and type-check CEL expressions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an expression and print its tree with node ids
    Parse {
        expr: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Type-check an expression and print the type of every node
    Check {
        expr: String,
        /// JSON file with extra declarations
        #[arg(long, value_name = "FILE")]
        env: Option<PathBuf>,
        /// Container (namespace) used to resolve names
        #[arg(long, value_name = "NAME")]
        container: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Parse an expression and print it back in canonical form
    Format {
        expr: String,
        /// Break lines once they reach this many characters
        #[arg(long, value_name = "N", default_value_t = 80)]
        wrap_column: usize,
        /// Put the operator at the start of the next line when wrapping
        #[arg(long)]
        wrap_before: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Accept `?.`, `[?` and `?field:` syntax
    #[arg(long)]
    enable_optional_syntax: bool,
    /// Maximum nesting depth before giving up
    #[arg(long, value_name = "N", default_value_t = 100)]
    max_recursion_depth: usize,
    /// Keep repeated `!` and `-` operators instead of folding them
    #[arg(long)]
    retain_unary: bool,
    /// Report mixed list and map literals instead of typing them as dyn
    #[arg(long)]
    homogeneous_literals: bool,
    /// Log debug events to stderr
    #[arg(long, short)]
    verbose: bool,
}

impl CommonArgs {
    fn parser_options(&self) -> ParserOptions {
        ParserOptions::new(self.max_recursion_depth)
            .enable_optional_syntax(self.enable_optional_syntax)
            .retain_repeated_unary_operators(self.retain_unary)
    }

    fn checker_options(&self) -> CheckerOptions {
        CheckerOptions::new(self.max_recursion_depth)
            .heterogeneous_aggregate_literals(!self.homogeneous_literals)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse { expr, common } => {
            init_tracing(common.verbose);
            cmd_parse(&expr, &common)
        }
        Command::Check {
            expr,
            env,
            container,
            common,
        } => {
            init_tracing(common.verbose);
            cmd_check(&expr, env, container.as_deref(), &common)
        }
        Command::Format {
            expr,
            wrap_column,
            wrap_before,
            common,
        } => {
            init_tracing(common.verbose);
            let options = UnparserOptions::default()
                .wrap_on_column(wrap_column)
                .wrap_after_column_limit(!wrap_before);
            cmd_format(&expr, &options, &common)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cmd_parse(expr: &str, common: &CommonArgs) -> ExitCode {
    let (parsed, errors) = cel_parser::parse(expr, &common.parser_options());
    println!("{}", adorned(&parsed.expr));
    if !errors.is_empty() {
        eprintln!("{errors}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn cmd_format(expr: &str, options: &UnparserOptions, common: &CommonArgs) -> ExitCode {
    let parser_options = common.parser_options().populate_macro_calls(true);
    let (parsed, errors) = cel_parser::parse(expr, &parser_options);
    if !errors.is_empty() {
        eprintln!("{errors}");
        return ExitCode::FAILURE;
    }
    match cel_parser::unparse(&parsed, options) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(
    expr: &str,
    env_file: Option<PathBuf>,
    container: Option<&str>,
    common: &CommonArgs,
) -> ExitCode {
    let mut env = match load_env(env_file, container) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (parsed, errors) = cel_parser::parse(expr, &common.parser_options());
    if !errors.is_empty() {
        eprintln!("{errors}");
        return ExitCode::FAILURE;
    }

    let (checked, errors) = match cel_typeck::check(&parsed, &mut env, &common.checker_options()) {
        Ok(result) => result,
        Err(violation) => {
            eprintln!("internal error: {violation}");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", checked.root_type());
    let mut ids: Vec<_> = checked.type_map.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        if let Some(ty) = checked.type_of(id) {
            println!("{id}: {ty}");
        }
    }

    if !errors.is_empty() {
        eprintln!("{errors}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_env(path: Option<PathBuf>, container: Option<&str>) -> Result<Env, ConfigError> {
    match path {
        Some(path) => EnvConfig::load(&path)?.build(container),
        None => {
            let container = Container::new(container.unwrap_or_default());
            Ok(Env::standard(container, Arc::new(MessageRegistry::new()))?)
        }
    }
}
