use clap::{Parser as ClapParser, Subcommand};
use dynlinq::cli::{self, CliError, CommandOptions};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "dynlinq")]
#[command(about = "dynlinq - compile textual expressions into typed expression trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// The expression to compile
    expression: String,

    /// JSON file describing the object model
    #[arg(short, long)]
    schema: PathBuf,

    /// Element type, overriding the schema's "it"
    #[arg(long)]
    it: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and print its typed tree
    Check {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Compile an expression and evaluate it against JSON input
    Eval {
        #[command(flatten)]
        model: ModelArgs,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile an ordering list such as "Name, Age desc"
    Order {
        #[command(flatten)]
        model: ModelArgs,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { model } => options(model, None).and_then(|o| {
            println!("{}", cli::execute_check(&o)?);
            Ok(())
        }),
        Commands::Eval {
            model,
            input,
            pretty,
        } => run_eval(model, input, pretty),
        Commands::Order { model } => options(model, None).and_then(|o| {
            print!("{}", cli::execute_order(&o)?);
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr, and only when `RUST_LOG` asks for them.
fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

fn options(model: ModelArgs, input: Option<String>) -> Result<CommandOptions, CliError> {
    let schema = std::fs::read_to_string(&model.schema)?;
    Ok(CommandOptions {
        expression: model.expression,
        schema,
        it: model.it,
        input,
    })
}

fn run_eval(model: ModelArgs, input: Option<String>, pretty: bool) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    let output = cli::execute_eval(&options(model, input)?)?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }?;
    println!("{}", json);
    Ok(())
}
