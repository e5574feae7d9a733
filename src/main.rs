use clap::{Args, Parser as ClapParser, Subcommand};
use std::{
    io::{self, Read},
    path::PathBuf,
    time::Duration,
};
use streamy::{
    SandboxConfig,
    cli::{self, CheckOptions, CheckResult, CliError, JudgeOptions},
};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "streamy")]
#[command(about = "Streamy - A sandboxed collection-pipeline language for stream riddles")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    limits: Limits,

    /// Log filter, e.g. "debug" or "streamy=trace"
    #[arg(long, global = true, env = "STREAMY_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Limits {
    /// Wall-clock budget per run, in milliseconds
    #[arg(long, global = true, env = "STREAMY_DEADLINE_MS", default_value_t = 2000)]
    deadline_ms: u64,

    /// Maximum number of elements a stage may materialize
    #[arg(long, global = true, env = "STREAMY_MAX_ELEMENTS", default_value_t = 1_000_000)]
    max_elements: usize,
}

impl Limits {
    fn config(&self) -> SandboxConfig {
        SandboxConfig {
            deadline: Duration::from_millis(self.deadline_ms),
            max_elements: self.max_elements,
            ..SandboxConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and run a script against a JSON array
    Check {
        /// The streamy script to run
        script: String,

        /// JSON array input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Record type name for object elements
        #[arg(long)]
        record_name: Option<String>,

        /// Field that orders records naturally
        #[arg(long)]
        natural_key: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// List the available riddles
    Riddles {
        /// JSON catalogue to use instead of the built-in riddles
        #[arg(long)]
        catalogue: Option<PathBuf>,
    },

    /// Judge a script against a riddle
    Judge {
        /// Riddle id (see 'streamy riddles')
        riddle: String,

        /// The streamy script to judge
        script: String,

        /// JSON catalogue to use instead of the built-in riddles
        #[arg(long)]
        catalogue: Option<PathBuf>,
    },

    /// Show the language reference
    Docs {
        /// Topic name (omit to list topics)
        topic: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = cli.limits.config();
    let result = match cli.command {
        Commands::Check {
            script,
            input,
            record_name,
            natural_key,
            pretty,
            syntax_only,
        } => run_check(
            CheckOptions {
                script,
                input: None,
                record_name,
                natural_key,
                syntax_only,
                config,
            },
            input,
            pretty,
        ),
        Commands::Riddles { catalogue } => run_riddles(catalogue),
        Commands::Judge {
            riddle,
            script,
            catalogue,
        } => run_judge(JudgeOptions {
            riddle_id: riddle,
            script,
            catalogue,
            config,
        }),
        Commands::Docs { topic } => match topic {
            None => {
                print!("{}", cli::docs_overview());
                Ok(())
            }
            Some(topic) => cli::doc_topic(&topic).map(|content| print!("{}", content)),
        },
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(mut options: CheckOptions, input: Option<String>, pretty: bool) -> Result<(), CliError> {
    options.input = match input {
        Some(s) => Some(s),
        None if !options.syntax_only && !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success(output) => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            }?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn run_riddles(catalogue: Option<PathBuf>) -> Result<(), CliError> {
    let catalogue = cli::load_catalogue(catalogue.as_ref())?;
    for riddle in cli::list_riddles(&catalogue) {
        println!(
            "{:>4}  {:<48} {} x{}",
            riddle.id, riddle.description, riddle.element_type, riddle.input_len
        );
    }
    Ok(())
}

fn run_judge(options: JudgeOptions) -> Result<(), CliError> {
    let verdict = cli::execute_judge(&options)?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    if !verdict.success {
        std::process::exit(2);
    }
    Ok(())
}
