//! Roster Assistant CLI.
//!
//! Steer the roster solver with natural-language instructions.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roster_assistant::report::format_duration;
use roster_assistant::{connect, starting_session, AssistantConfig, TurnReport};
use roster_kernel::{
    DayGenerator, Orchestrator, Resource, Session, ToolRegistry, ToolsetConfig, TurnOutcome,
    WeightEncoding,
};

#[derive(Parser)]
#[command(name = "roster-assistant")]
#[command(about = "Natural-language control of a constraint-based roster solver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Ollama/vLLM host URL
    #[arg(long, env = "OLLAMA_HOST")]
    host: Option<String>,

    /// Solver service URL
    #[arg(long, env = "SOLVER_URL")]
    solver_url: Option<String>,

    /// Personnel service URL
    #[arg(long, env = "PERSONNEL_URL")]
    personnel_url: Option<String>,

    /// Read personnel from a JSON file instead of the personnel service
    #[arg(long)]
    personnel_file: Option<PathBuf>,

    /// Chat model name
    #[arg(long, short)]
    model: Option<String>,

    /// Seed for the generated starting schedule
    #[arg(long)]
    seed: Option<u64>,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and display a day schedule.
    Generate,

    /// Print the default constraint weights.
    Weights {
        /// Print the structured {hard, soft} form instead of text
        #[arg(long)]
        structured: bool,
    },

    /// Print the tool schema sent to the model.
    Tools {
        /// Include setRoleMatchHardWeight
        #[arg(long)]
        role_match: bool,
        /// Include the string-valued set<Name>Weight tools
        #[arg(long)]
        legacy: bool,
    },

    /// Run a single turn.
    Chat {
        /// Instruction for the assistant
        instruction: String,
        /// Output file for the turn report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Solve the generated schedule with default weights, without the chat model.
    Solve,

    /// Interactive multi-turn session.
    Repl,
}

impl Cli {
    /// Config file values, overridden by flags and environment.
    fn resolve_config(&self) -> Result<AssistantConfig> {
        let mut config = AssistantConfig::load_or_default(self.config.as_deref())?;
        if let Some(host) = &self.host {
            config.chat_host = host.clone();
        }
        if let Some(url) = &self.solver_url {
            config.solver_url = url.clone();
        }
        if let Some(url) = &self.personnel_url {
            config.personnel_url = url.clone();
        }
        if let Some(path) = &self.personnel_file {
            config.personnel_file = Some(path.clone());
        }
        if let Some(model) = &self.model {
            config.orchestrator.model = model.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Generate => {
            let mut generator = DayGenerator::new(config.day.clone(), config.seed);
            let schedule = generator.generate_catalogue(Resource::default_catalogue());
            println!("{}", schedule);
        }

        Commands::Weights { structured } => {
            let encoding = if structured {
                WeightEncoding::Structured
            } else {
                WeightEncoding::Text
            };
            let weights = config.orchestrator.weights.model();
            println!("{}", serde_json::to_string_pretty(&weights.encode(encoding))?);
        }

        Commands::Tools { role_match, legacy } => {
            let registry = ToolRegistry::from_config(&ToolsetConfig {
                expose_role_match: role_match || config.orchestrator.toolset.expose_role_match,
                legacy_weight_tools: legacy || config.orchestrator.toolset.legacy_weight_tools,
            });
            println!("{}", serde_json::to_string_pretty(&registry.schema())?);
        }

        Commands::Chat {
            instruction,
            output,
        } => {
            let orchestrator = connect(&config)?;
            let mut session = starting_session(&orchestrator, &config);

            let started_at = Utc::now();
            let outcome = orchestrator.run_turn(&mut session, &instruction).await?;
            print_outcome(&outcome, &session);

            let report = TurnReport::new(
                &config.orchestrator.model,
                &instruction,
                started_at,
                &outcome,
                &session,
            );
            println!("Duration: {}", format_duration(report.duration_ms()));

            if let Some(output) = output {
                write_report(&report, &output)?;
                println!("\nReport written to: {}", output.display());
            }
        }

        Commands::Solve => {
            let orchestrator = connect(&config)?;
            let mut session = starting_session(&orchestrator, &config);
            let summary = orchestrator.solve_now(&mut session).await?;
            println!(
                "Solve: {} assignments, {} applied, {} skipped, {} conflicts, score {}",
                summary.assignments,
                summary.applied,
                summary.skipped,
                summary.conflicts,
                summary.score.as_deref().unwrap_or("n/a")
            );
            println!("\n{}", session.schedule);
        }

        Commands::Repl => {
            let orchestrator = connect(&config)?;
            let mut session = starting_session(&orchestrator, &config);
            repl(&orchestrator, &mut session).await?;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome, session: &Session) {
    println!("\n=== Turn {} ===", outcome.turn_id);
    for call in &outcome.calls {
        println!(
            "  {:?} {}({}){}",
            call.status,
            call.name,
            serde_json::Value::Object(call.arguments.clone()),
            if call.synthetic { " [appended]" } else { "" }
        );
    }
    if let Some(solve) = &outcome.solve {
        println!(
            "Solve: {} assignments, {} applied, {} skipped, {} conflicts, score {}",
            solve.assignments,
            solve.applied,
            solve.skipped,
            solve.conflicts,
            solve.score.as_deref().unwrap_or("n/a")
        );
        println!("\n{}", session.schedule);
    }
    println!("\nAssistant: {}", outcome.reply);
}

fn write_report(report: &TurnReport, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    report.save(output)
}

async fn repl(orchestrator: &Orchestrator, session: &mut Session) -> Result<()> {
    println!("Commands: :solve, :schedule, :weights, :reset, :quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":schedule" => println!("{}", session.schedule),
            ":solve" => match orchestrator.solve_now(session).await {
                Ok(summary) => {
                    println!("Applied {} assignments.", summary.applied);
                    println!("{}", session.schedule);
                }
                Err(failure) => println!("Error: {}", failure.error),
            },
            ":weights" => {
                for (name, weight) in session.weights.serialize() {
                    println!("  {name}: {weight}");
                }
            }
            ":reset" => {
                session.weights.reset_all();
                session.clear_history();
                println!("Weights and history reset.");
            }
            instruction => match orchestrator.run_turn(session, instruction).await {
                Ok(outcome) => print_outcome(&outcome, session),
                Err(failure) => {
                    warn!(turn_id = %failure.turn_id, error = %failure.error, "Turn failed");
                    println!("Error: {}", failure.error);
                }
            },
        }
    }

    info!(turns = session.history().len() / 2, "Session ended");
    Ok(())
}
