use clap::{Args, Parser, Subcommand};
use harness::config::{Domain, EvalConfig, EvalRequest};
use harness::mock;
use harness::report::EvaluationReport;
use harness::runner::{EvalRunner, TASK_SPLIT};
use protocol::a2a::A2AClient;
use protocol::config::A2AConfig;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Evaluate a remote conversational agent against a task benchmark")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evaluation request (participants + config) read from JSON
    Run {
        /// Request file, or `-` for stdin
        #[arg(short, long)]
        request: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Evaluate one agent URL with config from flags and/or a TOML file
    Eval {
        /// Base URL of the agent under test
        #[arg(long)]
        agent_url: String,
        /// TOML config file; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        domain: Option<Domain>,
        #[arg(long)]
        num_tasks: Option<u32>,
        #[arg(long)]
        seed: Option<i64>,
        #[arg(long)]
        timeout_seconds: Option<u64>,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long)]
        retries: Option<u32>,
        /// Explicit task ids, comma separated
        #[arg(long, value_delimiter = ',')]
        task_ids: Option<Vec<String>>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the tasks of a domain
    Tasks {
        #[arg(long, default_value = "mock")]
        domain: Domain,
    },
    /// List the tools of a domain
    Tools {
        #[arg(long, default_value = "mock")]
        domain: Domain,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { request, output } => {
            let text = read_request(&request)?;
            let request = match EvalRequest::parse_json(&text) {
                Ok(request) => request,
                Err(e) => reject(e),
            };
            let runner = runner()?;
            match runner.run_request(&request).await {
                Ok(report) => write_report(&report, &output)?,
                Err(e) => reject(e),
            }
        }
        Commands::Eval {
            agent_url,
            config,
            domain,
            num_tasks,
            seed,
            timeout_seconds,
            max_steps,
            retries,
            task_ids,
            output,
        } => {
            let mut eval_config = match config {
                Some(path) => EvalConfig::from_toml_file(&path).unwrap_or_else(|e| reject(e)),
                None => EvalConfig::default(),
            };
            if let Some(domain) = domain {
                eval_config.domain = domain;
            }
            if let Some(num_tasks) = num_tasks {
                eval_config.num_tasks = num_tasks;
            }
            if let Some(seed) = seed {
                eval_config.seed = seed;
            }
            if let Some(timeout_seconds) = timeout_seconds {
                eval_config.timeout_seconds = timeout_seconds;
            }
            if let Some(max_steps) = max_steps {
                eval_config.max_steps = max_steps;
            }
            if let Some(retries) = retries {
                eval_config.retries = retries;
            }
            if task_ids.is_some() {
                eval_config.task_ids = task_ids;
            }

            let mut participants = std::collections::HashMap::new();
            participants.insert("agent".to_string(), agent_url.clone());
            let request = EvalRequest {
                participants,
                config: Default::default(),
            };
            if let Err(e) = request.validate() {
                reject(e);
            }

            let runner = runner()?;
            match runner.run(&agent_url, &eval_config).await {
                Ok(report) => write_report(&report, &output)?,
                Err(e) => reject(e),
            }
        }
        Commands::Tasks { domain } => {
            list_tasks(domain);
        }
        Commands::Tools { domain } => {
            list_tools(domain);
        }
    }

    Ok(())
}

fn runner() -> Result<EvalRunner, Box<dyn std::error::Error>> {
    let transport = A2AClient::new(A2AConfig::default())?;
    Ok(EvalRunner::new(mock::benchmark(), Arc::new(transport)))
}

fn read_request(source: &str) -> io::Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(source)
    }
}

fn reject(reason: impl std::fmt::Display) -> ! {
    error!("Evaluation rejected: {}", reason);
    eprintln!("✗ Rejected: {}", reason);
    std::process::exit(2);
}

fn write_report(
    report: &EvaluationReport,
    output: &OutputArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("{}", report.summary_text());

    let json = serde_json::to_string_pretty(report)?;
    match &output.output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn list_tasks(domain: Domain) {
    let benchmark = mock::benchmark();
    match benchmark.tasks.tasks(domain.as_str(), TASK_SPLIT, None) {
        Ok(tasks) => {
            println!("Tasks in {}:", domain);
            for task in tasks {
                println!("  - {}: {}", task.id, task.user_scenario.replace('\n', " / "));
            }
        }
        Err(e) => reject(e),
    }
}

fn list_tools(domain: Domain) {
    let benchmark = mock::benchmark();
    let environment = match benchmark.environments.environment(domain.as_str()) {
        Ok(environment) => environment,
        Err(e) => reject(e),
    };

    println!("Available tools:");
    let definitions = environment.tools.get_definitions();
    if definitions.is_empty() {
        println!("  No tools registered.");
    } else {
        for def in definitions {
            println!("  - {}: {}", def.function.name, def.function.description);
        }
    }
}
