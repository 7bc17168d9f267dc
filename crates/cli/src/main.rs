use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use spread_api::{AddRequest, DEFAULT_NAMESPACE};
use spread_project::Project;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "spread", version, about = "Stage live cluster objects into a versioned project")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a project (.spread/) in the current directory
    Init,
    /// Stage an object from the cluster into the index
    Add {
        /// Resource reference, e.g. "rc/mattermost" or "Deployment/web"
        reference: Option<String>,
        /// Namespace to look for the object in
        #[arg(long = "namespace", env = "SPREAD_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
        namespace: String,
        /// kubeconfig context to use for requests (default: current context)
        #[arg(long = "context", env = "SPREAD_CONTEXT")]
        context: Option<String>,
        /// Don't strip cluster-specific fields from the object
        #[arg(long = "no-export", action = ArgAction::SetTrue)]
        no_export: bool,
    },
    /// List staged index entries
    Status,
}

fn init_tracing() {
    let env = std::env::var("SPREAD_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("SPREAD_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid SPREAD_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let cwd = std::env::current_dir().context("reading current directory")?;
            let project = Project::init(&cwd)?;
            match cli.output {
                Output::Human => println!("initialized project in {}", project.root().join(spread_project::PROJECT_DIR).display()),
                Output::Json => println!("{}", serde_json::json!({ "root": project.root().display().to_string() })),
            }
        }
        Commands::Add { reference, namespace, context, no_export } => {
            let reference = reference.unwrap_or_default();
            let export = !no_export;
            info!(reference = %reference, namespace = %namespace, context = ?context, export, "add invoked");
            let res = match AddRequest::new(&reference, &namespace, export) {
                Ok(req) => spread_api::add_from_cluster(context.as_deref(), &req).await,
                Err(e) => Err(e),
            };
            match res {
                Ok(staged) => match cli.output {
                    Output::Human => {
                        let verb = if staged.replaced { "updated" } else { "staged" };
                        println!("{} {}", verb, staged.path);
                    }
                    Output::Json => println!("{}", serde_json::to_string_pretty(&staged)?),
                },
                Err(e) => {
                    error!(kind = e.kind(), "add failed");
                    eprintln!("error: {:#}", anyhow::Error::new(e));
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => {
            let project = Project::open_current().context("not in a spread project")?;
            let entries = project.entries()?;
            match cli.output {
                Output::Human => {
                    if entries.is_empty() {
                        println!("nothing staged");
                    }
                    for e in &entries {
                        println!("{}  {}", &e.blob.0[..e.blob.0.len().min(12)], e.path);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
            }
        }
    }

    Ok(())
}
