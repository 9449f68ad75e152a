use chrono::Local;
use clap::Parser;
use sprint_summary::config::AppConfig;
use sprint_summary::report::{self, OutputMode};
use sprint_summary::{collect_summary, dates, prompt, Upstreams};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Summarize completed JIRA tickets and GitHub pull request reviews for a sprint.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Output in concise format for easy copy/paste
    #[arg(long)]
    concise: bool,

    /// Sprint start as YYYY-MM-DD or a number of days back; prompted for when omitted
    #[arg(long, value_name = "DATE|DAYS")]
    start: Option<String>,

    /// Sprint end as YYYY-MM-DD; defaults to today
    #[arg(long, value_name = "DATE", requires = "start")]
    end: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout only carries the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprint_summary=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let today = Local::now().date_naive();

    let interval = match &args.start {
        Some(start) => dates::resolve(start, args.end.as_deref().unwrap_or_default(), today)?,
        None => prompt::prompt_interval(&mut io::stdin().lock(), &mut io::stderr(), today)?,
    };

    let upstreams = Upstreams::new(&config)?;
    let summary = collect_summary(&upstreams, &config, interval, &Local).await?;

    let mode = if args.concise {
        OutputMode::Concise
    } else {
        OutputMode::Detailed
    };
    print!("{}", report::format(&summary, mode));

    Ok(())
}
