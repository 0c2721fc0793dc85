use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use restaurant_crew::config::{Config, DEFAULT_CONFIG_PATH};
use restaurant_crew::context::AppContext;
use restaurant_crew::error::Result;
use restaurant_crew::interfaces::confirm::{AutoConfirm, Confirm, ConsoleConfirm};
use restaurant_crew::services::setup::run_setup;
use restaurant_crew::services::workflow::{WorkflowDriver, WorkflowOutcome};
use restaurant_crew::session_log::SessionSummary;

#[derive(Parser, Debug)]
#[command(name = "restaurant-crew")]
#[command(about = "Restaurant recommendations, a feedback survey and its analysis")]
#[command(version)]
struct Cli {
    #[arg(long, env = "RESTAURANT_CREW_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Skip the interactive prompt and use this request.
    #[arg(long)]
    request: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(long, default_value_t = false)]
    yes: bool,

    #[arg(long, env = "RESTAURANT_CREW_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Write a starter config file from a few prompts, then exit.
    #[arg(long, default_value_t = false)]
    init: bool,
}

fn print_summary(outcome: &WorkflowOutcome, recipients: usize, session: &SessionSummary) {
    println!("\n{}", "=".repeat(60));
    println!("Workflow complete");
    println!("{}", "=".repeat(60));
    println!("  Recommendations: done");
    println!("  Survey:          {}", outcome.survey_link);
    match &outcome.email_result {
        Some(_) => println!("  Emails:          done ({recipients} recipient(s))"),
        None => println!("  Emails:          skipped"),
    }
    println!("  Analysis:        done");
    println!(
        "  Total time:      {:.2}s",
        outcome.execution_time.as_secs_f64()
    );
    println!("\nSession {}", session.session_id);
    println!("  Session log: {}", session.log_files.session_log.display());
    println!("  Task log:    {}", session.log_files.task_log.display());
    println!(
        "  Tasks: {} total, {} completed, {} failed, {:.2}s",
        session.total_tasks,
        session.completed_tasks,
        session.error_tasks,
        session.total_execution_time
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    restaurant_crew::logging::init_tracing("restaurant_crew");
    let cli = Cli::parse();
    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AutoConfirm::yes())
    } else {
        Box::new(ConsoleConfirm)
    };

    if cli.init {
        run_setup(&cli.config, confirm.as_ref()).await?;
        return Ok(());
    }
    if !cli.config.exists() {
        eprintln!(
            "{} not found. Run `restaurant-crew --init` to create one.",
            cli.config.display()
        );
    }

    let config = Config::load(&cli.config)?;
    config.validate();
    config.require_model_credential()?;
    config.apply_environment();

    let ctx = AppContext::from_config(config, cli.log_dir)?;

    println!("\n{}", "=".repeat(60));
    println!("Restaurant crew");
    println!("{}\n", "=".repeat(60));

    let default_request = ctx.config.restaurant_settings.default_request.clone();
    let request = match cli.request {
        Some(request) if !request.trim().is_empty() => request,
        _ => {
            confirm
                .ask("What kind of restaurant are you looking for?", &default_request)
                .await?
        }
    };

    let recipients = ctx.config.email_settings.recipients.clone();
    if recipients.is_empty() {
        println!("No email recipients configured; survey emails will not be delivered.");
    }

    let driver = WorkflowDriver::new(&ctx, confirm.as_ref());
    match driver.run(&request, &recipients).await {
        Ok(outcome) => {
            let mut results = outcome.to_json();
            results["status"] = json!("success");
            results["email_recipients_count"] = json!(recipients.len());
            let session = ctx.session.end(results)?;
            print_summary(&outcome, recipients.len(), &session);
            Ok(())
        }
        Err(err) => {
            eprintln!("\nWorkflow failed: {err}");
            let failure = json!({
                "status": "error",
                "user_request": request,
                "error": err.to_string(),
            });
            if let Ok(session) = ctx.session.end(failure) {
                eprintln!("Session log: {}", session.log_files.session_log.display());
            }
            Err(err)
        }
    }
}
