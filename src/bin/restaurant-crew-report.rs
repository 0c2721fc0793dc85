use std::path::PathBuf;

use clap::Parser;
use serde_json::{json, Value};

use restaurant_crew::config::{Config, DEFAULT_CONFIG_PATH};
use restaurant_crew::context::AppContext;
use restaurant_crew::error::{CrewError, Result};
use restaurant_crew::google::forms::parse_form_id;
use restaurant_crew::interfaces::confirm::{AutoConfirm, Confirm, ConsoleConfirm};
use restaurant_crew::services::pipeline::RestaurantPipeline;
use restaurant_crew::services::survey::{render_report, summarize_responses, write_report};

#[derive(Parser, Debug)]
#[command(name = "restaurant-crew-report")]
#[command(about = "Analyze collected survey responses and write a Markdown report")]
#[command(version)]
struct Cli {
    #[arg(long, env = "RESTAURANT_CREW_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Form id or form URL; prompted for when absent.
    #[arg(long)]
    form_id: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(long, default_value_t = false)]
    yes: bool,

    #[arg(long, env = "RESTAURANT_CREW_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

async fn run(ctx: &AppContext, confirm: &dyn Confirm, form_input: Option<String>) -> Result<Value> {
    let Some(forms) = &ctx.forms else {
        return Err(CrewError::Config(
            "google_credentials are not configured; cannot read form responses".to_string(),
        ));
    };

    let form_input = match form_input {
        Some(input) => input,
        None => {
            println!("Enter the Google Form id (the part after '/d/' in the form URL).");
            confirm.ask("Form ID", "").await?
        }
    };
    let form_id = parse_form_id(&form_input)
        .ok_or_else(|| CrewError::Config(format!("not a form id: '{form_input}'")))?;

    println!("\nFetching survey responses...");
    let form = forms.fetch_form_data(&form_id).await?;
    ctx.session.log_api_call(
        "google_forms",
        "forms.responses.list",
        &format!("{} responses", form.total_responses),
    );
    println!("Responses collected so far: {}", form.total_responses);

    if form.total_responses == 0 {
        println!("No responses yet. Share the survey link and run this again later.");
        return Ok(json!({ "status": "no_responses", "form_id": form_id }));
    }

    let question = format!(
        "Write a report from the current {} response(s)?",
        form.total_responses
    );
    if !confirm.confirm(&question).await? {
        println!("Report cancelled.");
        return Ok(json!({ "status": "cancelled", "form_id": form_id }));
    }

    println!("\nAnalyzing responses...");
    let summary = summarize_responses(&form);
    let analysis = RestaurantPipeline::new(ctx).analyze(&summary).await?;

    let report = render_report(&analysis, &summary, &form.title, chrono::Local::now());
    let report_path = write_report(&ctx.config.reports_dir(), &report)?;
    ctx.session
        .note(&format!("report written: {}", report_path.display()));
    println!("Report saved to {}", report_path.display());

    let mut emailed = 0;
    if confirm.confirm("Email the report?").await? {
        let recipients = &ctx.config.email_settings.recipients;
        if recipients.is_empty() {
            println!("No recipients configured in email_settings.recipients.");
        } else {
            let subject = format!(
                "[Restaurant picks] Survey analysis report - {}",
                ctx.today().format("%Y-%m-%d")
            );
            let file_name = report_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("Sending the report to {} recipient(s)...", recipients.len());
            let outcomes = ctx
                .mailer
                .send_report(recipients, &subject, &report, &file_name)
                .await;
            for (recipient, outcome) in &outcomes {
                ctx.session.log_email_sending(
                    std::slice::from_ref(recipient),
                    &subject,
                    outcome.is_success(),
                );
                if outcome.is_success() {
                    emailed += 1;
                }
            }
            println!("Report email delivered to {emailed} of {} recipient(s).", outcomes.len());
        }
    } else {
        println!("Report email cancelled.");
    }

    Ok(json!({
        "status": "success",
        "form_id": form_id,
        "total_responses": summary.total_responses,
        "restaurant_preferences": summary.restaurant_preferences,
        "report_path": report_path,
        "emailed": emailed,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    restaurant_crew::logging::init_tracing("restaurant_crew_report");
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate();
    config.require_model_credential()?;
    config.apply_environment();

    let ctx = AppContext::from_config(config, cli.log_dir)?;
    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AutoConfirm::yes())
    } else {
        Box::new(ConsoleConfirm)
    };

    match run(&ctx, confirm.as_ref(), cli.form_id).await {
        Ok(results) => {
            ctx.session.end(results)?;
            Ok(())
        }
        Err(err) => {
            eprintln!("\nReport failed: {err}");
            let _ = ctx
                .session
                .end(json!({ "status": "error", "error": err.to_string() }));
            Err(err)
        }
    }
}
