use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use contract_review_common::types::UserContext;
use contract_review_common::ReviewError;
use contract_review_engine::config::{self, EngineConfig};
use contract_review_engine::document::{DocumentCache, PdfPageSource};
use contract_review_engine::knowledge::{ChecklistKnowledge, KnowledgeBase};
use contract_review_engine::pipeline::{ReviewPipeline, ReviewReport, ReviewRequest};
use contract_review_engine::roles::LlmRoleInvoker;

/// Review a contract against the checklist methodology and print a JSON report.
#[derive(Parser, Debug)]
#[command(name = "contract-review", version, about)]
struct Args {
    /// Contract to review (PDF, or plain text)
    contract: PathBuf,

    /// Configuration directory (system.toml, prompts/, tools/)
    #[arg(long, env = "CONTRACT_REVIEW_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    user_id: Option<String>,

    #[arg(long)]
    session_id: Option<String>,

    #[arg(long)]
    full_name: Option<String>,

    #[arg(long)]
    job_title: Option<String>,

    /// Industry or domain the reviewer works in
    #[arg(long)]
    industry: Option<String>,

    #[arg(long)]
    nationality: Option<String>,

    #[arg(long)]
    country: Option<String>,

    #[arg(long)]
    company_size: Option<String>,

    #[arg(long)]
    years_experience: Option<String>,

    /// Specific concerns to emphasize
    #[arg(long)]
    concerns: Option<String>,

    /// Anything else the reviewers should know
    #[arg(long)]
    context: Option<String>,
}

impl Args {
    fn review_request(&self) -> ReviewRequest {
        ReviewRequest {
            path: self.contract.clone(),
            user_context: UserContext {
                full_name: self.full_name.clone(),
                job_title: self.job_title.clone(),
                domain_industry: self.industry.clone(),
                nationality: self.nationality.clone(),
                country: self.country.clone(),
                company_size: self.company_size.clone(),
                year_experience: self.years_experience.clone(),
                specific_concerns: self.concerns.clone(),
                additional_context: self.context.clone(),
            },
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let engine_config = match config::load_config(&args.config_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let knowledge = load_knowledge(&engine_config);
    let invoker = LlmRoleInvoker::from_config(&engine_config, knowledge);
    let mut pipeline = ReviewPipeline::new(DocumentCache::pdf(), Arc::new(invoker));

    let report = match pipeline.review(&args.review_request()).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, fatal = e.is_fatal(), "Review failed");
            std::process::exit(1);
        }
    };

    let json = match render_report(&report) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize report");
            std::process::exit(1);
        }
    };

    if let Err(e) = write_report(args.output.as_deref(), &json) {
        tracing::error!(error = %e, "Failed to write report");
        std::process::exit(1);
    }

    if !report.complete {
        tracing::warn!(
            missing = ?report.missing_roles,
            "Report is incomplete; see executive summary"
        );
    }
}

/// The checklist guide is optional: without it the compliance role reviews
/// from general practice.
fn load_knowledge(config: &EngineConfig) -> Option<Arc<dyn KnowledgeBase>> {
    let path = config.checklist_path()?;
    let passage_chars = config.system.knowledge.passage_chars as usize;

    match ChecklistKnowledge::load(&path, &PdfPageSource, passage_chars) {
        Ok(knowledge) if !knowledge.is_empty() => Some(Arc::new(knowledge)),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Checklist guide has no text, continuing without it");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Checklist guide unavailable, continuing without it");
            None
        }
    }
}

fn render_report(report: &ReviewReport) -> Result<String, ReviewError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn write_report(output: Option<&Path>, json: &str) -> std::io::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), "Report written");
            Ok(())
        }
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}
