use crate::infra::{open_repository, LogChannelPublisher, LogNotifier};
use chrono::Utc;
use clap::Args;
use listing_intake::config::{IntakeConfig, TelemetryConfig};
use listing_intake::error::AppError;
use listing_intake::telemetry::{self, LogSink};
use listing_intake::workflows::submission::{
    write_audit_csv, AdminAction, AdminId, ApplyOutcome, AuditExportError,
    InMemorySubmissionRepository, IntakeService, ModerationRequest, OwnerId, SchemaCatalog,
    SchemaVersion, StepTarget, SubmissionId, SubmissionRepository, WizardAction,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_ADMIN: &str = "demo-moderator";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Owner id used for the demo listing.
    #[arg(long, default_value = "demo-seller")]
    pub(crate) owner: String,
    /// Schema to walk (extended or legacy). Defaults to the configured schema.
    #[arg(long, value_parser = parse_schema)]
    pub(crate) schema: Option<SchemaVersion>,
    /// Send the listing back for fixes once before approving it.
    #[arg(long)]
    pub(crate) needs_fix_first: bool,
    /// Print the audit log as CSV after the walk-through.
    #[arg(long)]
    pub(crate) audit_csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct AuditExportArgs {
    /// Snapshot file written by `serve --data-path`.
    #[arg(long)]
    pub(crate) data_path: PathBuf,
    /// Destination CSV file (defaults to stdout).
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

fn parse_schema(raw: &str) -> Result<SchemaVersion, String> {
    SchemaVersion::parse(raw).ok_or_else(|| format!("unknown schema '{raw}' (extended or legacy)"))
}

fn cli_logging() -> Result<(), AppError> {
    let config = TelemetryConfig {
        log_level: "warn".to_string(),
    };
    telemetry::init_with_sink(&config, LogSink::Stderr)?;
    Ok(())
}

type DemoService = IntakeService<InMemorySubmissionRepository, LogNotifier, LogChannelPublisher>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    cli_logging()?;
    let DemoArgs {
        owner,
        schema,
        needs_fix_first,
        audit_csv,
    } = args;

    let config = IntakeConfig {
        admin_ids: vec![DEMO_ADMIN.to_string()],
        ..IntakeConfig::default()
    };
    let repository = Arc::new(open_repository(&config)?);
    let notifier = Arc::new(LogNotifier::default());
    let service = IntakeService::new(
        repository.clone(),
        notifier.clone(),
        Arc::new(LogChannelPublisher::default()),
        config,
    )?;

    let owner = OwnerId(owner);
    let session = service.start_or_resume(&owner, schema)?;
    let schema = session.submission.schema;
    let id = session.submission.submission_id.clone();
    println!("Listing intake demo ({schema} schema, submission {id})");
    println!(
        "\n[{}/{}] {}",
        session.step.position, session.step.total, session.step.prompt
    );

    for action in scripted_answers(schema) {
        if let Some(revision) = walk(&service, &id, action)? {
            println!("\nSubmitted as revision {revision}");
            break;
        }
    }

    if needs_fix_first {
        let outcome = service.moderate(
            &id,
            decision(AdminAction::NeedsFix, Some("Please add a contact handle")),
        )?;
        println!(
            "\nModerator: {} (revision {})",
            outcome.submission.status, outcome.submission.revision
        );
        let view = service.submit(&id)?;
        println!("Resubmitted as revision {}", view.revision);
    }

    let outcome = service.moderate(&id, decision(AdminAction::Approve, None))?;
    match &outcome.submission.post {
        Some(post) => println!("\nPublished to {} as post {}", post.channel, post.post_id),
        None => println!("\nStatus: {}", outcome.submission.status),
    }

    println!("\nOwner notices");
    for (recipient, message) in notifier.delivered() {
        println!("- {recipient}: {message}");
    }

    if audit_csv {
        println!();
        let entries = repository.audit_log().map_err(AuditExportError::from)?;
        write_audit_csv(io::stdout().lock(), &entries)?;
    }

    Ok(())
}

/// Applies one scripted action and echoes the next prompt. Returns the revision once the
/// wizard submits.
fn walk(
    service: &DemoService,
    id: &SubmissionId,
    action: WizardAction,
) -> Result<Option<u32>, AppError> {
    if let WizardAction::Advance { input } = &action {
        println!("> {input}");
    } else {
        println!("> ({})", action.label());
    }

    match service.apply(id, action)? {
        ApplyOutcome::Step(view) => {
            println!("\n[{}/{}] {}", view.position, view.total, view.prompt);
            Ok(None)
        }
        ApplyOutcome::Submitted(view) => Ok(Some(view.revision)),
    }
}

fn decision(action: AdminAction, reason: Option<&str>) -> ModerationRequest {
    ModerationRequest {
        admin_id: AdminId(DEMO_ADMIN.to_string()),
        action,
        reason: reason.map(str::to_string),
        existing_post: None,
    }
}

fn answer(input: &str) -> WizardAction {
    WizardAction::Advance {
        input: input.to_string(),
    }
}

fn scripted_answers(schema: SchemaVersion) -> Vec<WizardAction> {
    match schema {
        SchemaVersion::Legacy => vec![
            answer("start"),
            answer("Invoice Bot"),
            answer("Telegram bot that sends invoices and payment reminders"),
            answer("https://t.me/invoice_bot"),
            answer("$1k-2k"),
            answer("seller@example.com"),
            answer("confirm"),
        ],
        SchemaVersion::Extended => vec![
            answer("start"),
            answer("Invoice Bot"),
            answer("Telegram bot that sends invoices and payment reminders"),
            answer("Bots"),
            answer("2 years"),
            answer("https://t.me/invoice_bot"),
            WizardAction::Skip,
            answer("yes"),
            answer("1 200"),
            answer("3 400"),
            answer("Rust, teloxide, Postgres"),
            answer("no"),
            answer("https://img.example.com/invoice-bot.png"),
            WizardAction::Finish,
            answer("$1k-2k"),
            answer("yes"),
            answer("Focusing on a new product"),
            answer("seller@example.com"),
            WizardAction::Skip,
            answer("confirm"),
        ],
    }
}

pub(crate) fn run_schema_check() -> Result<(), AppError> {
    cli_logging()?;
    let catalog = SchemaCatalog::load()?;

    for schema in catalog.versions() {
        println!(
            "{} schema: {} steps, {} required answers",
            schema.version(),
            schema.len(),
            schema.required_answer_keys().count()
        );
        for (index, step) in schema.steps().iter().enumerate() {
            let mut flags = Vec::new();
            if step.optional {
                flags.push("optional");
            }
            if step.multi_value {
                flags.push("multi");
            }
            let branches = step
                .branches
                .iter()
                .map(|rule| format!(" | {:?} -> {}", rule.when, target_label(rule.target)))
                .collect::<String>();
            println!(
                "  {:>2}. {:<16} -> {}{}{}",
                index + 1,
                step.key.to_string(),
                target_label(step.next),
                branches,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                }
            );
        }
    }

    println!("\nAll schemas passed integrity checks.");
    Ok(())
}

fn target_label(target: StepTarget) -> String {
    match target {
        StepTarget::Step(key) => key.to_string(),
        StepTarget::End => "end".to_string(),
    }
}

pub(crate) fn run_audit_export(args: AuditExportArgs) -> Result<(), AppError> {
    cli_logging()?;
    let config = IntakeConfig {
        data_path: Some(args.data_path),
        ..IntakeConfig::default()
    };
    let repository = open_repository(&config)?;
    let entries = repository.audit_log().map_err(AuditExportError::from)?;

    let written = match args.output {
        Some(path) => {
            let file = File::create(&path)?;
            let written = write_audit_csv(file, &entries)?;
            eprintln!("wrote {written} audit entries to {}", path.display());
            written
        }
        None => {
            let mut stdout = io::stdout().lock();
            let written = write_audit_csv(&mut stdout, &entries)?;
            stdout.flush()?;
            written
        }
    };

    if written == 0 {
        eprintln!("audit log is empty ({})", Utc::now().to_rfc3339());
    }
    Ok(())
}
