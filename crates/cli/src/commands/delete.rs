use clap::Args;

use crate::{OutputFormat, Session};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// File id.
    pub file_id: String,
}

pub async fn run(session: &Session, args: &DeleteArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let report = session.store.delete(&session.channel, &args.file_id).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "Deleted {} record(s): {} in bulk, {} individually.",
                report.deleted(),
                report.bulk_deleted.len(),
                report.individually_deleted.len()
            );
            for f in &report.failed {
                println!("  FAILED {} | {}", f.id, f.error);
            }
        }
    }

    if !report.is_complete() {
        eprintln!(
            "{} record(s) of {} could not be deleted.",
            report.failed.len(),
            args.file_id
        );
        std::process::exit(1);
    }
    Ok(())
}
