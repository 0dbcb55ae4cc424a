use crate::{OutputFormat, Session};

pub async fn run(session: &Session, format: &OutputFormat) -> anyhow::Result<()> {
    let files = session.store.list(&session.channel).await?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        OutputFormat::Text => {
            println!("{} file(s):", files.len());
            for f in &files {
                let incomplete = if f.chunk_count == 0 { " [NO CHUNKS]" } else { "" };
                println!(
                    "  {id} | {name} | {size} bytes | {chunks} chunk(s){incomplete}",
                    id = f.id,
                    name = f.name,
                    size = f.size,
                    chunks = f.chunk_count,
                );
            }
        }
    }
    Ok(())
}
