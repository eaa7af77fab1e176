//! Document lookup and listing for the CLI.
//!
//! The HTTP server reads the same records through
//! [`MetadataStore`](crate::store::MetadataStore) and renders them itself.

use anyhow::Result;

use crate::models::Document;
use crate::vault::Vault;

/// `perdocman get <id>`
pub async fn run_get(vault: &Vault, id: i64) -> Result<()> {
    let doc = vault.store().get_document(id).await?;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("filename:     {}", doc.original_filename);
    println!("stored_path:  {}", doc.stored_path);
    println!("sha256:       {}", doc.sha256);
    println!("category:     {}", doc.category.as_deref().unwrap_or("-"));
    println!("tags:         {}", doc.tags.as_deref().unwrap_or("-"));
    println!("doc_date:     {}", doc.doc_date.as_deref().unwrap_or("-"));
    println!("ingested_at:  {}", doc.ingested_at);
    println!();

    println!("--- Preview ---");
    println!("{}", doc.preview.as_deref().unwrap_or("(no preview)"));

    Ok(())
}

/// `perdocman list`, newest first.
pub async fn run_list(vault: &Vault, limit: i64) -> Result<()> {
    let docs = vault.store().list_documents(limit).await?;

    if docs.is_empty() {
        println!("No documents yet.");
        return Ok(());
    }

    println!(
        "{:>6}  {:<32} {:<14} {:<20} {:<10}  {}",
        "ID", "FILENAME", "CATEGORY", "TAGS", "DOC DATE", "INGESTED"
    );
    for doc in &docs {
        println!("{}", format_row(doc));
    }
    Ok(())
}

fn format_row(doc: &Document) -> String {
    format!(
        "{:>6}  {:<32} {:<14} {:<20} {:<10}  {}",
        doc.id,
        truncate(&doc.original_filename, 32),
        truncate(doc.category.as_deref().unwrap_or("-"), 14),
        truncate(doc.tags.as_deref().unwrap_or("-"), 20),
        doc.doc_date.as_deref().unwrap_or("-"),
        format_ts_short(&doc.ingested_at),
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

fn format_ts_short(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| ts.to_string())
}
