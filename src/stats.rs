//! Vault statistics and the session audit view.
//!
//! Gives a quick summary of what is stored: document count, on-disk sizes,
//! and the most recent sessions.

use anyhow::Result;
use std::path::Path;

use crate::allocate::is_managed_name;
use crate::vault::Vault;

/// `perdocman stats`
pub async fn run_stats(vault: &Vault) -> Result<()> {
    let paths = vault.paths();
    let total_docs = vault.store().count_documents().await?;
    let db_size = std::fs::metadata(&paths.db_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let (file_count, file_bytes) = storage_usage(&paths.documents_dir);

    println!("PerDocMan Vault Stats");
    println!("=====================");
    println!();
    println!("  Vault root:  {}", paths.root.display());
    println!("  Database:    {}", paths.db_path.display());
    println!("  DB size:     {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!(
        "  Stored:      {} files, {}",
        file_count,
        format_bytes(file_bytes)
    );
    if file_count as i64 > total_docs {
        println!(
            "  Orphans:     {} file(s) without a record",
            file_count as i64 - total_docs
        );
    }
    println!();

    Ok(())
}

/// `perdocman sessions`
pub async fn run_sessions(vault: &Vault, limit: i64) -> Result<()> {
    let sessions = vault.store().list_sessions(limit).await?;

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!(
        "  {:<32}  {:<19}  {:<19}  {:<12} {:<16} {}",
        "SESSION", "STARTED", "ENDED", "USER", "HOST", "NOTE"
    );
    println!("  {}", "-".repeat(116));
    for s in &sessions {
        println!(
            "  {:<32}  {:<19}  {:<19}  {:<12} {:<16} {}",
            s.session_id,
            format_ts(&s.started_at),
            s.ended_at
                .as_deref()
                .map(format_ts)
                .unwrap_or_else(|| "(open)".to_string()),
            s.username,
            s.hostname,
            s.notes.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Count and total size of managed files.
fn storage_usage(dir: &Path) -> (u64, u64) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (0, 0);
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_str().is_some_and(is_managed_name))
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .fold((0, 0), |(n, bytes), m| (n + 1, bytes + m.len()))
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| ts.to_string())
}
