//! Database statistics and health overview.
//!
//! Summarizes what is stored: documents, index records, history entries,
//! the index's model/dimensionality binding, and whether writes are
//! currently disabled by a dimension fault. Used by `ragdesk stats`.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-tenant breakdown of stored rows.
struct TenantStats {
    tenant: String,
    doc_count: i64,
    record_count: i64,
    question_count: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;
    let total_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_records")
        .fetch_one(&pool)
        .await?;
    let total_questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history")
        .fetch_one(&pool)
        .await?;

    let meta_rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(&pool)
        .await?;
    let meta = |key: &str| -> Option<String> {
        meta_rows
            .iter()
            .find(|r| r.get::<String, _>("key") == key)
            .map(|r| r.get::<String, _>("value"))
    };

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("ragdesk: Database Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Records:     {}", total_records);
    println!("  Questions:   {}", total_questions);
    println!();
    println!(
        "  Model:       {}",
        meta("model").unwrap_or_else(|| "(unbound)".to_string())
    );
    println!(
        "  Dimensions:  {}",
        meta("dims").unwrap_or_else(|| "(not fixed yet)".to_string())
    );
    match (meta("fault_expected"), meta("fault_actual")) {
        (Some(expected), Some(actual)) => println!(
            "  Writes:      DISABLED (dimension fault: expected {}, got {}; run `ragdesk index clear-fault`)",
            expected, actual
        ),
        _ => println!("  Writes:      enabled"),
    }

    let tenant_rows = sqlx::query(
        r#"
        SELECT
            t.tenant_id,
            (SELECT COUNT(*) FROM documents d WHERE d.tenant_id = t.tenant_id) AS doc_count,
            (SELECT COUNT(*) FROM vector_records v WHERE v.tenant_id = t.tenant_id) AS record_count,
            (SELECT COUNT(*) FROM history h WHERE h.tenant_id = t.tenant_id) AS question_count
        FROM (
            SELECT tenant_id FROM documents
            UNION SELECT tenant_id FROM vector_records
            UNION SELECT tenant_id FROM history
        ) t
        ORDER BY doc_count DESC, t.tenant_id ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let tenants: Vec<TenantStats> = tenant_rows
        .iter()
        .map(|row| TenantStats {
            tenant: row.get("tenant_id"),
            doc_count: row.get("doc_count"),
            record_count: row.get("record_count"),
            question_count: row.get("question_count"),
        })
        .collect();

    if !tenants.is_empty() {
        println!();
        println!("  By tenant:");
        println!(
            "  {:<32} {:>6} {:>8} {:>10}",
            "TENANT", "DOCS", "RECORDS", "QUESTIONS"
        );
        println!("  {}", "-".repeat(60));
        for t in &tenants {
            println!(
                "  {:<32} {:>6} {:>8} {:>10}",
                t.tenant, t.doc_count, t.record_count, t.question_count
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
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
