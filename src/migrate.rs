use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create articles table. The UNIQUE constraint on url is the dedup
    // guarantee; application-level checks are only an optimization.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            published_date TEXT,
            company TEXT NOT NULL,
            summary TEXT,
            content TEXT,
            embedding BLOB
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_company ON articles(company)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_published_date ON articles(published_date DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
