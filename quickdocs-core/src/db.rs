//! Postgres persistence for repository status and generated documentation.
//!
//! The schema is shared with the web application (Prisma-managed), hence the
//! quoted camelCase identifiers.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use quickdocs_model::{Documentation, RepoStatus};

use crate::error::Result;

/// Creates the shared Postgres connection pool.
pub async fn new_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(database_url)
        .await?;

    // Fail startup early rather than on the first job.
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Connected to Postgres");
    Ok(pool)
}

/// Repository over the `"Repo"` / `"Documentation"` tables.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Updates the indexing status and progress of a repository row.
    pub async fn update_repo_status(
        &self,
        repo_id: &str,
        status: RepoStatus,
        progress: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE "Repo"
            SET status = $1::text::"RepoStatus", progress = $2, "errorMessage" = $3, "updatedAt" = NOW()
            WHERE id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(progress)
        .bind(error_message)
        .bind(repo_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Upserts the generated documentation for a repository. Each top-level
    /// documentation field lands in its own JSON column.
    pub async fn save_documentation(&self, repo_id: &str, docs: &Documentation) -> Result<()> {
        let overview = serde_json::to_value(&docs.system_overview)?;
        let architecture = serde_json::to_value(&docs.architecture)?;
        let tech_stack = serde_json::to_value(&docs.tech_stack)?;
        let key_modules = serde_json::to_value(&docs.key_modules)?;
        let entry_points = serde_json::to_value(&docs.entry_points)?;
        let dependencies = serde_json::to_value(&docs.dependencies)?;

        sqlx::query(
            r#"
            INSERT INTO "Documentation"
                (id, "repoId", "systemOverview", architecture, "techStack", "keyModules",
                 "entryPoints", dependencies, "repoContext", "createdAt", "updatedAt")
            VALUES (gen_random_uuid()::text, $1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT ("repoId") DO UPDATE SET
                "systemOverview" = EXCLUDED."systemOverview",
                architecture = EXCLUDED.architecture,
                "techStack" = EXCLUDED."techStack",
                "keyModules" = EXCLUDED."keyModules",
                "entryPoints" = EXCLUDED."entryPoints",
                dependencies = EXCLUDED.dependencies,
                "repoContext" = EXCLUDED."repoContext",
                "updatedAt" = NOW()
            "#,
        )
        .bind(repo_id)
        .bind(overview)
        .bind(architecture)
        .bind(tech_stack)
        .bind(key_modules)
        .bind(entry_points)
        .bind(dependencies)
        .bind(&docs.repo_context)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Email of the user who claimed the repo, if any. Notification emails go
    /// to this address.
    pub async fn claimer_email(&self, repo_id: &str) -> Result<Option<String>> {
        let email: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT u.email
            FROM "User" u
            JOIN "Repo" r ON r."claimedById" = u.id
            WHERE r.id = $1
            "#,
        )
        .bind(repo_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(email.map(|(e,)| e))
    }
}
