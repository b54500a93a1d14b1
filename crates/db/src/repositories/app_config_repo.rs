//! Repository for the `app_config` singleton.

use sqlx::PgPool;

use crate::models::app_config::{AppConfig, APP_CONFIG_ID};

/// Column list for `app_config` queries.
const COLUMNS: &str = "id, is_running, email_subject, email_template, updated_at";

/// Reads and operator updates of the run configuration.
pub struct AppConfigRepo;

impl AppConfigRepo {
    /// Load the singleton row, or `None` if it has not been seeded.
    pub async fn get(pool: &PgPool) -> Result<Option<AppConfig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM app_config WHERE id = $1");
        sqlx::query_as::<_, AppConfig>(&query)
            .bind(APP_CONFIG_ID)
            .fetch_optional(pool)
            .await
    }

    /// Flip the run/pause switch.
    pub async fn set_running(pool: &PgPool, is_running: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE app_config SET is_running = $2, updated_at = NOW() WHERE id = $1")
            .bind(APP_CONFIG_ID)
            .bind(is_running)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace the subject and body template.
    pub async fn update_template(
        pool: &PgPool,
        subject: &str,
        template: &str,
    ) -> Result<AppConfig, sqlx::Error> {
        let query = format!(
            "UPDATE app_config \
             SET email_subject = $2, email_template = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppConfig>(&query)
            .bind(APP_CONFIG_ID)
            .bind(subject)
            .bind(template)
            .fetch_one(pool)
            .await
    }
}
