//! The operator-controlled singleton in `app_config`.

use coldmail_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// Primary key of the only `app_config` row.
pub const APP_CONFIG_ID: i16 = 1;

/// Run flag plus the current subject and body template.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppConfig {
    pub id: i16,
    pub is_running: bool,
    pub email_subject: Option<String>,
    pub email_template: Option<String>,
    pub updated_at: Timestamp,
}
