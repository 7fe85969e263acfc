//! Attachment row types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

/// Storage backend an attachment lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Local,
    Qiniu,
}

impl Drive {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Qiniu => "qiniu",
        }
    }
}

impl TryFrom<&str> for Drive {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "local" => Ok(Self::Local),
            "qiniu" => Ok(Self::Qiniu),
            other => Err(format!("unknown drive: {other}")),
        }
    }
}

/// Year/month/day bucket an upload is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePartition {
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

impl DatePartition {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            // month/day are at most 31
            month: date.month() as i32,
            day: date.day() as i32,
        }
    }

    /// Fills each missing or unparsable component from `today`.
    pub fn from_fields(
        year: Option<&str>,
        month: Option<&str>,
        day: Option<&str>,
        today: NaiveDate,
    ) -> Self {
        let fallback = Self::from_date(today);
        let parse = |raw: Option<&str>, default: i32| {
            raw.and_then(|v| v.trim().parse::<i32>().ok())
                .unwrap_or(default)
        };
        Self {
            year: parse(year, fallback.year),
            month: parse(month, fallback.month),
            day: parse(day, fallback.day),
        }
    }
}

/// Values for a new `attachments` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub member_id: i64,
    pub drive: Drive,
    pub specific_type: String,
    pub name: String,
    pub size: i64,
    pub path: String,
    pub hash: Option<String>,
    pub extension: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub partition: DatePartition,
}

/// A stored attachment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: i64,
    pub member_id: i64,
    pub drive: String,
    pub specific_type: String,
    pub name: String,
    pub size: i64,
    pub path: String,
    pub hash: Option<String>,
    pub extension: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Builds the row a store would return for `input`.
    pub fn from_insert(id: i64, input: NewAttachment, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            member_id: input.member_id,
            drive: input.drive.as_db_str().to_owned(),
            specific_type: input.specific_type,
            name: input.name,
            size: input.size,
            path: input.path,
            hash: input.hash,
            extension: input.extension,
            width: input.width,
            height: input.height,
            year: input.partition.year,
            month: input.partition.month,
            day: input.partition.day,
            created_at,
        }
    }
}

/// Error type for attachment persistence.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentStoreError {
    #[error("attachment already exists: {drive}:{path}")]
    Duplicate { drive: String, path: String },

    #[error("invalid attachment: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Db(String),
}
