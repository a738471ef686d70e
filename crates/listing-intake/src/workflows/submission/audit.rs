use std::io::Write;

use serde::Serialize;

use super::domain::AdminActionRecord;
use super::repository::RepositoryError;

#[derive(Debug)]
pub enum AuditExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Repository(RepositoryError),
}

impl std::fmt::Display for AuditExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditExportError::Io(err) => write!(f, "failed to write audit export: {}", err),
            AuditExportError::Csv(err) => write!(f, "invalid audit CSV output: {}", err),
            AuditExportError::Repository(err) => {
                write!(f, "could not read the audit log: {}", err)
            }
        }
    }
}

impl std::error::Error for AuditExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuditExportError::Io(err) => Some(err),
            AuditExportError::Csv(err) => Some(err),
            AuditExportError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for AuditExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for AuditExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for AuditExportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    id: &'a str,
    created_at: String,
    admin_id: &'a str,
    submission_id: &'a str,
    action: &'static str,
    revision: u32,
    comment: &'a str,
}

/// Writes audit entries as CSV with a header row, in the order given.
pub fn write_audit_csv<W: Write>(
    writer: W,
    entries: &[AdminActionRecord],
) -> Result<usize, AuditExportError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for entry in entries {
        csv_writer.serialize(AuditRow {
            id: &entry.id,
            created_at: entry.created_at.to_rfc3339(),
            admin_id: &entry.admin_id.0,
            submission_id: &entry.target_submission_id.0,
            action: entry.action.label(),
            revision: entry.revision,
            comment: entry.comment.as_deref().unwrap_or_default(),
        })?;
    }
    csv_writer.flush()?;
    Ok(entries.len())
}
