//! Member CSV and document backup exports
//!
//! Backups are the exact bytes the file backend writes. Credentials live
//! outside the document and so never appear in a backup.

use crate::document::PortalDocument;
use crate::error::{ExportError, PortalResult};
use crate::types::PortalId;

/// Export members as `name,portal` CSV, optionally for one portal only
///
/// # Errors
/// - `ValidationError::UnknownPortal` for an unknown filter
/// - `ExportError` if the writer fails
pub fn members_csv(document: &PortalDocument, portal: Option<&PortalId>) -> PortalResult<String> {
    let portals: Vec<_> = match portal {
        Some(id) => vec![document.portal(id)?],
        None => document.portals.values().collect(),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["name", "portal"]).map_err(ExportError::from)?;
    for entry in portals {
        for member in &entry.members {
            writer
                .write_record([member.as_str(), entry.id.as_str()])
                .map_err(ExportError::from)?;
        }
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)).into()
    })
}

/// Full JSON backup, identical to the persisted document
///
/// # Errors
/// `ExportError::Json` if encoding fails
pub fn backup_json(document: &PortalDocument) -> PortalResult<String> {
    document.to_json_pretty().map_err(|e| match e {
        crate::error::PersistenceError::Encode(inner) => ExportError::Json(inner).into(),
        other => other.into(),
    })
}
