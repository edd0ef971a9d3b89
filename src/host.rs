//! Messages exchanged with the host that drives the engine.
//!
//! The host sends a [`SyncRequest`], listens to [`ProgressEvent`]s while the
//! run advances, receives one [`SyncResponse`], and then pulls the finished
//! archive with [`HostCommand::GetZipBlob`].

use serde::{Deserialize, Serialize};

/// Inbound trigger for one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Portal code of the directory to mirror.
    pub root_directory_code: String,
    /// Display name of that directory; names the archive and its top folder.
    pub root_directory_name: String,
}

impl SyncRequest {
    /// Creates a request for a root directory.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            root_directory_code: code.into(),
            root_directory_name: name.into(),
        }
    }
}

/// Single reply to a [`SyncRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Whether the run produced an archive.
    pub ok: bool,
    /// Human-readable outcome; the failure reason when `ok` is false.
    pub message: String,
}

impl SyncResponse {
    /// Successful reply.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// Failed reply.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Progress notification sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Running planned byte total while counting.
    Fetch(u64),
    /// Final planned byte total, sent once counting completes.
    Size(u64),
    /// Packaging has started.
    Zip,
    /// Running downloaded byte total; `0` signals a reset after failure.
    Perc(u64),
}

/// Pull-based commands the host may send after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum HostCommand {
    /// Ask for the last finished archive.
    #[serde(rename = "getZipBlob")]
    GetZipBlob,
}

/// Answer to [`HostCommand::GetZipBlob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveHandoff {
    /// ZIP bytes.
    pub blob: Vec<u8>,
    /// Suggested name (the root directory's name).
    pub name: String,
}

impl ArchiveHandoff {
    /// File name to save the blob under.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.zip", crate::archive::sanitize_entry_name(&self.name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_request_uses_camel_case() {
        let request: SyncRequest = serde_json::from_str(
            r#"{"rootDirectoryCode":"123","rootDirectoryName":"Fisica I"}"#,
        )
        .unwrap();
        assert_eq!(request, SyncRequest::new("123", "Fisica I"));
    }

    #[test]
    fn test_progress_event_wire_shape() {
        assert_eq!(
            serde_json::to_string(&ProgressEvent::Fetch(350)).unwrap(),
            r#"{"kind":"fetch","value":350}"#
        );
        assert_eq!(
            serde_json::to_string(&ProgressEvent::Perc(0)).unwrap(),
            r#"{"kind":"perc","value":0}"#
        );
        assert_eq!(
            serde_json::to_string(&ProgressEvent::Zip).unwrap(),
            r#"{"kind":"zip"}"#
        );
    }

    #[test]
    fn test_host_command_parses_get_zip_blob() {
        let command: HostCommand = serde_json::from_str(r#"{"cmd":"getZipBlob"}"#).unwrap();
        assert_eq!(command, HostCommand::GetZipBlob);
        assert!(serde_json::from_str::<HostCommand>(r#"{"cmd":"other"}"#).is_err());
    }

    #[test]
    fn test_sync_response_constructors() {
        let reply = SyncResponse::failure("login error (status: 500)");
        assert!(!reply.ok);
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"ok":false,"message":"login error (status: 500)"}"#
        );
    }
}
