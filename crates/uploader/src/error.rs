// Copyright 2025 Multiup Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use http::HeaderMap;
use thiserror::Error;

/// Error code the storage service uses when an upload id has expired or
/// was never created. Seeing it means the cached session is stale.
pub const NO_SUCH_UPLOAD: &str = "NoSuchUpload";

/// Failure reported by the consumed object-storage collaborator.
///
/// `code` and `status` are whatever the service returned; both drive
/// control flow (`NoSuchUpload` purges the session, 403 aborts the part
/// batch) and are otherwise opaque.
#[derive(Debug, Clone, Error)]
#[error("service error: {message} (code={code:?}, status={status:?})")]
pub struct ServiceError {
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_no_such_upload(&self) -> bool {
        self.code.as_deref() == Some(NO_SUCH_UPLOAD)
    }

    pub fn is_access_denied(&self) -> bool {
        self.status == Some(403)
    }
}

/// One failed part inside an aggregate part-phase failure.
#[derive(Debug, Error)]
#[error("part {part_number}: {source}")]
pub struct PartError {
    pub part_number: u32,
    pub source: UploadError,
}

/// Errors surfaced by the upload manager.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The service acknowledged the part but reported a different checksum
    /// than the one computed over the outgoing bytes. The part's recorded
    /// ETag has been cleared, so the caller's next attempt re-uploads it.
    #[error("checksum mismatch on part {part_number}: computed {computed}, service reported {reported}")]
    ChecksumMismatch {
        part_number: u32,
        computed: String,
        reported: String,
        headers: HeaderMap,
    },

    /// Aggregate of every part that failed during the upload phase. The
    /// 403 fast-abort also uses this shape, with a single entry.
    #[error("{} part upload(s) failed, first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    PartsFailed(Vec<PartError>),

    /// Session state does not allow the requested step, e.g. completion
    /// attempted while parts are missing or unverified.
    #[error("invalid upload state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// True when this error, or any aggregated part error, identifies a
    /// dead upload id. The manager purges the cached session on it.
    pub fn is_no_such_upload(&self) -> bool {
        match self {
            UploadError::Service(err) => err.is_no_such_upload(),
            UploadError::PartsFailed(parts) => parts.iter().any(|p| p.source.is_no_such_upload()),
            _ => false,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        match self {
            UploadError::Service(err) => err.is_access_denied(),
            UploadError::PartsFailed(parts) => parts.iter().any(|p| p.source.is_access_denied()),
            _ => false,
        }
    }
}

/// A specialized Result type for upload operations.
pub type Result<T, E = UploadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_predicates() {
        let err = ServiceError::new("upload gone").with_code(NO_SUCH_UPLOAD);
        assert!(err.is_no_such_upload());
        assert!(!err.is_access_denied());

        let err = ServiceError::new("denied").with_status(403);
        assert!(err.is_access_denied());
        assert!(!err.is_no_such_upload());
    }

    #[test]
    fn aggregate_propagates_predicates() {
        let inner = UploadError::Service(ServiceError::new("gone").with_code(NO_SUCH_UPLOAD));
        let agg = UploadError::PartsFailed(vec![PartError {
            part_number: 4,
            source: inner,
        }]);
        assert!(agg.is_no_such_upload());
        assert!(!agg.is_access_denied());
    }

    #[test]
    fn checksum_mismatch_is_neither() {
        let err = UploadError::ChecksumMismatch {
            part_number: 1,
            computed: "AAAA".into(),
            reported: "BBBB".into(),
            headers: HeaderMap::new(),
        };
        assert!(!err.is_no_such_upload());
        assert!(!err.is_access_denied());
    }
}
