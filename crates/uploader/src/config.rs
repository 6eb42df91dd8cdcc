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

use crate::error::{Result, UploadError};
use multiup_checksums::ChecksumAlgorithm;
use std::time::Duration;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Services reject uploads with more than this many parts.
pub const MAX_PARTS_COUNT: u64 = 10_000;
/// Smallest auto-selected chunk size.
pub const MIN_CHUNK_SIZE: u64 = MIB;
/// Largest chunk size any part may have.
pub const MAX_CHUNK_SIZE: u64 = 5 * GIB;

pub const DEFAULT_PARALLEL: usize = 3;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// How the manager obtains an upload id when a session has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadIdPolicy {
    /// Always request a fresh upload id.
    #[default]
    AlwaysNew,
    /// List in-progress uploads for the key and reuse the first match,
    /// falling back to a fresh id.
    ReuseExisting,
}

/// Uploader configuration. Every accepted field is enumerated here with an
/// explicit default; `validate` rejects values the part-size rules cannot
/// satisfy.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Floor for auto-selected chunk sizes, and the chunk size used when
    /// the computed 10k-part bucket is smaller.
    pub default_chunk_size: u64,
    pub upload_id_policy: UploadIdPolicy,
    /// Attempts per storage call, including the first.
    pub max_attempts: u32,
    /// Pause between attempts of one storage call.
    pub retry_delay: Duration,
    /// Max in-flight part uploads per `run_task` call.
    pub default_parallel: usize,
    /// Algorithm used to verify each part against the service-reported
    /// checksum header.
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: MIN_CHUNK_SIZE,
            upload_id_policy: UploadIdPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            default_parallel: DEFAULT_PARALLEL,
            checksum_algorithm: ChecksumAlgorithm::default(),
        }
    }
}

impl UploaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_size < MIN_CHUNK_SIZE {
            return Err(UploadError::InvalidArgument(format!(
                "default_chunk_size {} is below the {} byte minimum",
                self.default_chunk_size, MIN_CHUNK_SIZE
            )));
        }
        if self.default_chunk_size > MAX_CHUNK_SIZE {
            return Err(UploadError::InvalidArgument(format!(
                "default_chunk_size {} exceeds the {} byte maximum",
                self.default_chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.max_attempts == 0 {
            return Err(UploadError::InvalidArgument("max_attempts must be at least 1".to_string()));
        }
        if self.default_parallel == 0 {
            return Err(UploadError::InvalidArgument("default_parallel must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(UploaderConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_attempts() {
        let cfg = UploaderConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(UploadError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_undersized_chunk() {
        let cfg = UploaderConfig {
            default_chunk_size: 1024,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_oversized_chunk() {
        let cfg = UploaderConfig {
            default_chunk_size: MAX_CHUNK_SIZE + 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let cfg = UploaderConfig {
            default_parallel: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
