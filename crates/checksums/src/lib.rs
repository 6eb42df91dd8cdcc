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

//! Checksum primitives used to verify multipart upload parts end-to-end.
//!
//! Every part body is hashed locally while it streams out and compared
//! against the value the storage service reports back in an
//! `x-amz-checksum-*` response header. CRC-64/NVME is the default; the
//! CRC-32 family is available for services that only echo 32-bit sums.

use crate::error::UnknownChecksumAlgorithmError;

use bytes::Bytes;
use std::{fmt::Debug, str::FromStr};

mod base64;
pub mod error;
pub mod http;

pub const CRC_32_NAME: &str = "crc32";
pub const CRC_32_C_NAME: &str = "crc32c";
pub const CRC_64_NVME_NAME: &str = "crc64nvme";

/// Incremental checksum over a byte stream. `finalize` consumes the hasher
/// and yields the big-endian digest bytes.
pub trait Checksum: Send + Sync {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self: Box<Self>) -> Bytes;
    fn size(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ChecksumAlgorithm {
    Crc32,
    Crc32c,
    #[default]
    Crc64Nvme,
}

impl FromStr for ChecksumAlgorithm {
    type Err = UnknownChecksumAlgorithmError;

    fn from_str(checksum_algorithm: &str) -> Result<Self, Self::Err> {
        if checksum_algorithm.eq_ignore_ascii_case(CRC_32_NAME) {
            Ok(Self::Crc32)
        } else if checksum_algorithm.eq_ignore_ascii_case(CRC_32_C_NAME) {
            Ok(Self::Crc32c)
        } else if checksum_algorithm.eq_ignore_ascii_case(CRC_64_NVME_NAME) {
            Ok(Self::Crc64Nvme)
        } else {
            Err(UnknownChecksumAlgorithmError::new(checksum_algorithm))
        }
    }
}

impl ChecksumAlgorithm {
    pub fn into_impl(self) -> Box<dyn http::HttpChecksum> {
        match self {
            Self::Crc32 => Box::<Crc32>::default(),
            Self::Crc32c => Box::<Crc32c>::default(),
            Self::Crc64Nvme => Box::<Crc64Nvme>::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => CRC_32_NAME,
            Self::Crc32c => CRC_32_C_NAME,
            Self::Crc64Nvme => CRC_64_NVME_NAME,
        }
    }

    /// Name of the response header carrying this algorithm's value.
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::Crc32 => http::CRC_32_HEADER_NAME,
            Self::Crc32c => http::CRC_32_C_HEADER_NAME,
            Self::Crc64Nvme => http::CRC_64_NVME_HEADER_NAME,
        }
    }
}

#[derive(Debug)]
struct Crc32 {
    hasher: crc_fast::Digest,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self {
            hasher: crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32IsoHdlc),
        }
    }
}

impl Checksum for Crc32 {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Bytes {
        let checksum = self.hasher.finalize() as u32;
        Bytes::copy_from_slice(checksum.to_be_bytes().as_slice())
    }

    fn size(&self) -> u64 {
        4
    }
}

#[derive(Debug)]
struct Crc32c {
    hasher: crc_fast::Digest,
}

impl Default for Crc32c {
    fn default() -> Self {
        Self {
            hasher: crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32Iscsi),
        }
    }
}

impl Checksum for Crc32c {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Bytes {
        let checksum = self.hasher.finalize() as u32;
        Bytes::copy_from_slice(checksum.to_be_bytes().as_slice())
    }

    fn size(&self) -> u64 {
        4
    }
}

#[derive(Debug)]
struct Crc64Nvme {
    hasher: crc_fast::Digest,
}

impl Default for Crc64Nvme {
    fn default() -> Self {
        Self {
            hasher: crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc64Nvme),
        }
    }
}

impl Checksum for Crc64Nvme {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Bytes {
        Bytes::copy_from_slice(self.hasher.finalize().to_be_bytes().as_slice())
    }

    fn size(&self) -> u64 {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Catalogue check values for the ASCII string "123456789".
    const CHECK_INPUT: &[u8] = b"123456789";

    #[test]
    fn crc32_check_value() {
        let mut hasher: Box<dyn Checksum> = Box::<Crc32>::default();
        hasher.update(CHECK_INPUT);
        assert_eq!(hasher.finalize().as_ref(), 0xcbf43926u32.to_be_bytes());
    }

    #[test]
    fn crc32c_check_value() {
        let mut hasher: Box<dyn Checksum> = Box::<Crc32c>::default();
        hasher.update(CHECK_INPUT);
        assert_eq!(hasher.finalize().as_ref(), 0xe3069283u32.to_be_bytes());
    }

    #[test]
    fn crc64nvme_check_value() {
        let mut hasher: Box<dyn Checksum> = Box::<Crc64Nvme>::default();
        hasher.update(CHECK_INPUT);
        assert_eq!(hasher.finalize().as_ref(), 0xae8b14860a799888u64.to_be_bytes());
    }

    #[test]
    fn crc64nvme_incremental_matches_one_shot() {
        let mut split: Box<dyn Checksum> = Box::<Crc64Nvme>::default();
        split.update(b"1234");
        split.update(b"56789");

        let mut whole: Box<dyn Checksum> = Box::<Crc64Nvme>::default();
        whole.update(CHECK_INPUT);

        assert_eq!(split.finalize(), whole.finalize());
    }

    #[test]
    fn algorithm_round_trips_through_names() {
        for algo in [ChecksumAlgorithm::Crc32, ChecksumAlgorithm::Crc32c, ChecksumAlgorithm::Crc64Nvme] {
            assert_eq!(algo.as_str().parse::<ChecksumAlgorithm>().unwrap(), algo);
        }
        assert!("sha999".parse::<ChecksumAlgorithm>().is_err());
    }

    #[test]
    fn default_algorithm_is_crc64nvme() {
        assert_eq!(ChecksumAlgorithm::default(), ChecksumAlgorithm::Crc64Nvme);
    }
}
