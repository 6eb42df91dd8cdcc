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

//! Mapping between checksum values and the `x-amz-checksum-*` header
//! representation the storage service reports per uploaded part.

use crate::base64;
use http::header::{HeaderMap, HeaderValue};

use crate::Checksum;

pub const CRC_32_HEADER_NAME: &str = "x-amz-checksum-crc32";
pub const CRC_32_C_HEADER_NAME: &str = "x-amz-checksum-crc32c";
pub const CRC_64_NVME_HEADER_NAME: &str = "x-amz-checksum-crc64nvme";

/// A checksum that knows its wire representation: base64 value under a
/// fixed `x-amz-checksum-*` header name.
pub trait HttpChecksum: Checksum + Send + Sync {
    fn header_name(&self) -> &'static str;

    /// Consume the hasher and render the digest the way the service does:
    /// standard base64 over the big-endian digest bytes.
    fn base64_value(self: Box<Self>) -> String {
        base64::encode(&self.finalize()[..])
    }

    fn header_value(self: Box<Self>) -> HeaderValue {
        HeaderValue::from_str(&self.base64_value()).expect("base64 encoded bytes are always valid header values")
    }

    fn headers(self: Box<Self>) -> HeaderMap<HeaderValue> {
        let name = self.header_name();
        let mut header_map = HeaderMap::new();
        header_map.insert(name, self.header_value());
        header_map
    }
}

impl HttpChecksum for crate::Crc32 {
    fn header_name(&self) -> &'static str {
        CRC_32_HEADER_NAME
    }
}

impl HttpChecksum for crate::Crc32c {
    fn header_name(&self) -> &'static str {
        CRC_32_C_HEADER_NAME
    }
}

impl HttpChecksum for crate::Crc64Nvme {
    fn header_name(&self) -> &'static str {
        CRC_64_NVME_HEADER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::HttpChecksum;
    use crate::base64;
    use crate::{CRC_32_NAME, CRC_64_NVME_NAME, ChecksumAlgorithm};
    use bytes::Bytes;

    #[test]
    fn empty_crc32_value_is_zeroes() {
        let checksum = CRC_32_NAME.parse::<ChecksumAlgorithm>().unwrap().into_impl();
        let expected = base64::encode(&Bytes::from_static(b"\0\0\0\0"));
        assert_eq!(expected, checksum.header_value());
    }

    #[test]
    fn empty_crc64nvme_value_is_zeroes() {
        let checksum = CRC_64_NVME_NAME.parse::<ChecksumAlgorithm>().unwrap().into_impl();
        let expected = base64::encode(&Bytes::from_static(b"\0\0\0\0\0\0\0\0"));
        assert_eq!(expected, checksum.header_value());
    }

    #[test]
    fn crc64nvme_header_name_matches_algorithm() {
        let checksum = ChecksumAlgorithm::Crc64Nvme.into_impl();
        assert_eq!(checksum.header_name(), ChecksumAlgorithm::Crc64Nvme.header_name());
        assert_eq!(checksum.header_name(), "x-amz-checksum-crc64nvme");
    }

    #[test]
    fn headers_hold_single_entry() {
        let mut checksum = ChecksumAlgorithm::Crc64Nvme.into_impl();
        checksum.update(b"123456789");
        let headers = checksum.headers();
        assert_eq!(headers.len(), 1);
        let value = headers.get(super::CRC_64_NVME_HEADER_NAME).unwrap();
        assert_eq!(value, &base64::encode(0xae8b14860a799888u64.to_be_bytes()));
    }
}
