use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha512};

use crate::core::mods::model::Checksum;

/// Incremental hasher fed chunk by chunk while a body streams to disk.
pub enum StreamingHasher {
    Sha1(Sha1),
    Sha512(Sha512),
    Md5(Md5),
}

impl StreamingHasher {
    pub fn for_checksum(checksum: &Checksum) -> Self {
        match checksum {
            Checksum::Sha1(_) => StreamingHasher::Sha1(Sha1::new()),
            Checksum::Sha512(_) => StreamingHasher::Sha512(Sha512::new()),
            Checksum::Md5(_) => StreamingHasher::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Sha1(h) => h.update(data),
            StreamingHasher::Sha512(h) => h.update(data),
            StreamingHasher::Md5(h) => h.update(data),
        }
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha512(h) => hex::encode(h.finalize()),
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_digest_matches_one_shot() {
        let mut hasher = StreamingHasher::for_checksum(&Checksum::Sha1(String::new()));
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(
            hasher.finalize_hex(),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn md5_of_empty_input() {
        let hasher = StreamingHasher::for_checksum(&Checksum::Md5(String::new()));
        assert_eq!(hasher.finalize_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
