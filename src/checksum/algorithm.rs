use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [DigestAlgorithm::Md5, DigestAlgorithm::Sha1, DigestAlgorithm::Sha256, DigestAlgorithm::Sha512];

    /// file extension of the sidecar file, without the leading '.'
    pub fn extension(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// length of the hex encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 32,
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }

    pub fn from_extension(extension: &str) -> Option<DigestAlgorithm> {
        DigestAlgorithm::ALL.into_iter()
            .find(|a| a.extension() == extension)
    }

    /// If `path` names a sidecar checksum file, returns the algorithm and the path of the
    ///  artifact it belongs to
    pub fn split_sidecar_path(path: &str) -> Option<(DigestAlgorithm, &str)> {
        let last_dot = path.rfind('.')?;
        let algorithm = DigestAlgorithm::from_extension(&path[last_dot + 1..])?;
        let artifact_path = &path[..last_dot];
        if artifact_path.is_empty() || artifact_path.ends_with('/') {
            return None;
        }
        Some((algorithm, artifact_path))
    }

    pub fn sidecar_path(&self, artifact_path: &str) -> String {
        format!("{}.{}", artifact_path, self.extension())
    }

    pub fn hasher(&self) -> Hasher {
        match self {
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    /// Hex digest of a complete in-memory buffer
    pub fn digest_hex(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }

    /// Sidecar files written by various tools contain more than the bare digest (e.g.
    ///  `sha1sum` output `<digest>  <file name>`). This extracts the digest and checks its shape.
    pub fn parse_sidecar_content(&self, content: &str) -> Option<String> {
        let digest = content.split_whitespace().next()?.to_ascii_lowercase();
        if digest.len() == self.hex_len() && digest.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(digest)
        }
        else {
            None
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "");
        DigestAlgorithm::ALL.into_iter()
            .find(|a| a.extension() == normalized)
            .ok_or_else(|| format!("unsupported digest algorithm {:?}", s))
    }
}

/// One running digest computation
#[derive(Clone)]
pub enum Hasher {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(ctx) => {
                let digest: [u8; 16] = ctx.compute().into();
                hex::encode(digest)
            }
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::md5(DigestAlgorithm::Md5, "902fbdd2b1df0c4f70b4a5d23525e932")]
    #[case::sha1(DigestAlgorithm::Sha1, "3c01bdbb26f358bab27f267924aa2c9a03fcfdb8")]
    #[case::sha256(DigestAlgorithm::Sha256, "b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78")]
    fn test_digest_abc(#[case] algorithm: DigestAlgorithm, #[case] expected: &str) {
        assert_eq!(algorithm.digest_hex(b"ABC"), expected);
    }

    #[test]
    fn test_incremental_equals_one_shot() {
        for algorithm in DigestAlgorithm::ALL {
            let mut hasher = algorithm.hasher();
            hasher.update(b"AB");
            hasher.update(b"C");
            assert_eq!(hasher.finalize_hex(), algorithm.digest_hex(b"ABC"));
        }
    }

    #[rstest]
    #[case::sha1("a/b/lib-1.0.jar.sha1", Some((DigestAlgorithm::Sha1, "a/b/lib-1.0.jar")))]
    #[case::md5("lib.jar.md5", Some((DigestAlgorithm::Md5, "lib.jar")))]
    #[case::sha512("x.nupkg.sha512", Some((DigestAlgorithm::Sha512, "x.nupkg")))]
    #[case::not_checksum("a/b/lib-1.0.jar", None)]
    #[case::bare_extension(".sha1", None)]
    #[case::directory_only("a/.sha1", None)]
    fn test_split_sidecar_path(#[case] path: &str, #[case] expected: Option<(DigestAlgorithm, &str)>) {
        assert_eq!(DigestAlgorithm::split_sidecar_path(path), expected);
    }

    #[rstest]
    #[case::bare("3c01bdbb26f358bab27f267924aa2c9a03fcfdb8", Some("3c01bdbb26f358bab27f267924aa2c9a03fcfdb8"))]
    #[case::sha1sum_output("3C01BDBB26F358BAB27F267924AA2C9A03FCFDB8  lib-1.0.jar\n", Some("3c01bdbb26f358bab27f267924aa2c9a03fcfdb8"))]
    #[case::too_short("3c01bd", None)]
    #[case::not_hex("zz01bdbb26f358bab27f267924aa2c9a03fcfdb8", None)]
    #[case::empty("", None)]
    fn test_parse_sidecar_content(#[case] content: &str, #[case] expected: Option<&str>) {
        assert_eq!(DigestAlgorithm::Sha1.parse_sidecar_content(content), expected.map(|s| s.to_string()));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("SHA-1".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha1);
        assert_eq!("sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }
}
