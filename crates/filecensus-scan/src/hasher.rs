//! BLAKE3 content hashing.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake3::Hasher;

use filecensus_core::{ContentHash, FileHash};

/// Files above this size are memory-mapped instead of read.
const MMAP_THRESHOLD: u64 = 128 * 1024;

/// Hash everything `reader` yields.
pub fn hash_reader<R: Read>(reader: R) -> io::Result<ContentHash> {
    let mut hasher = Hasher::new();
    hasher.update_reader(reader)?;
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Hash a file's full content.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    if file.metadata()?.len() > MMAP_THRESHOLD {
        let mut hasher = Hasher::new();
        hasher.update_mmap(path)?;
        return Ok(ContentHash::new(*hasher.finalize().as_bytes()));
    }
    hash_reader(file)
}

/// Hash a file unless its `length` reaches `limit`, in which case the
/// sentinel is returned without reading.
pub fn hash_with_limit(path: &Path, length: u64, limit: u64) -> io::Result<FileHash> {
    if FileHash::exceeds_limit(length, limit) {
        return Ok(FileHash::TooLarge);
    }
    hash_file(path).map(FileHash::Digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_deterministic() {
        let a = hash_reader(&b"hello world"[..]).unwrap();
        let b = hash_reader(&b"hello world"[..]).unwrap();
        let c = hash_reader(&b"hello worle"[..]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex(), blake3::hash(b"hello world").to_hex().to_ascii_uppercase());
    }

    #[test]
    fn test_small_and_mapped_files_agree_with_reader() {
        let temp = TempDir::new().unwrap();
        let small = temp.path().join("small.bin");
        let large = temp.path().join("large.bin");
        let big: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&small, b"abc").unwrap();
        fs::write(&large, &big).unwrap();

        assert_eq!(hash_file(&small).unwrap(), hash_reader(&b"abc"[..]).unwrap());
        assert_eq!(hash_file(&large).unwrap(), hash_reader(&big[..]).unwrap());
    }

    #[test]
    fn test_limit_boundary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, b"0123456789").unwrap();

        assert!(matches!(hash_with_limit(&path, 10, 11).unwrap(), FileHash::Digest(_)));
        assert_eq!(hash_with_limit(&path, 10, 10).unwrap(), FileHash::TooLarge);
    }

    #[test]
    fn test_sentinel_does_not_touch_the_file() {
        let missing = Path::new("/definitely/not/here");
        assert_eq!(
            hash_with_limit(missing, 2_000_000_000, 2_000_000_000).unwrap(),
            FileHash::TooLarge
        );
        assert!(hash_with_limit(missing, 1_999_999_999, 2_000_000_000).is_err());
    }
}
