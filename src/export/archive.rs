//! Gzip-compressed tar packing and unpacking, plus content checksums.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::Result;

/// Pack a directory's contents into a `.tar.gz`. Entries sit at the archive
/// root, not under the directory's own name. Packing goes through a sibling
/// temp file renamed into place once complete, so a failed pack leaves any
/// existing archive at `archive_path` untouched.
pub fn pack_dir(src_dir: &Path, archive_path: &Path) -> Result<()> {
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging_path = archive_path.with_extension("tmp");
    if let Err(err) = pack_into(src_dir, &staging_path) {
        let _ = std::fs::remove_file(&staging_path);
        return Err(err);
    }
    std::fs::rename(&staging_path, archive_path)?;
    Ok(())
}

fn pack_into(src_dir: &Path, staging_path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(staging_path)?);
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all("", src_dir)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Unpack a `.tar.gz` into a directory, creating it as needed.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    let file = BufReader::new(File::open(archive_path)?);
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.unpack(dest_dir)?;
    Ok(())
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
