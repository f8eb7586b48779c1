//! Gzip compression, integrity checks and detection.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compresses `src` into `dest`, truncating any existing `dest`.
/// Returns the compressed size.
pub fn compress(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(dest)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    io::Write::flush(&mut writer)?;
    Ok(std::fs::metadata(dest)?.len())
}

/// Decodes the whole archive without keeping the output, returning the
/// uncompressed length. Truncated or corrupt archives fail.
pub fn verify(path: &Path) -> io::Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    io::copy(&mut decoder, &mut io::sink())
}

/// Decompresses `src` into `dest`, returning the uncompressed length.
pub fn decompress(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
    let mut writer = BufWriter::new(File::create(dest)?);
    let written = io::copy(&mut decoder, &mut writer)?;
    io::Write::flush(&mut writer)?;
    Ok(written)
}

/// True when the file starts with the gzip magic bytes.
pub fn is_gzip(path: &Path) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
