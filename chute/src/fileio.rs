//! Path-based entry points and batch processing
//!
//! Wraps the streaming pumps with file handling: special filename tokens for
//! the standard streams, the destination-exists policy, bounded dictionary
//! loading, and multi-file batch runs that share one buffered session.
//!
//! Single-file operations return the first error. Batch operations tally
//! failures per file and keep going, so one unreadable source does not sink
//! the rest of the run; resources never leak between files because every
//! handle is scoped to its own iteration.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::buffered::{CompressSession, DecompressSession};
use crate::compress::CompressOptions;
use crate::{Error, Result, Totals, compress_stream, decompress_stream};

/// Reserved source name selecting the process's standard input.
pub const STDIN_MARK: &str = "stdin";
/// Reserved destination name selecting the process's standard output.
pub const STDOUT_MARK: &str = "stdout";
/// Reserved destination name discarding all output.
pub const NULL_MARK: &str = "null";

/// Largest dictionary portion kept in memory (512 KiB).
pub const MAX_DICT_SIZE: u64 = 512 * 1024;
/// Absolute ceiling above which a dictionary file is rejected outright.
const DICT_SANITY_CEILING: u64 = 1 << 30;

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files processed successfully.
    pub processed: u32,
    /// Files that failed; details were logged, the batch continued.
    pub failed: u32,
    /// Files skipped before processing (wrong suffix).
    pub skipped: u32,
}

fn open_source(name: &str) -> Result<Box<dyn Read>> {
    if name == STDIN_MARK {
        debug!("using stdin for input");
        return Ok(Box::new(std::io::stdin()));
    }
    let path = Path::new(name);
    let file = File::open(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

fn open_destination(name: &str, overwrite: bool) -> Result<Box<dyn Write>> {
    if name == STDOUT_MARK {
        debug!("using stdout for output");
        return Ok(Box::new(std::io::stdout()));
    }
    if name == NULL_MARK {
        return Ok(Box::new(std::io::sink()));
    }
    let path = Path::new(name);
    // Reject before any byte of the destination is touched; there is no
    // interactive prompt, the caller decides by setting `overwrite`.
    if !overwrite && path.exists() {
        return Err(Error::DestinationExists(path.to_path_buf()));
    }
    let file = File::create(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

/// Load a dictionary file, bounded to [`MAX_DICT_SIZE`] bytes.
///
/// Oversized files keep only their trailing portion (the most recent bytes);
/// files beyond the sanity ceiling are rejected. `None` yields an empty
/// dictionary.
pub fn load_dictionary(path: Option<&Path>) -> Result<Vec<u8>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    debug!(path = %path.display(), "loading dictionary");

    let with_path = |source: std::io::Error| Error::File {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(with_path)?;
    let size = file.metadata().map_err(with_path)?.len();

    if size > DICT_SANITY_CEILING {
        return Err(Error::DictionaryTooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    if size > MAX_DICT_SIZE {
        warn!(
            path = %path.display(),
            size,
            kept = MAX_DICT_SIZE,
            "dictionary too large, using trailing bytes only"
        );
        file.seek(SeekFrom::Start(size - MAX_DICT_SIZE))
            .map_err(with_path)?;
    }

    let mut dictionary = Vec::with_capacity(size.min(MAX_DICT_SIZE) as usize);
    file.read_to_end(&mut dictionary).map_err(with_path)?;
    Ok(dictionary)
}

/// Compress one file (or stdin) into one simple-format frame.
pub fn compress_file(
    options: &CompressOptions,
    overwrite: bool,
    src_name: &str,
    dst_name: &str,
) -> Result<Totals> {
    let mut src = open_source(src_name)?;
    let mut dst = open_destination(dst_name, overwrite)?;
    let totals = compress_stream(options, &mut src, &mut dst)?;
    info!(
        src = src_name,
        dst = dst_name,
        bytes_read = totals.bytes_read,
        bytes_written = totals.bytes_written,
        "compressed"
    );
    Ok(totals)
}

/// Decompress one simple-format file (or stdin).
pub fn decompress_file(
    secret: Option<&str>,
    overwrite: bool,
    src_name: &str,
    dst_name: &str,
) -> Result<Totals> {
    let mut src = open_source(src_name)?;
    let mut dst = open_destination(dst_name, overwrite)?;
    let totals = decompress_stream(secret, &mut src, &mut dst)?;
    info!(
        src = src_name,
        dst = dst_name,
        bytes_written = totals.bytes_written,
        "decompressed"
    );
    Ok(totals)
}

/// Compress one file through a shared buffered session.
pub fn compress_file_buffered(
    session: &mut CompressSession,
    overwrite: bool,
    src_name: &str,
    dst_name: &str,
) -> Result<Totals> {
    let mut src = open_source(src_name)?;
    let mut dst = open_destination(dst_name, overwrite)?;
    session.compress(&mut src, &mut dst)
}

/// Decompress one multi-frame buffered file through a shared session.
pub fn decompress_file_buffered(
    session: &mut DecompressSession,
    overwrite: bool,
    src_name: &str,
    dst_name: &str,
) -> Result<Totals> {
    let mut src = open_source(src_name)?;
    let mut dst = open_destination(dst_name, overwrite)?;
    session.decompress(&mut src, &mut dst)
}

/// Compress a batch of files, appending `suffix` to each source name.
///
/// One session (dictionary and staging buffers) serves the whole batch.
/// Failures are logged and tallied; the batch continues.
pub fn compress_many(
    session: &mut CompressSession,
    sources: &[&str],
    suffix: &str,
    overwrite: bool,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for &src_name in sources {
        let dst_name = format!("{src_name}{suffix}");
        match compress_file_buffered(session, overwrite, src_name, &dst_name) {
            Ok(totals) => {
                summary.processed += 1;
                info!(
                    src = src_name,
                    dst = %dst_name,
                    bytes_read = totals.bytes_read,
                    bytes_written = totals.bytes_written,
                    "compressed"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(src = src_name, error = %e, "compression failed");
            }
        }
    }
    summary
}

/// Decompress a batch of files carrying `suffix`, stripping it to form each
/// destination name. Files without the suffix are skipped and counted.
pub fn decompress_many(
    session: &mut DecompressSession,
    sources: &[&str],
    suffix: &str,
    overwrite: bool,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for &src_name in sources {
        let Some(dst_name) = src_name.strip_suffix(suffix).filter(|s| !s.is_empty()) else {
            warn!(
                src = src_name,
                suffix, "file does not carry the expected suffix, skipping"
            );
            summary.skipped += 1;
            continue;
        };
        match decompress_file_buffered(session, overwrite, src_name, dst_name) {
            Ok(totals) => {
                summary.processed += 1;
                info!(
                    src = src_name,
                    dst = dst_name,
                    bytes_written = totals.bytes_written,
                    "decompressed"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(src = src_name, error = %e, "decompression failed");
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffered::DEFAULT_LEVEL;
    use std::fs;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_simple_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 199) as u8).collect();
        let src = write_file(dir.path(), "input.bin", &data);
        let packed = dir.path().join("input.bin.cht").to_string_lossy().into_owned();
        let unpacked = dir.path().join("restored.bin").to_string_lossy().into_owned();

        compress_file(&CompressOptions::default(), false, &src, &packed).unwrap();
        decompress_file(None, false, &packed, &unpacked).unwrap();

        assert_eq!(fs::read(unpacked).unwrap(), data);
    }

    #[test]
    fn test_existing_destination_rejected_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(dir.path(), "input.bin", b"payload payload payload");
        let dst = write_file(dir.path(), "occupied.bin", b"precious");

        let err =
            compress_file(&CompressOptions::default(), false, &src, &dst).unwrap_err();
        assert!(matches!(err, Error::DestinationExists(_)));
        assert_eq!(fs::read(&dst).unwrap(), b"precious");

        // The override flag authorizes the replacement.
        compress_file(&CompressOptions::default(), true, &src, &dst).unwrap();
        assert_ne!(fs::read(&dst).unwrap(), b"precious");
    }

    #[test]
    fn test_null_destination_discards() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(dir.path(), "input.bin", b"going nowhere");
        let totals =
            compress_file(&CompressOptions::default(), false, &src, NULL_MARK).unwrap();
        assert_eq!(totals.bytes_read, 13);
    }

    #[test]
    fn test_load_dictionary_keeps_tail_of_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = vec![0xAAu8; MAX_DICT_SIZE as usize];
        contents.extend_from_slice(&[0xBB; 1000]);
        let path = dir.path().join("dict.bin");
        fs::write(&path, &contents).unwrap();

        let dictionary = load_dictionary(Some(&path)).unwrap();
        assert_eq!(dictionary.len(), MAX_DICT_SIZE as usize);
        // Trailing bytes favored: the tail marker must survive.
        assert_eq!(dictionary[dictionary.len() - 1000..], [0xBB; 1000]);
    }

    #[test]
    fn test_load_dictionary_none_is_empty() {
        assert!(load_dictionary(None).unwrap().is_empty());
    }

    #[test]
    fn test_batch_round_trip_with_suffix_skip() {
        let dir = tempfile::tempdir().unwrap();
        let data_a: Vec<u8> = (0..20_000u32).map(|i| (i % 97) as u8).collect();
        let data_b = b"short file".to_vec();
        let src_a = write_file(dir.path(), "a.bin", &data_a);
        let src_b = write_file(dir.path(), "b.bin", &data_b);

        let mut enc = CompressSession::new(DEFAULT_LEVEL, Vec::new(), None);
        let summary = compress_many(&mut enc, &[&src_a, &src_b], ".cht", false);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 0);

        // Remove the originals so decompression can restore them.
        fs::remove_file(&src_a).unwrap();
        fs::remove_file(&src_b).unwrap();

        let packed_a = format!("{src_a}.cht");
        let packed_b = format!("{src_b}.cht");
        let stray = write_file(dir.path(), "stray.bin", b"not packed");

        let mut dec = DecompressSession::new(Vec::new(), None);
        let summary = decompress_many(&mut dec, &[&packed_a, &packed_b, &stray], ".cht", false);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(fs::read(&src_a).unwrap(), data_a);
        assert_eq!(fs::read(&src_b).unwrap(), data_b);
    }

    #[test]
    fn test_batch_failure_does_not_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(dir.path(), "good.bin", b"fine content");
        let missing = dir.path().join("missing.bin").to_string_lossy().into_owned();

        let mut enc = CompressSession::new(DEFAULT_LEVEL, Vec::new(), None);
        let summary = compress_many(&mut enc, &[&missing, &good], ".cht", false);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
    }
}
