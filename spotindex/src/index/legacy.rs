//! Legacy merged listing file.
//!
//! Older installations kept a single plain-text listing of every image file
//! instead of per-source snapshots:
//!
//! ```text
//! C:\spotbillfiles\backup\image|01012024AB123456123456789.jpg
//! \\server\share\images|01012024CD123456123456789.jpg
//! ```
//!
//! A full reindex can keep regenerating this file for tools that still read
//! it, and [`read_listing`] turns an existing one back into per-source
//! indices so it can seed the snapshot cache.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::filename::parse_image_filename;
use crate::persist::write_atomic;
use crate::source::normalize_root;

use super::scanner::SourceListing;
use super::types::SourceIndex;

const SEPARATOR: char = '|';

/// Write the listing for a set of scanned sources, replacing the old file.
pub fn write_listing(path: &Path, listings: &[SourceListing]) -> IndexResult<usize> {
    let mut lines = 0usize;

    write_atomic(path, |writer| {
        for listing in listings {
            let root = listing.source().root().display().to_string();
            for name in listing.names() {
                writeln!(writer, "{}{}{}", root, SEPARATOR, name)?;
                lines += 1;
            }
        }
        Ok(())
    })
    .map_err(|e| IndexError::io(path, e))?;

    info!(path = %path.display(), lines, "Wrote legacy listing");
    Ok(lines)
}

/// Read a listing into one index per source root.
///
/// Lines without a separator and names that don't parse are skipped.
pub fn read_listing(path: &Path) -> IndexResult<BTreeMap<PathBuf, SourceIndex>> {
    let file = std::fs::File::open(path).map_err(|e| IndexError::io(path, e))?;
    let mut indices: BTreeMap<PathBuf, SourceIndex> = BTreeMap::new();
    let mut skipped = 0usize;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| IndexError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((root, name)) = line.rsplit_once(SEPARATOR) else {
            skipped += 1;
            continue;
        };
        let Some(parsed) = parse_image_filename(name) else {
            skipped += 1;
            continue;
        };

        let root = normalize_root(Path::new(root));
        let full_path = root.join(name);
        indices
            .entry(root.clone())
            .or_insert_with(|| SourceIndex::new(root))
            .insert(parsed, full_path);
    }

    debug!(
        path = %path.display(),
        sources = indices.len(),
        skipped,
        "Read legacy listing"
    );
    Ok(indices)
}
