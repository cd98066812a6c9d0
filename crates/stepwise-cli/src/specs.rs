//! Spec file discovery

use crate::error::{CliError, CliResult};
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use stepwise::{SpecFile, StepwiseResult};

/// Find spec files matching any `include` glob and no `exclude` glob.
///
/// Relative patterns are resolved against `root`. Exclusions are matched
/// against each path and its directories, both as found and relative to
/// `root`. The result is sorted and free of duplicates.
pub fn discover(root: &Path, include: &[String], exclude: &[String]) -> CliResult<Vec<PathBuf>> {
    let excludes = exclude
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut found = BTreeSet::new();
    for pattern in include {
        let full = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            root.join(pattern)
        };
        let full = full
            .to_str()
            .ok_or_else(|| CliError::discovery(format!("pattern is not UTF-8: {}", full.display())))?
            .to_string();
        let entries = glob::glob(&full)?;
        for path in entries.filter_map(Result::ok) {
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if is_excluded(&excludes, &path, relative) {
                tracing::debug!(path = %path.display(), "excluded spec file");
                continue;
            }
            found.insert(path);
        }
    }
    Ok(found.into_iter().collect())
}

/// A pattern naming a directory excludes everything beneath it, so each
/// directory below the root is tried as well as the file itself.
fn is_excluded(excludes: &[Pattern], path: &Path, relative: &Path) -> bool {
    std::iter::once(path)
        .chain(relative.ancestors())
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| excludes.iter().any(|ex| ex.matches_path(p)))
}

/// Parse every file, keeping each outcome next to its path
#[must_use]
pub fn parse_all(files: &[PathBuf]) -> Vec<(PathBuf, StepwiseResult<SpecFile>)> {
    files
        .iter()
        .map(|path| (path.clone(), SpecFile::load(path)))
        .collect()
}
