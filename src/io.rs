use std::fmt::Display;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use console::style;

pub fn as_overhead(s: Instant) -> impl Display {
    let elapsed = s.elapsed().as_millis();
    style(format!("(+{elapsed}ms)")).blue()
}

/// Does the pattern contain glob metacharacters?
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Remove everything matched by the given globs. A plain directory path is
/// removed recursively; a pattern removes each matched file. Paths that are
/// already gone are not an error, clean tasks must be idempotent.
pub fn remove_globs(globs: &[String], label: &str) -> std::io::Result<()> {
    let s = Instant::now();

    for pattern in globs {
        let path = Utf8Path::new(pattern);

        if !is_glob(pattern) {
            match fs::metadata(path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
                Ok(_) => fs::remove_file(path)?,
                Err(_) => {}
            }
            continue;
        }

        let matched = match glob::glob(pattern) {
            Ok(matched) => matched,
            Err(_) => continue,
        };

        for entry in matched.flatten() {
            if entry.is_file()
                && let Err(err) = fs::remove_file(&entry)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                return Err(err);
            }
        }
    }

    let list = globs
        .iter()
        .map(|g| format!("    {}", style(g).green()))
        .collect::<Vec<_>>()
        .join("\n");
    tracing::info!("cleaned {label} files {}\n{list}", as_overhead(s));

    Ok(())
}

/// Write `contents` under `dest`, preserving the relative path. Parent
/// directories are created on demand.
pub fn write_output(
    dest: &Utf8Path,
    rel: &Utf8Path,
    contents: &[u8],
) -> std::io::Result<Utf8PathBuf> {
    let path = dest.join(rel);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, contents)?;
    Ok(path)
}
