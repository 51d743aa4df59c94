//! Render a whole directory as one text manifest for `insta`.
//! - Includes hidden files and ignored files, so backups show up
//! - Only includes UTF-8 text files (CRLF→LF), ignores binary files
//! - Deterministic path order

use ignore::WalkBuilder;
use std::{fs, path::Path};

/// Manifest of every text file under `root`, each as `=== <path>` followed
/// by its content. Paths whose components appear in `skip` are left out.
pub fn dir_manifest(root: impl AsRef<Path>, skip: &[&str]) -> String {
    let base = fs::canonicalize(root.as_ref()).expect("failed to canonicalize root path");

    let mut wb = WalkBuilder::new(&base);
    wb.standard_filters(false);

    let mut entries: Vec<(String, String)> = Vec::new();

    for dent in wb.build().filter_map(Result::ok) {
        let p = dent.path();
        if p == base || !dent.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let rel = p
            .strip_prefix(&base)
            .expect("path should be within base")
            .to_string_lossy()
            .replace('\\', "/");
        if rel.split('/').any(|component| skip.contains(&component)) {
            continue;
        }

        let buf = fs::read(p).expect("failed to read file");
        // Non-UTF-8 files are ignored
        if let Ok(s) = std::str::from_utf8(&buf) {
            let mut body = s.replace("\r\n", "\n");
            if !body.ends_with('\n') {
                body.push('\n');
            }
            entries.push((rel, body));
        }
    }

    // Stable order
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    for (rel, body) in entries {
        out.push_str(&format!("=== {rel}\n"));
        out.push_str(&body);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_sorted_and_skips_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join(".home")).unwrap();
        fs::write(dir.path().join("b/x.ts"), "x\r\n").unwrap();
        fs::write(dir.path().join("a.ts"), "a").unwrap();
        fs::write(dir.path().join(".home/rc"), "skip me").unwrap();
        fs::write(dir.path().join("bin.dat"), [0xff, 0xfe]).unwrap();

        insta::assert_snapshot!(dir_manifest(dir.path(), &[".home"]), @r"
        === a.ts
        a
        === b/x.ts
        x
        ");
    }
}
