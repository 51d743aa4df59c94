//! Runs the rewriter over a source tree.
//!
//! Files are independent: each one is read, classified and rewritten on the
//! rayon pool, and the per-file outcomes are merged in path order afterwards.
//! In apply mode a file that changed gets its backup written first and is
//! then replaced atomically, so an interrupted run leaves every file either
//! untouched or fully rewritten.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use rayon::prelude::*;
use similar::TextDiff;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::classify::Classifier;
use crate::rewrite::{RewriteOptions, RewriteReport, canonicalize};

pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx"];

pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".next",
    ".git",
    "dist",
    "build",
    ".vercel",
    "vendor",
];

pub const DEFAULT_BACKUP_SUFFIX: &str = ".relfix.bak";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Source root {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("Source root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Invalid backup location: {0}")]
    InvalidBackup(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    DryRun,
    Apply,
}

/// Where the original of a rewritten file is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupPolicy {
    /// `<file><suffix>` next to the file.
    Sibling { suffix: String },
    /// The tree mirrored under a dedicated directory.
    Directory { dir: PathBuf },
}

impl Default for BackupPolicy {
    fn default() -> Self {
        BackupPolicy::Sibling {
            suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
        }
    }
}

impl BackupPolicy {
    /// Backup location for `file`, a path under `root`.
    pub fn backup_path(&self, root: &Path, file: &Path) -> PathBuf {
        match self {
            BackupPolicy::Sibling { suffix } => {
                let mut name = file.as_os_str().to_owned();
                name.push(suffix);
                PathBuf::from(name)
            }
            BackupPolicy::Directory { dir } => {
                dir.join(file.strip_prefix(root).unwrap_or(file))
            }
        }
    }

    /// Reject policies under which a backup could land on a source file.
    pub fn validate(&self, root: &Path) -> Result<(), BatchError> {
        match self {
            BackupPolicy::Sibling { suffix } if suffix.is_empty() => Err(BatchError::InvalidBackup(
                "backup suffix must not be empty".to_string(),
            )),
            BackupPolicy::Directory { dir } if normalize(root).starts_with(normalize(dir)) => {
                Err(BatchError::InvalidBackup(format!(
                    "backup directory {} is the source root or one of its parents",
                    dir.display()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    /// Directory names pruned from the walk.
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
    pub mode: Mode,
    pub backup: BackupPolicy,
    pub rewrite: RewriteOptions,
    /// Render a unified diff for each changed file.
    pub diff: bool,
}

impl BatchOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            respect_gitignore: true,
            mode: Mode::DryRun,
            backup: BackupPolicy::default(),
            rewrite: RewriteOptions::default(),
            diff: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub report: RewriteReport,
    /// Rewritten content differs from the original.
    pub changed: bool,
    /// The new content was written to disk.
    pub written: bool,
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Error)]
#[error("{}: {}", .path.display(), .message)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

impl FileError {
    fn new(path: &Path, message: impl std::fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub files_scanned: usize,
    pub files_changed: usize,
    /// Files not processed because the run was cancelled.
    pub files_skipped: usize,
    pub query_block_fixes: usize,
    pub access_fixes: usize,
    pub changed_lines: usize,
    pub totals: RewriteReport,
    pub errors: Vec<FileError>,
    /// Outcomes for files with at least one candidate span, in path order.
    pub files: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn total_fixes(&self) -> usize {
        self.query_block_fixes + self.access_fixes
    }

    pub fn cancelled(&self) -> bool {
        self.files_skipped > 0
    }

    /// Changed files ordered by descending fix count, then path.
    pub fn top_files(&self, limit: usize) -> Vec<&FileOutcome> {
        let mut files: Vec<_> = self.files.iter().filter(|f| f.changed).collect();
        files.sort_by(|a, b| {
            b.report
                .total_fixes()
                .cmp(&a.report.total_fixes())
                .then_with(|| a.path.cmp(&b.path))
        });
        files.truncate(limit);
        files
    }

    fn record(&mut self, outcome: FileOutcome) {
        self.files_scanned += 1;
        if outcome.changed {
            self.files_changed += 1;
        }
        self.query_block_fixes += outcome.report.query_block_fixes;
        self.access_fixes += outcome.report.access_fixes;
        self.changed_lines += outcome.report.changed_lines;
        self.totals.merge(&outcome.report);
        self.totals.review.extend(outcome.report.review.iter().cloned());
        if outcome.report.total_fixes() > 0 || !outcome.report.review.is_empty() {
            self.files.push(outcome);
        }
    }
}

fn check_root(root: &Path) -> Result<(), BatchError> {
    if !root.exists() {
        return Err(BatchError::MissingRoot(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(BatchError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

fn excluded_dir(entry: &ignore::DirEntry, exclude: &[String]) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| exclude.iter().any(|e| e == name))
}

/// Source files under `options.root`, sorted for deterministic output.
pub fn collect_source_files(options: &BatchOptions) -> Result<Vec<PathBuf>, BatchError> {
    check_root(&options.root)?;

    let exclude = options.exclude.clone();
    let backup_dir = match &options.backup {
        BackupPolicy::Directory { dir } => Some(dir.clone()),
        BackupPolicy::Sibling { .. } => None,
    };

    let mut builder = WalkBuilder::new(&options.root);
    builder
        .hidden(true)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .ignore(options.respect_gitignore)
        .parents(options.respect_gitignore)
        .require_git(false)
        .filter_entry(move |entry| {
            if excluded_dir(entry, &exclude) {
                return false;
            }
            backup_dir.as_deref().is_none_or(|dir| !entry.path().starts_with(dir))
        });

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable path: {err}");
                continue;
            }
        };
        let path = entry.path();
        let selected = entry.file_type().is_some_and(|ft| ft.is_file())
            && path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| options.extensions.iter().any(|e| e == ext));
        if selected {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    debug!("Found {} source files under {}", files.len(), options.root.display());
    Ok(files)
}

enum Processed {
    Done(FileOutcome),
    Failed(FileError),
    Skipped,
}

/// Rewrite `files`. Per-file failures are collected, never propagated.
///
/// `cancel` is checked before each file; files not yet started when it is
/// set are counted as skipped.
pub fn run_batch(
    files: &[PathBuf],
    classifier: &Classifier,
    options: &BatchOptions,
    cancel: &AtomicBool,
) -> BatchSummary {
    info!(
        "Processing {} files ({})",
        files.len(),
        match options.mode {
            Mode::DryRun => "dry run",
            Mode::Apply => "apply",
        }
    );

    let processed: Vec<Processed> = files
        .par_iter()
        .map(|path| {
            if cancel.load(Ordering::SeqCst) {
                return Processed::Skipped;
            }
            match process_file(path, classifier, options) {
                Ok(outcome) => Processed::Done(outcome),
                Err(err) => Processed::Failed(err),
            }
        })
        .collect();

    let mut summary = BatchSummary::default();
    for item in processed {
        match item {
            Processed::Done(outcome) => summary.record(outcome),
            Processed::Failed(err) => {
                warn!("{err}");
                summary.errors.push(err);
            }
            Processed::Skipped => summary.files_skipped += 1,
        }
    }
    summary
}

/// Collect and rewrite every source file under `options.root`.
pub fn run(
    classifier: &Classifier,
    options: &BatchOptions,
    cancel: &AtomicBool,
) -> Result<BatchSummary, BatchError> {
    options.backup.validate(&options.root)?;
    let files = collect_source_files(options)?;
    Ok(run_batch(&files, classifier, options, cancel))
}

fn process_file(
    path: &Path,
    classifier: &Classifier,
    options: &BatchOptions,
) -> Result<FileOutcome, FileError> {
    let source = std::fs::read_to_string(path).map_err(|e| FileError::new(path, e))?;
    let result = canonicalize(&source, classifier, options.rewrite);
    let changed = result.changed(&source);

    let diff = (options.diff && changed).then(|| {
        let display = path.strip_prefix(&options.root).unwrap_or(path).display();
        TextDiff::from_lines(source.as_str(), result.text.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&format!("old/{display}"), &format!("new/{display}"))
            .to_string()
    });

    let mut written = false;
    if changed && options.mode == Mode::Apply {
        let backup = options.backup.backup_path(&options.root, path);
        replace_with_backup(path, &backup, &source, &result.text)?;
        written = true;
        debug!("Rewrote {} (backup {})", path.display(), backup.display());
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        report: result.report,
        changed,
        written,
        diff,
    })
}

/// Write `original` to `backup`, then `rewritten` to `path`. The source is
/// only touched once its backup is on disk.
fn replace_with_backup(
    path: &Path,
    backup: &Path,
    original: &str,
    rewritten: &str,
) -> Result<(), FileError> {
    if backup == path {
        return Err(FileError::new(path, "backup location is the file itself"));
    }
    write_atomic(backup, original.as_bytes()).map_err(|e| {
        FileError::new(path, format!("failed to write backup {}: {e}", backup.display()))
    })?;
    write_atomic(path, rewritten.as_bytes())
        .map_err(|e| FileError::new(path, format!("failed to write: {e}")))
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(contents)?;
            f.flush()
        })
        .map_err(|err| std::io::Error::other(err.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    /// Source files put back, in path order.
    pub restored: Vec<PathBuf>,
    pub errors: Vec<FileError>,
}

/// Move every backup under `options.root` back over its source file.
///
/// Only backups of files with one of `options.extensions` are considered.
pub fn restore(options: &BatchOptions) -> Result<RestoreSummary, BatchError> {
    let root = options.root.as_path();
    let backup = &options.backup;
    check_root(root)?;
    backup.validate(root)?;

    let search_root = match backup {
        BackupPolicy::Sibling { .. } => root.to_path_buf(),
        BackupPolicy::Directory { dir } => {
            if !dir.is_dir() {
                info!("No backup directory at {}", dir.display());
                return Ok(RestoreSummary::default());
            }
            dir.clone()
        }
    };

    // Backups are commonly gitignored, so the walk ignores ignore files.
    let exclude = options.exclude.clone();
    let mut builder = WalkBuilder::new(&search_root);
    builder
        .standard_filters(false)
        .filter_entry(move |entry| !excluded_dir(entry, &exclude));

    let mut pairs = Vec::new();
    for entry in builder.build().filter_map(Result::ok) {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let target = match backup {
            BackupPolicy::Sibling { suffix } => path
                .to_str()
                .and_then(|p| p.strip_suffix(suffix.as_str()))
                .map(PathBuf::from),
            BackupPolicy::Directory { dir } => path.strip_prefix(dir).ok().map(|rel| root.join(rel)),
        };
        let source_file = |target: &PathBuf| {
            target
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| options.extensions.iter().any(|e| e == ext))
        };
        if let Some(target) = target.filter(source_file) {
            pairs.push((path.to_path_buf(), target));
        }
    }
    pairs.sort();

    let mut summary = RestoreSummary::default();
    for (backup_path, target) in pairs {
        let result = std::fs::read(&backup_path)
            .and_then(|bytes| write_atomic(&target, &bytes))
            .and_then(|()| std::fs::remove_file(&backup_path));
        match result {
            Ok(()) => {
                debug!("Restored {} from {}", target.display(), backup_path.display());
                summary.restored.push(target);
            }
            Err(err) => {
                let err = FileError::new(&target, format!("failed to restore: {err}"));
                warn!("{err}");
                summary.errors.push(err);
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ContextRules;
    use crate::corrections::CorrectionSet;
    use crate::index::CanonicalIndex;
    use crate::schema::parse_schema;
    use std::fs;

    const SCHEMA: &str = "model Booking {\n  Club  Club  @relation(fields: [clubId])\n  Court Court @relation(fields: [courtId])\n}\nmodel Club {\n  id String @id\n}\nmodel Court {\n  id String @id\n}\n";

    const PAGE: &str = "const r = await db.booking.findFirst({ include: { club: true, court: true } });\nconsole.log(r.club.name);\nawait prisma.club.create({ data });\n";

    struct Fixture {
        rules: ContextRules,
        index: CanonicalIndex,
        corrections: CorrectionSet,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let index = CanonicalIndex::build(&parse_schema(SCHEMA));
            let corrections = index.schema_corrections();
            let dir = tempfile::tempdir().unwrap();
            for (rel, contents) in [
                ("app/page.tsx", PAGE),
                ("lib/util.ts", "export const club = 1;\n"),
                ("lib/notes.md", "include: { club: true }\n"),
                ("node_modules/pkg/index.ts", "include: { club: true }\n"),
            ] {
                let path = dir.path().join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, contents).unwrap();
            }
            Self {
                rules: ContextRules::default(),
                index,
                corrections,
                dir,
            }
        }

        fn options(&self, mode: Mode) -> BatchOptions {
            BatchOptions {
                mode,
                ..BatchOptions::new(self.dir.path())
            }
        }

        fn run(&self, options: &BatchOptions) -> BatchSummary {
            let classifier = Classifier::new(&self.rules, &self.corrections, &self.index);
            run(&classifier, options, &AtomicBool::new(false)).unwrap()
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.dir.path().join(rel)).unwrap()
        }
    }

    #[test]
    fn collects_sorted_sources_and_prunes_excludes() {
        let f = Fixture::new();
        let files = collect_source_files(&f.options(Mode::DryRun)).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(f.dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(rel, vec![PathBuf::from("app/page.tsx"), PathBuf::from("lib/util.ts")]);
    }

    #[test]
    fn dry_run_leaves_tree_unchanged() {
        let f = Fixture::new();
        let summary = f.run(&BatchOptions {
            diff: true,
            ..f.options(Mode::DryRun)
        });

        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.files_changed, 1);
        assert_eq!(summary.query_block_fixes, 2);
        assert_eq!(summary.access_fixes, 1);
        assert_eq!(summary.changed_lines, 2);
        assert_eq!(f.read("app/page.tsx"), PAGE);
        assert!(!f.dir.path().join("app/page.tsx.relfix.bak").exists());

        let diff = summary.files[0].diff.as_deref().unwrap();
        assert!(diff.contains("+console.log(r.Club.name);"));
        assert!(diff.contains("--- old/app/page.tsx"));
    }

    #[test]
    fn apply_writes_backups_and_restore_round_trips() {
        let f = Fixture::new();
        let summary = f.run(&f.options(Mode::Apply));
        assert_eq!(summary.files_changed, 1);
        assert!(summary.files[0].written);

        assert_eq!(
            f.read("app/page.tsx"),
            "const r = await db.booking.findFirst({ include: { Club: true, Court: true } });\nconsole.log(r.Club.name);\nawait prisma.club.create({ data });\n"
        );
        assert_eq!(f.read("app/page.tsx.relfix.bak"), PAGE);
        assert!(!f.dir.path().join("lib/util.ts.relfix.bak").exists());

        // A second run has nothing left to fix.
        let again = f.run(&f.options(Mode::Apply));
        assert_eq!(again.files_changed, 0);
        assert_eq!(f.read("app/page.tsx.relfix.bak"), PAGE);

        let restored = restore(&f.options(Mode::Apply)).unwrap();
        assert_eq!(restored.restored, vec![f.dir.path().join("app/page.tsx")]);
        assert!(restored.errors.is_empty());
        assert_eq!(f.read("app/page.tsx"), PAGE);
        assert!(!f.dir.path().join("app/page.tsx.relfix.bak").exists());
    }

    #[test]
    fn backup_directory_mirrors_the_tree() {
        let f = Fixture::new();
        let backups = f.dir.path().join(".relfix-backups");
        let policy = BackupPolicy::Directory { dir: backups.clone() };
        let options = BatchOptions {
            backup: policy,
            ..f.options(Mode::Apply)
        };
        f.run(&options);
        assert_eq!(fs::read_to_string(backups.join("app/page.tsx")).unwrap(), PAGE);

        restore(&options).unwrap();
        assert_eq!(f.read("app/page.tsx"), PAGE);
    }

    #[test]
    fn backup_locations_overlapping_sources_are_rejected() {
        let f = Fixture::new();
        let root = f.dir.path();
        let degenerate = [
            BackupPolicy::Sibling { suffix: String::new() },
            BackupPolicy::Directory { dir: root.to_path_buf() },
            BackupPolicy::Directory { dir: root.join("app/..") },
            BackupPolicy::Directory { dir: root.join("..") },
        ];

        for policy in degenerate {
            let options = BatchOptions {
                backup: policy.clone(),
                ..f.options(Mode::Apply)
            };
            let classifier = Classifier::new(&f.rules, &f.corrections, &f.index);
            assert!(
                matches!(
                    run(&classifier, &options, &AtomicBool::new(false)),
                    Err(BatchError::InvalidBackup(_))
                ),
                "{policy:?}"
            );
            assert!(matches!(restore(&options), Err(BatchError::InvalidBackup(_))), "{policy:?}");
        }

        assert_eq!(f.read("app/page.tsx"), PAGE);
        assert_eq!(f.read("lib/notes.md"), "include: { club: true }\n");
        assert!(BackupPolicy::Directory { dir: root.join(".relfix-backups") }.validate(root).is_ok());
    }

    #[test]
    fn backup_onto_the_source_is_a_file_error() {
        let f = Fixture::new();
        let options = BatchOptions {
            backup: BackupPolicy::Sibling { suffix: String::new() },
            ..f.options(Mode::Apply)
        };
        let classifier = Classifier::new(&f.rules, &f.corrections, &f.index);
        let files = collect_source_files(&options).unwrap();
        let summary = run_batch(&files, &classifier, &options, &AtomicBool::new(false));

        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].path.ends_with("app/page.tsx"));
        assert_eq!(f.read("app/page.tsx"), PAGE);
    }

    #[test]
    fn restore_only_touches_source_extensions() {
        let f = Fixture::new();
        fs::write(f.dir.path().join("lib/notes.md.relfix.bak"), "old notes\n").unwrap();
        f.run(&f.options(Mode::Apply));

        let restored = restore(&f.options(Mode::Apply)).unwrap();
        assert_eq!(restored.restored, vec![f.dir.path().join("app/page.tsx")]);
        assert_eq!(f.read("lib/notes.md"), "include: { club: true }\n");
        assert_eq!(f.read("lib/notes.md.relfix.bak"), "old notes\n");
    }

    #[test]
    fn unwritable_backup_leaves_source_untouched() {
        let f = Fixture::new();
        // A regular file where the backup directory should be.
        let blocker = f.dir.path().join("backups");
        fs::write(&blocker, "").unwrap();
        let summary = f.run(&BatchOptions {
            backup: BackupPolicy::Directory { dir: blocker },
            ..f.options(Mode::Apply)
        });

        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].message.contains("failed to write backup"));
        assert_eq!(summary.files_changed, 0);
        assert_eq!(f.read("app/page.tsx"), PAGE);
    }

    #[test]
    fn failed_replace_keeps_the_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocker"), "").unwrap();
        let target = dir.path().join("blocker/page.ts");
        let backup = dir.path().join("page.ts.relfix.bak");

        let err = replace_with_backup(&target, &backup, "old", "new").unwrap_err();
        assert!(err.message.starts_with("failed to write:"), "{err}");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");

        let err = replace_with_backup(&backup, &backup, "old", "new").unwrap_err();
        assert!(err.message.contains("itself"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old");
    }

    #[test]
    fn unreadable_files_are_per_file_errors() {
        let f = Fixture::new();
        fs::write(f.dir.path().join("lib/binary.ts"), [0xff, 0xfe, 0x00]).unwrap();
        let summary = f.run(&f.options(Mode::DryRun));
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].path.ends_with("lib/binary.ts"));
        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.files_changed, 1);
    }

    #[test]
    fn cancellation_skips_remaining_files() {
        let f = Fixture::new();
        let classifier = Classifier::new(&f.rules, &f.corrections, &f.index);
        let options = f.options(Mode::Apply);
        let files = collect_source_files(&options).unwrap();
        let summary = run_batch(&files, &classifier, &options, &AtomicBool::new(true));
        assert_eq!(summary.files_skipped, 2);
        assert!(summary.cancelled());
        assert_eq!(f.read("app/page.tsx"), PAGE);
    }

    #[test]
    fn missing_root_is_a_setup_error() {
        let options = BatchOptions::new("/nonexistent/relfix-root");
        assert!(matches!(
            collect_source_files(&options),
            Err(BatchError::MissingRoot(_))
        ));
    }
}
