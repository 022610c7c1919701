//! Scratch storage for converted images
//!
//! Every conversion run gets its own `session_<timestamp>` directory under
//! the application temp root. Deletion is best-effort throughout: a file
//! that is locked or already gone is simply left out of the counters.

use chrono::Local;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Name of the dedicated directory inside the system temp root
pub const APP_TEMP_DIR_NAME: &str = "folder2pdf";

/// Stray temp files younger than this are never swept
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// How deep the system temp root is scanned for stray files
const SYSTEM_SCAN_DEPTH: usize = 3;

fn stray_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(tmp.*|temp_\d+_.*|.*_img2pdf_.*)$").expect("temp file pattern is valid")
    })
}

/// Whether a file name follows a recognized temp-file convention
pub fn is_temp_file_name(name: &str) -> bool {
    stray_pattern().is_match(name)
}

/// Result of a cleanup pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub bytes_freed: u64,
}

impl CleanupReport {
    pub fn megabytes_freed(&self) -> f64 {
        self.bytes_freed as f64 / (1024.0 * 1024.0)
    }

    fn record_file(&mut self, size: u64) {
        self.files_removed += 1;
        self.bytes_freed += size;
    }
}

/// Snapshot of temp storage, as reported by [`TempSession::measure`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TempUsage {
    /// Files still tracked by the current session
    pub tracked_files: usize,
    pub tracked_bytes: u64,
    /// Everything under the application temp root
    pub app_root_files: usize,
    pub app_root_bytes: u64,
    /// Matching files elsewhere in the system temp root
    pub stray_files: usize,
    pub stray_bytes: u64,
}

impl TempUsage {
    pub fn total_files(&self) -> usize {
        self.app_root_files + self.stray_files
    }

    pub fn total_bytes(&self) -> u64 {
        self.app_root_bytes + self.stray_bytes
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes() as f64 / (1024.0 * 1024.0)
    }
}

/// Temp directories and files created by one conversion run
#[derive(Debug)]
pub struct TempSession {
    app_root: PathBuf,
    system_root: PathBuf,
    session_dirs: Vec<PathBuf>,
    tracked_files: Vec<PathBuf>,
    active: Option<PathBuf>,
}

impl TempSession {
    /// Use `<system temp>/folder2pdf` as the application root.
    pub fn new() -> io::Result<Self> {
        let system_root = std::env::temp_dir();
        Self::with_roots(system_root.join(APP_TEMP_DIR_NAME), system_root)
    }

    /// Use explicit roots. The application root is created if absent.
    pub fn with_roots(app_root: impl Into<PathBuf>, system_root: impl Into<PathBuf>) -> io::Result<Self> {
        let app_root = app_root.into();
        fs::create_dir_all(&app_root)?;

        Ok(Self {
            app_root,
            system_root: system_root.into(),
            session_dirs: Vec::new(),
            tracked_files: Vec::new(),
            active: None,
        })
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn system_root(&self) -> &Path {
        &self.system_root
    }

    /// Directory of the session started by the last [`begin_session`](Self::begin_session)
    pub fn session_dir(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.tracked_files
    }

    pub fn session_dirs(&self) -> &[PathBuf] {
        &self.session_dirs
    }

    /// Forget everything tracked so far without deleting it.
    ///
    /// Anything left on disk becomes an orphan that `cleanup(true)` sweeps
    /// once it is old enough.
    pub fn reset(&mut self) {
        self.session_dirs.clear();
        self.tracked_files.clear();
        self.active = None;
    }

    /// Create a new timestamped session directory and make it active.
    pub fn begin_session(&mut self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.app_root)?;

        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let mut dir = self.app_root.join(format!("session_{}", stamp));
        let mut suffix = 1;
        while dir.exists() {
            dir = self.app_root.join(format!("session_{}_{}", stamp, suffix));
            suffix += 1;
        }

        fs::create_dir(&dir)?;
        self.session_dirs.push(dir.clone());
        self.active = Some(dir.clone());
        Ok(dir)
    }

    /// Track session directories left behind by earlier runs, so the next
    /// cleanup removes them as well. Returns how many were picked up.
    pub fn adopt_existing_sessions(&mut self) -> usize {
        let entries = match fs::read_dir(&self.app_root) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut adopted = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_session = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with("session_"))
                .unwrap_or(false);
            if is_session && path.is_dir() && !self.session_dirs.contains(&path) {
                self.session_dirs.push(path);
                adopted += 1;
            }
        }
        adopted
    }

    /// Track a file for removal by the next cleanup.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.tracked_files.contains(&path) {
            self.tracked_files.push(path);
        }
    }

    /// Remove tracked artifacts; with `all`, also sweep stale temp files.
    pub fn cleanup(&mut self, all: bool) -> CleanupReport {
        self.cleanup_older_than(all, STALE_AFTER)
    }

    /// Same as [`cleanup`](Self::cleanup) with an explicit age threshold
    /// for the `all` sweep. Tracked session artifacts are removed
    /// regardless of age.
    fn cleanup_older_than(&mut self, all: bool, min_age: Duration) -> CleanupReport {
        let mut report = CleanupReport::default();

        for file in &self.tracked_files {
            if let Some(size) = remove_file_quietly(file) {
                report.record_file(size);
            }
        }

        for dir in &self.session_dirs {
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    if let Some(size) = remove_file_quietly(entry.path()) {
                        report.record_file(size);
                    }
                }
            }
            if fs::remove_dir_all(dir).is_ok() {
                report.dirs_removed += 1;
            }
        }

        if all {
            self.sweep_app_root(min_age, &mut report);
            self.sweep_system_root(min_age, &mut report);
        }

        self.reset();
        report
    }

    fn sweep_app_root(&self, min_age: Duration, report: &mut CleanupReport) {
        for entry in WalkDir::new(&self.app_root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_older_than(entry.path(), min_age) {
                if let Some(size) = remove_file_quietly(entry.path()) {
                    report.record_file(size);
                }
            }
        }

        // Drop session directories that are now empty
        for entry in WalkDir::new(&self.app_root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() && fs::remove_dir(entry.path()).is_ok() {
                report.dirs_removed += 1;
            }
        }
    }

    fn sweep_system_root(&self, min_age: Duration, report: &mut CleanupReport) {
        for path in self.stray_files() {
            if is_older_than(&path, min_age) {
                if let Some(size) = remove_file_quietly(&path) {
                    report.record_file(size);
                }
            }
        }
    }

    /// Matching files in the system temp root, excluding the app root
    fn stray_files(&self) -> Vec<PathBuf> {
        let app_root = self.app_root.clone();
        WalkDir::new(&self.system_root)
            .max_depth(SYSTEM_SCAN_DEPTH)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |e| e.path() != app_root)
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_str().map(is_temp_file_name).unwrap_or(false))
            .map(|e| e.into_path())
            .collect()
    }

    /// Sum up temp storage without deleting anything.
    pub fn measure(&self) -> TempUsage {
        let mut usage = TempUsage::default();

        let mut seen = HashSet::new();
        let session_files = self.session_dirs.iter().flat_map(|dir| {
            WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
        });
        for path in self.tracked_files.iter().cloned().chain(session_files) {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Ok(metadata) = fs::metadata(&path) {
                usage.tracked_files += 1;
                usage.tracked_bytes += metadata.len();
            }
        }

        for entry in WalkDir::new(&self.app_root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Ok(metadata) = entry.metadata() {
                usage.app_root_files += 1;
                usage.app_root_bytes += metadata.len();
            }
        }

        for path in self.stray_files() {
            if let Ok(metadata) = fs::metadata(&path) {
                usage.stray_files += 1;
                usage.stray_bytes += metadata.len();
            }
        }

        usage
    }
}

/// Delete a file, returning its size when the deletion succeeded
fn remove_file_quietly(path: &Path) -> Option<u64> {
    let size = fs::metadata(path).ok()?.len();
    fs::remove_file(path).ok()?;
    Some(size)
}

fn is_older_than(path: &Path, min_age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|modified| age_exceeds(modified, SystemTime::now(), min_age))
        .unwrap_or(false)
}

/// Strictly older than `min_age`; modification times in the future never are
fn age_exceeds(modified: SystemTime, now: SystemTime, min_age: Duration) -> bool {
    now.duration_since(modified)
        .map(|age| age > min_age)
        .unwrap_or(false)
}
