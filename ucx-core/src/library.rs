use crate::ast::Class;
use crate::error::LibraryError;
use crate::parser::parse;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    Loading,
    Loaded,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoadState::Loading,
            2 => LoadState::Loaded,
            _ => LoadState::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoadState::NotStarted => 0,
            LoadState::Loading => 1,
            LoadState::Loaded => 2,
        }
    }
}

/// A class parsed from the external library corpus.
#[derive(Debug)]
pub struct LibraryClass {
    pub class: Arc<Class>,
    pub path: PathBuf,
}

/// Library classes keyed by lowercase name.
///
/// Populated by a single [`LibraryLoader`] and read concurrently by every
/// query. Once the state is [`LoadState::Loaded`] the index is frozen and
/// further inserts are refused.
#[derive(Debug)]
pub struct LibraryIndex {
    classes: DashMap<String, Arc<LibraryClass>>,
    state: AtomicU8,
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self {
            classes: DashMap::new(),
            state: AtomicU8::new(LoadState::NotStarted.as_u8()),
        }
    }

    pub fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once every library class has been inserted.
    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// Insert a parsed class. Returns `false` when the index is frozen, the
    /// class has no name, or a class of the same name is already present.
    pub fn insert(&self, class: Class, path: PathBuf) -> bool {
        if self.is_loaded() {
            warn!("Refusing insert into frozen library index: {}", path.display());
            return false;
        }
        let Some(name) = class.name_lower().map(str::to_owned) else {
            return false;
        };

        match self.classes.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                debug!(
                    "Duplicate library class {} in {} (keeping {})",
                    existing.key(),
                    path.display(),
                    existing.get().path.display()
                );
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(LibraryClass {
                    class: Arc::new(class),
                    path,
                }));
                true
            }
        }
    }

    pub fn get(&self, name_lower: &str) -> Option<Arc<LibraryClass>> {
        self.classes.get(name_lower).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name_lower: &str) -> bool {
        self.classes.contains_key(name_lower)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Move from `NotStarted` to `Loading`. Fails if a load already began.
    pub fn begin_loading(&self) -> bool {
        self.state
            .compare_exchange(
                LoadState::NotStarted.as_u8(),
                LoadState::Loading.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Freeze the index.
    pub fn finish_loading(&self) {
        self.state.store(LoadState::Loaded.as_u8(), Ordering::Release);
    }

    /// Drop everything and return to `NotStarted`.
    pub fn reset(&self) {
        self.classes.clear();
        self.state.store(LoadState::NotStarted.as_u8(), Ordering::Release);
    }
}

impl Default for LibraryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub classes_loaded: usize,
    pub files_skipped: usize,
    pub elapsed: Duration,
}

/// A running library load.
pub struct LoadHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<LoadSummary, LibraryError>>,
}

impl LoadHandle {
    /// Ask the loader to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the load to complete.
    pub async fn finished(self) -> Result<LoadSummary, LibraryError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(LibraryError::Task(e.to_string())),
        }
    }
}

pub struct LibraryLoader;

impl LibraryLoader {
    /// Start loading every `*.uc` file under `root` into `index` on a
    /// blocking task. Must be called from within a tokio runtime.
    pub fn spawn(index: Arc<LibraryIndex>, root: PathBuf) -> LoadHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || Self::load(&index, &root, &token));
        LoadHandle { cancel, task }
    }

    /// Synchronous load. On any failure the index is cleared and returned to
    /// `NotStarted`.
    pub fn load(
        index: &LibraryIndex,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<LoadSummary, LibraryError> {
        if !index.begin_loading() {
            warn!("Library load requested while already {:?}", index.state());
            return Err(LibraryError::AlreadyStarted);
        }

        info!("Loading library classes from {}", root.display());
        match Self::load_files(index, root, cancel) {
            Ok(summary) => {
                index.finish_loading();
                info!(
                    "Library loaded: {} classes, {} files skipped in {:?}",
                    summary.classes_loaded, summary.files_skipped, summary.elapsed
                );
                Ok(summary)
            }
            Err(e) => {
                index.reset();
                match &e {
                    LibraryError::Cancelled => info!("Library load cancelled"),
                    _ => error!("Library load failed: {}", e),
                }
                Err(e)
            }
        }
    }

    fn load_files(
        index: &LibraryIndex,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<LoadSummary, LibraryError> {
        let started = Instant::now();
        if !root.is_dir() {
            return Err(LibraryError::MissingRoot(root.to_path_buf()));
        }

        let mut classes_loaded = 0;
        let mut files_skipped = 0;

        for entry in WalkDir::new(root).follow_links(true) {
            if cancel.is_cancelled() {
                return Err(LibraryError::Cancelled);
            }

            let entry = entry.map_err(|source| LibraryError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            let bytes = std::fs::read(path).map_err(|source| LibraryError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let class = parse(&String::from_utf8_lossy(&bytes));

            if index.insert(class, path.to_path_buf()) {
                classes_loaded += 1;
            } else {
                debug!("Skipped library file {}", path.display());
                files_skipped += 1;
            }
        }

        Ok(LoadSummary {
            classes_loaded,
            files_skipped,
            elapsed: started.elapsed(),
        })
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("uc"))
}
