//! Task store backed by a JSON board file.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::OpenOptions, fs_utf8::Dir};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::{fs::File, io};
use thiserror::Error;
use tracing::debug;

use super::{StatusLabelError, StatusLabels};
use crate::task::{
    domain::{
        Board, BoardRevision, DependencySet, PersistedTaskData, Task, TaskDomainError, TaskId,
        TaskMetadata, parse_dependencies,
    },
    ports::{
        BoardSnapshot, StatusField, TaskStore, TaskStoreError, TaskStoreResult, WriteMode,
        WriteReceipt,
    },
};

/// Errors raised while reading or writing the board file.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The board file path has no file name component.
    #[error("board path '{0}' does not name a file")]
    InvalidPath(Utf8PathBuf),

    /// Filesystem access failed.
    #[error("board file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The board file is not valid JSON for the board schema.
    #[error("board file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored status label is not in the label table.
    #[error(transparent)]
    Label(#[from] StatusLabelError),

    /// A stored identifier or dependency declaration is invalid.
    #[error("task {task}: {source}")]
    InvalidTask {
        /// Raw identifier of the offending row.
        task: u64,
        /// Validation failure.
        source: TaskDomainError,
    },
}

impl From<FileStoreError> for TaskStoreError {
    fn from(err: FileStoreError) -> Self {
        match &err {
            FileStoreError::Io(io_err)
                if matches!(
                    io_err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Self::transient(err)
            }
            _ => Self::fatal(err),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BoardFile {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    tasks: Vec<TaskRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskRow {
    id: u64,
    #[serde(flatten)]
    metadata: TaskMetadata,
    #[serde(default)]
    dependencies: String,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    native_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    annotations: Vec<String>,
}

impl TaskRow {
    fn to_task(&self, labels: &StatusLabels) -> Result<Task, FileStoreError> {
        let invalid = |source| FileStoreError::InvalidTask {
            task: self.id,
            source,
        };
        let id = TaskId::new(self.id).map_err(invalid)?;
        let dependencies = parse_dependencies(&self.dependencies).map_err(invalid)?;
        let status = labels.workflow_status(&self.status)?;
        let native_status = self
            .native_status
            .as_deref()
            .map(|label| labels.native_status(label))
            .transpose()?;
        Ok(Task::from_persisted(PersistedTaskData {
            id,
            metadata: self.metadata.clone(),
            dependencies,
            status,
            native_status,
        }))
    }
}

/// Task store reading and writing a JSON board file.
///
/// Every call re-reads the file so the store never serves stale state.
/// Writes go to a sibling temporary file that is then renamed over the board.
///
/// Reads and read-modify-write cycles hold a shared or exclusive lock on a
/// sibling `.<board>.lock` file, so handles in separate processes observe
/// each other's revisions.
#[derive(Debug)]
pub struct FileTaskStore {
    dir: Dir,
    file_name: Utf8PathBuf,
    lock_name: Utf8PathBuf,
    labels: StatusLabels,
}

impl FileTaskStore {
    /// Opens the board file at `path`.
    ///
    /// The file itself may not exist yet; it is treated as an empty board.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError`] when the containing directory cannot be
    /// opened or the path does not name a file.
    pub fn open(path: &Utf8Path, labels: StatusLabels) -> Result<Self, FileStoreError> {
        let file_name = path
            .file_name()
            .map(Utf8PathBuf::from)
            .ok_or_else(|| FileStoreError::InvalidPath(path.to_owned()))?;
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
        let lock_name = Utf8PathBuf::from(format!(".{file_name}.lock"));
        Ok(Self {
            dir,
            file_name,
            lock_name,
            labels,
        })
    }

    /// Returns the label table used to encode statuses.
    #[must_use]
    pub const fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    fn board_lock(&self) -> Result<RwLock<File>, FileStoreError> {
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(false);
        let file = self.dir.open_with(&self.lock_name, &options)?;
        Ok(RwLock::new(file.into_std()))
    }

    /// Reads the board under a shared lock.
    fn load(&self) -> Result<BoardFile, FileStoreError> {
        let lock = self.board_lock()?;
        let _shared = lock.read()?;
        self.read_board_file()
    }

    fn read_board_file(&self) -> Result<BoardFile, FileStoreError> {
        match self.dir.read_to_string(&self.file_name) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BoardFile::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, board: &BoardFile) -> Result<(), FileStoreError> {
        let contents = serde_json::to_string_pretty(board)?;
        let staging = format!(".{}.tmp", self.file_name);
        self.dir.write(&staging, contents)?;
        self.dir.rename(&staging, &self.dir, &self.file_name)?;
        Ok(())
    }

    /// Loads the board, applies `change` to one row and saves the result,
    /// holding the exclusive lock throughout so the revision check and the
    /// write cannot interleave with another handle.
    ///
    /// Annotations are not state, so they leave the revision untouched.
    fn update_row(
        &self,
        id: TaskId,
        guard: Option<BoardRevision>,
        advance: bool,
        change: impl FnOnce(&mut TaskRow, &StatusLabels),
    ) -> TaskStoreResult<WriteReceipt> {
        let mut lock = self.board_lock()?;
        let _exclusive = lock.write().map_err(FileStoreError::from)?;
        let mut board = self.read_board_file()?;
        let actual = BoardRevision::new(board.revision);
        if let Some(expected) = guard.filter(|expected| *expected != actual) {
            return Err(TaskStoreError::RevisionConflict { expected, actual });
        }
        let row = board
            .tasks
            .iter_mut()
            .find(|row| row.id == id.value())
            .ok_or(TaskStoreError::NotFound(id))?;
        change(row, &self.labels);
        let revision = if advance { actual.next() } else { actual };
        board.revision = revision.value();
        self.save(&board)?;
        debug!(task_id = %id, %revision, "board file updated");
        Ok(WriteReceipt::Applied { revision })
    }

    fn ensure_row(&self, id: TaskId, guard: Option<BoardRevision>) -> TaskStoreResult<()> {
        let board = self.load()?;
        let actual = BoardRevision::new(board.revision);
        if let Some(expected) = guard.filter(|expected| *expected != actual) {
            return Err(TaskStoreError::RevisionConflict { expected, actual });
        }
        if board.tasks.iter().any(|row| row.id == id.value()) {
            Ok(())
        } else {
            Err(TaskStoreError::NotFound(id))
        }
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn get_task(&self, id: TaskId) -> TaskStoreResult<Task> {
        let board = self.load()?;
        let row = board
            .tasks
            .iter()
            .find(|row| row.id == id.value())
            .ok_or(TaskStoreError::NotFound(id))?;
        Ok(row.to_task(&self.labels)?)
    }

    async fn list_tasks(&self) -> TaskStoreResult<BoardSnapshot> {
        let file = self.load()?;
        let board = file
            .tasks
            .iter()
            .map(|row| row.to_task(&self.labels))
            .collect::<Result<Board, _>>()?;
        Ok(BoardSnapshot {
            board,
            revision: BoardRevision::new(file.revision),
        })
    }

    async fn set_status_field(
        &self,
        id: TaskId,
        field: StatusField,
        guard: Option<BoardRevision>,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        if mode.is_simulate() {
            self.ensure_row(id, guard)?;
            return Ok(WriteReceipt::Simulated {
                description: format!("would set {field} on task {id}"),
            });
        }
        self.update_row(id, guard, true, |row, labels| match field {
            StatusField::Workflow(status) => {
                row.status = labels.workflow_label(status).to_owned();
            }
            StatusField::Native(status) => {
                row.native_status = Some(labels.native_label(status).to_owned());
            }
        })
    }

    async fn set_dependencies(
        &self,
        id: TaskId,
        dependencies: &DependencySet,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        if mode.is_simulate() {
            self.ensure_row(id, None)?;
            return Ok(WriteReceipt::Simulated {
                description: format!("would declare dependencies {dependencies} on task {id}"),
            });
        }
        let declaration = dependencies.to_declaration();
        self.update_row(id, None, true, |row, _| row.dependencies = declaration)
    }

    async fn post_annotation(
        &self,
        id: TaskId,
        text: &str,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        if mode.is_simulate() {
            self.ensure_row(id, None)?;
            return Ok(WriteReceipt::Simulated {
                description: format!("would annotate task {id}: {text}"),
            });
        }
        self.update_row(id, None, false, |row, _| row.annotations.push(text.to_owned()))
    }
}
