use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::error::WatchSetupError;
use crate::language::is_supported_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

/// One source change. Renames arrive as a delete plus a create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Created, path: path.into() }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Changed, path: path.into() }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self { kind: FileEventKind::Deleted, path: path.into() }
    }
}

/// Map a raw notification onto source events, dropping unsupported files.
pub fn translate(event: &Event) -> Vec<FileEvent> {
    let kinds: Vec<(FileEventKind, &Path)> = match &event.kind {
        EventKind::Create(_) => event.paths.iter().map(|p| (FileEventKind::Created, p.as_path())).collect(),
        EventKind::Remove(_) => event.paths.iter().map(|p| (FileEventKind::Deleted, p.as_path())).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(|p| (FileEventKind::Deleted, p.as_path())).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(|p| (FileEventKind::Created, p.as_path())).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![
                (FileEventKind::Deleted, from.as_path()),
                (FileEventKind::Created, to.as_path()),
            ],
            _ => vec![],
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => vec![],
        EventKind::Modify(_) => event.paths.iter().map(|p| (FileEventKind::Changed, p.as_path())).collect(),
        _ => vec![],
    };

    kinds
        .into_iter()
        .filter(|(_, p)| is_supported_path(p))
        .map(|(kind, path)| FileEvent { kind, path: path.to_path_buf() })
        .collect()
}

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: UnboundedReceiver<notify::Result<Event>>,
}

impl FileWatcher {
    pub fn new(root: &Path) -> Result<Self, WatchSetupError> {
        if !root.exists() {
            return Err(WatchSetupError::MissingRoot(root.to_path_buf()));
        }
        let (tx, rx) = unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!("watching {}", root.display());

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next batch of source events. `None` once the watcher has shut down.
    pub async fn next_events(&mut self) -> Option<Vec<FileEvent>> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) => {
                    let events = translate(&event);
                    if !events.is_empty() {
                        return Some(events);
                    }
                }
                Err(e) => tracing::warn!("watch error: {}", e),
            }
        }
    }
}
