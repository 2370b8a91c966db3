use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::component_map::{render_component_map_module, ComponentMap};
use crate::config::InspectorConfig;
use crate::debounce::coalescer;
use crate::error::{FileDiagnostic, InspectorError, InspectorResult, PatchError};
use crate::instrument::{strip_identifiers, with_element_mut};
use crate::language::LanguageServices;
use crate::patch::{apply_property_patch, PatchAction};
use crate::props::{extract_properties, PropValue};
use crate::registry::{LoadSummary, Registry};
use crate::selection::{HostMessage, Selection, SelectionReply};
use crate::store::SourceStore;
use crate::watch::{FileEvent, FileEventKind, FileWatcher};

/// Pending source changes, latest event per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(BTreeMap<PathBuf, FileEventKind>);

impl ChangeSet {
    pub fn record(&mut self, event: FileEvent) {
        self.0.insert(event.path, event.kind);
    }

    pub fn with(mut self, events: impl IntoIterator<Item = FileEvent>) -> Self {
        for event in events {
            self.record(event);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = FileEvent> + '_ {
        self.0.iter().map(|(path, kind)| FileEvent {
            kind: *kind,
            path: path.clone(),
        })
    }
}

/// One property change requested by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyEdit {
    pub uid: String,
    pub name: String,
    pub value: PropValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub path: PathBuf,
    pub version: u64,
    pub action: PatchAction,
    pub fallback: Option<PatchError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub failed: usize,
    pub components: usize,
    pub artifact_written: bool,
}

pub struct Pipeline<S: SourceStore> {
    config: InspectorConfig,
    store: S,
    registry: Registry,
    component_map: ComponentMap,
    artifact_path: Option<PathBuf>,
    artifact: Option<String>,
    /// Text this pipeline wrote per path, so the watcher echo is not re-ingested.
    written: HashMap<PathBuf, String>,
    design_mode: bool,
}

impl<S: SourceStore> Pipeline<S> {
    pub fn new(config: InspectorConfig, store: S) -> Self {
        Self::with_services(config, store, LanguageServices::init())
    }

    pub fn with_services(config: InspectorConfig, store: S, services: LanguageServices) -> Self {
        let mut registry = Registry::new(services, config.identifier_attribute.clone());
        let artifact_path = config.component_map_path(store.root());
        if let Some(path) = &artifact_path {
            registry.exclude(path.clone());
        }
        Self {
            config,
            store,
            registry,
            component_map: ComponentMap::default(),
            artifact_path,
            artifact: None,
            written: HashMap::new(),
            design_mode: false,
        }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn component_map(&self) -> &ComponentMap {
        &self.component_map
    }

    pub fn design_mode(&self) -> bool {
        self.design_mode
    }

    pub fn diagnostics(&self) -> Vec<FileDiagnostic> {
        self.registry.diagnostics().cloned().collect()
    }

    /// Process every file, then regenerate the component map.
    pub fn load(&mut self) -> InspectorResult<CycleReport> {
        let LoadSummary { loaded, failed } = self.registry.load_all(&self.store)?;
        let mut report = CycleReport {
            processed: loaded,
            failed,
            ..Default::default()
        };
        self.regenerate(&mut report)?;
        Ok(report)
    }

    /// Apply a batch of changes, then regenerate the component map.
    pub fn run_cycle(&mut self, changes: &ChangeSet) -> InspectorResult<CycleReport> {
        let mut report = CycleReport::default();

        for event in changes.events() {
            if self.is_echo(&event) {
                tracing::debug!("{}: skipping own write", event.path.display());
                continue;
            }
            match self.registry.apply_event(&event, &self.store) {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    tracing::warn!("{}: {}", event.path.display(), e);
                    report.failed += 1;
                }
            }
        }

        self.regenerate(&mut report)?;
        tracing::info!(
            "cycle done: {} processed, {} failed, {} components",
            report.processed,
            report.failed,
            report.components
        );
        Ok(report)
    }

    fn is_echo(&mut self, event: &FileEvent) -> bool {
        if event.kind != FileEventKind::Changed {
            return false;
        }
        let Some(written) = self.written.remove(&event.path) else {
            return false;
        };
        matches!(self.store.read(&event.path), Ok(text) if text == written)
    }

    fn regenerate(&mut self, report: &mut CycleReport) -> InspectorResult<()> {
        self.component_map = self.registry.component_map();
        report.components = self.component_map.len();

        let Some(path) = &self.artifact_path else {
            return Ok(());
        };
        let text = render_component_map_module(
            &self.component_map,
            self.store.root(),
            &self.config.import_alias,
        );
        if self.artifact.as_deref() == Some(text.as_str()) {
            return Ok(());
        }
        self.store.write(path, &text)?;
        tracing::info!("component map written to {}", path.display());
        self.artifact = Some(text);
        report.artifact_written = true;
        Ok(())
    }

    /// Current state of the element carrying `uid`.
    pub fn inspect(&self, uid: &str) -> Option<Selection> {
        let element = self.registry.get_node_for_identifier(uid)?;
        let cm = element.entry.instrumented.source_map();
        let attr = self.registry.attr_name();
        let properties = element.with_element(|el| {
            extract_properties(Some(el), cm)
                .into_iter()
                .filter(|p| p.name != attr)
                .collect::<Vec<_>>()
        })?;

        Some(Selection {
            uid: uid.to_string(),
            path: element.path().to_path_buf(),
            version: element.version(),
            tag: element.node.tag.clone(),
            is_component: element.node.is_component,
            lines: element.node.lines,
            properties,
        })
    }

    pub fn handle_message(&mut self, message: HostMessage) -> SelectionReply {
        match message {
            HostMessage::SelectUid { uid } => match self.inspect(&uid) {
                Some(selection) => SelectionReply::Found(selection),
                None => {
                    tracing::debug!("selection of unknown identifier {}", uid);
                    SelectionReply::NotFound { uid }
                }
            },
            HostMessage::SetDesignMode { active } => {
                tracing::debug!("design mode {}", if active { "on" } else { "off" });
                self.design_mode = active;
                SelectionReply::Ack
            }
        }
    }

    /// Patch a clone of the owning file's tree, write it back and re-ingest it.
    pub fn apply_edit(&mut self, edit: &PropertyEdit) -> InspectorResult<EditOutcome> {
        if edit.name == self.registry.attr_name() {
            return Err(PatchError::ReadOnly(edit.name.clone()).into());
        }
        let unknown = || InspectorError::UnknownIdentifier(edit.uid.clone());
        let (path, mut tree) = {
            let element = self.registry.get_node_for_identifier(&edit.uid).ok_or_else(unknown)?;
            (element.path().to_path_buf(), element.entry.instrumented.clone())
        };

        let cm = tree.source_map().clone();
        let services = self.registry.services();
        let attr = self.registry.attr_name();
        let outcome = with_element_mut(&mut tree.module, attr, &edit.uid, |el| {
            apply_property_patch(services, &cm, el, &edit.name, &edit.value)
        })
        .ok_or_else(unknown)??;

        if let Some(fallback) = &outcome.fallback {
            tracing::warn!("{}: {}", path.display(), fallback);
        }

        if outcome.action == PatchAction::Unchanged {
            let version = self.registry.get_entry(&path).map(|e| e.version).unwrap_or(0);
            return Ok(EditOutcome {
                path,
                version,
                action: outcome.action,
                fallback: outcome.fallback,
            });
        }

        let instrumented_text = tree.print();
        let on_disk = if self.config.persist_identifiers {
            instrumented_text.clone()
        } else {
            let mut stripped = tree.module.clone();
            strip_identifiers(&mut stripped, attr);
            tree.with_module(stripped).print()
        };

        self.store.write(&path, &on_disk)?;
        self.written.insert(path.clone(), on_disk);

        // Re-ingesting the instrumented text keeps every identifier stable.
        let version = self.registry.ingest(&path, instrumented_text)?.version;
        tracing::info!("{}: '{}' {:?} (version {})", path.display(), edit.name, outcome.action, version);

        Ok(EditOutcome {
            path,
            version,
            action: outcome.action,
            fallback: outcome.fallback,
        })
    }

    /// Watch the store root, re-running cycles through the debouncer until
    /// `shutdown` resolves or the watcher stops.
    pub async fn watch(&mut self, mut watcher: FileWatcher, shutdown: impl Future<Output = ()>) {
        let (handle, worker) = coalescer::<ChangeSet>(self.config.debounce());

        tokio::pin!(shutdown);
        let producer = async {
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    events = watcher.next_events() => match events {
                        Some(events) => {
                            handle.update(|pending| pending.unwrap_or_default().with(events));
                        }
                        None => break,
                    },
                }
            }
            handle.close();
        };

        let consumer = worker.run(|changes| {
            if let Err(e) = self.run_cycle(&changes) {
                tracing::error!("cycle failed: {}", e);
            }
        });

        let (runs, ()) = tokio::join!(consumer, producer);
        tracing::info!("watch stopped after {} cycles", runs);
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }
}
