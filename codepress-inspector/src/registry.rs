use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use swc_core::ecma::ast::JSXElement;

use crate::component_map::{build_component_map, ComponentMap};
use crate::error::{FileDiagnostic, InspectorError, InspectorResult, StoreError};
use crate::instrument::{instrument, with_element, ElementArena, ElementId, ElementNode};
use crate::language::{is_supported_path, LanguageServices, LanguageVariant};
use crate::parser::{parse, SyntaxTree};
use crate::store::SourceStore;
use crate::watch::{FileEvent, FileEventKind};

/// Everything known about one source file, replaced as a unit on every re-parse.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub variant: LanguageVariant,
    pub source: String,
    pub parsed: SyntaxTree,
    pub instrumented: SyntaxTree,
    pub arena: ElementArena,
    /// Printed instrumented module.
    pub generated: String,
    pub version: u64,
}

/// An element resolved from its identifier, borrowed from the live entry.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    pub entry: &'a FileEntry,
    pub id: ElementId,
    pub node: &'a ElementNode,
    attr_name: &'a str,
}

impl<'a> ElementRef<'a> {
    pub fn uid(&self) -> &'a str {
        &self.node.uid
    }

    pub fn path(&self) -> &'a Path {
        &self.entry.path
    }

    pub fn version(&self) -> u64 {
        self.entry.version
    }

    /// Run `f` on the element's node in the instrumented tree.
    pub fn with_element<R>(&self, f: impl FnOnce(&JSXElement) -> R) -> Option<R> {
        with_element(&self.entry.instrumented.module, self.attr_name, self.uid(), f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
}

pub struct Registry {
    services: LanguageServices,
    attr_name: String,
    entries: BTreeMap<PathBuf, FileEntry>,
    /// Survives removal so a recreated file keeps counting up.
    versions: HashMap<PathBuf, u64>,
    diagnostics: BTreeMap<PathBuf, FileDiagnostic>,
    /// Paths never loaded, such as generated artifacts inside the project.
    excluded: HashSet<PathBuf>,
}

impl Registry {
    pub fn new(services: LanguageServices, attr_name: impl Into<String>) -> Self {
        Self {
            services,
            attr_name: attr_name.into(),
            entries: BTreeMap::new(),
            versions: HashMap::new(),
            diagnostics: BTreeMap::new(),
            excluded: HashSet::new(),
        }
    }

    pub fn exclude(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.entries.remove(&path);
        self.excluded.insert(path);
    }

    fn is_tracked(&self, path: &Path) -> bool {
        is_supported_path(path) && !self.excluded.contains(path)
    }

    pub fn services(&self) -> &LanguageServices {
        &self.services
    }

    pub fn attr_name(&self) -> &str {
        &self.attr_name
    }

    /// Discover and process every supported file. Files that vanished from the
    /// store since the last load are dropped.
    pub fn load_all(&mut self, store: &dyn SourceStore) -> InspectorResult<LoadSummary> {
        let paths: Vec<PathBuf> = store.list()?.into_iter().filter(|p| self.is_tracked(p)).collect();
        let mut summary = LoadSummary::default();

        let stale: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|p| paths.binary_search(p).is_err())
            .cloned()
            .collect();
        for path in stale {
            self.remove(&path);
        }

        for path in &paths {
            match self.refresh(path, store) {
                Ok(()) => summary.loaded += 1,
                Err(_) => summary.failed += 1,
            }
        }

        tracing::info!(
            "loaded {} files ({} failed) from {}",
            summary.loaded,
            summary.failed,
            store.root().display()
        );
        Ok(summary)
    }

    pub fn apply_event(&mut self, event: &FileEvent, store: &dyn SourceStore) -> InspectorResult<()> {
        match event.kind {
            FileEventKind::Created | FileEventKind::Changed => self.refresh(&event.path, store),
            FileEventKind::Deleted => {
                self.remove(&event.path);
                Ok(())
            }
        }
    }

    /// Re-read one file from the store. A file that no longer exists is removed.
    pub fn refresh(&mut self, path: &Path, store: &dyn SourceStore) -> InspectorResult<()> {
        if !self.is_tracked(path) || store.ignores(path) {
            tracing::trace!("{}: not tracked", path.display());
            return Ok(());
        }
        match store.read(path) {
            Ok(text) => self.ingest(path, text).map(|_| ()),
            Err(StoreError::NotFound(_)) => {
                self.remove(path);
                Ok(())
            }
            Err(e) => {
                tracing::error!("{}: {}", path.display(), e);
                self.entries.remove(path);
                self.diagnostics
                    .insert(path.to_path_buf(), FileDiagnostic::new(path, e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Parse, instrument and print `text`, then swap the entry in.
    pub fn ingest(&mut self, path: &Path, text: impl Into<String>) -> InspectorResult<&FileEntry> {
        let source = text.into();
        let parsed = match parse(&self.services, &source, path) {
            Ok(tree) => tree,
            Err(e) => {
                if !e.is_unsupported() {
                    tracing::error!("{}", e);
                    self.entries.remove(path);
                    self.diagnostics
                        .insert(path.to_path_buf(), FileDiagnostic::from_parse(path, &e));
                }
                return Err(InspectorError::Parse(e));
            }
        };

        let instrumented = instrument(&parsed, &self.attr_name);
        let generated = instrumented.tree.print();
        let version = self.versions.get(path).copied().unwrap_or(0) + 1;
        self.versions.insert(path.to_path_buf(), version);
        self.diagnostics.remove(path);

        let entry = FileEntry {
            path: path.to_path_buf(),
            variant: parsed.variant,
            source,
            parsed,
            instrumented: instrumented.tree,
            arena: instrumented.arena,
            generated,
            version,
        };
        tracing::debug!("{}: version {} with {} elements", path.display(), version, entry.arena.len());

        self.entries.insert(path.to_path_buf(), entry);
        Ok(&self.entries[path])
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileEntry> {
        self.diagnostics.remove(path);
        let removed = self.entries.remove(path);
        if removed.is_some() {
            tracing::debug!("{}: removed", path.display());
        }
        removed
    }

    pub fn get_entry(&self, path: &Path) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// The instrumented tree of `path`.
    pub fn get_tree(&self, path: &Path) -> Option<&SyntaxTree> {
        self.entries.get(path).map(|e| &e.instrumented)
    }

    /// Scans live entries only, so identifiers from superseded versions resolve to `None`.
    pub fn get_node_for_identifier(&self, uid: &str) -> Option<ElementRef<'_>> {
        self.entries.values().find_map(|entry| {
            let id = entry.arena.lookup(uid)?;
            Some(ElementRef {
                entry,
                id,
                node: entry.arena.get(id)?,
                attr_name: &self.attr_name,
            })
        })
    }

    /// Live entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &FileDiagnostic> {
        self.diagnostics.values()
    }

    pub fn component_map(&self) -> ComponentMap {
        build_component_map(self.entries().map(|e| (e.path.as_path(), &e.parsed.module)))
    }
}
