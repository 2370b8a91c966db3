//! Source instrumentation and live property editing for JSX/TSX projects.
//!
//! Files are parsed with swc, every markup element gets a `data-uid`
//! attribute, and the [`registry::Registry`] maps those identifiers back to
//! elements so a host can inspect and patch their properties.

pub mod component_map;
pub mod config;
pub mod debounce;
pub mod error;
pub mod instrument;
pub mod language;
pub mod parser;
pub mod patch;
pub mod pipeline;
pub mod props;
pub mod registry;
pub mod selection;
pub mod store;
pub mod watch;

pub use component_map::{build_component_map, render_component_map_module, Collision, ComponentMap};
pub use config::InspectorConfig;
pub use debounce::{coalescer, Coalescer, CoalescerHandle};
pub use error::{
    ConfigError, Diagnostic, FileDiagnostic, InspectorError, InspectorResult, MapGenerationError,
    ParseError, PatchError, StoreError, WatchSetupError,
};
pub use instrument::{instrument, strip_identifiers, ElementArena, ElementId, ElementNode, Instrumented};
pub use language::{LanguageServices, LanguageVariant};
pub use parser::{parse, parse_expression, SyntaxTree};
pub use patch::{apply_property_patch, PatchAction, PatchOutcome};
pub use pipeline::{ChangeSet, CycleReport, EditOutcome, Pipeline, PropertyEdit};
pub use props::{extract_properties, ExtractedProperty, PropType, PropValue, StyleMap, StyleValue};
pub use registry::{ElementRef, FileEntry, Registry};
pub use selection::{HostMessage, Selection, SelectionReply};
pub use store::{FsStore, MemoryStore, SourceStore};
pub use watch::{FileEvent, FileEventKind, FileWatcher};
