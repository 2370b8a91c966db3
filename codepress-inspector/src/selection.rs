use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::props::ExtractedProperty;

/// Messages exchanged with the live preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "codepress-select-uid")]
    SelectUid { uid: String },

    /// Tells the preview whether to report clicks; selection queries are answered either way.
    #[serde(rename = "codepress-set-design-mode")]
    SetDesignMode { active: bool },
}

/// Answer to a selection: the element's current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub uid: String,
    pub path: PathBuf,
    pub version: u64,
    pub tag: String,
    pub is_component: bool,
    pub lines: Option<(usize, usize)>,
    pub properties: Vec<ExtractedProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SelectionReply {
    Found(Selection),
    NotFound { uid: String },
    Ack,
}
