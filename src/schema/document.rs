/// Content documents: loading, normalization, and lookup.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::action::{Action, Command, SingleAction, VariableContext};
use super::content::{
    ContentItem, ContentKind, Countdown, LinkActions, Prompt, TextOptions, ToggleState,
};
use super::value::Value;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub comment: String,
    pub version: String,
}

/// Presentation settings carried by the document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentConfig {
    pub name: String,
    pub speed: Option<u32>,
    pub footer: Option<String>,
    pub min_width: Option<usize>,
    pub max_width: Option<usize>,
    pub render_scanlines: Option<bool>,
    pub screen_flicker: Option<bool>,
    pub theme: Option<String>,
}

impl DocumentConfig {
    /// Clamp a host-provided column count into `[minWidth, maxWidth]`.
    pub fn clamp_columns(&self, columns: usize) -> usize {
        let mut cols = columns;
        if let Some(max) = self.max_width {
            cols = cols.min(max);
        }
        if let Some(min) = self.min_width {
            cols = cols.max(min);
        }
        cols
    }

    pub fn render_scanlines(&self) -> bool {
        self.render_scanlines.unwrap_or(true)
    }

    pub fn screen_flicker(&self) -> bool {
        self.screen_flicker.unwrap_or(true)
    }

    pub fn theme(&self) -> &str {
        self.theme.as_deref().unwrap_or("amber")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScreenType {
    #[default]
    Screen,
    Static,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub id: String,
    pub kind: ScreenType,
    pub content: Vec<ContentItem>,
}

impl Screen {
    pub fn item(&self, id: &str) -> Option<&ContentItem> {
        self.content.iter().find(|item| item.id == id)
    }

    /// The prompt hosting this screen's command table, if any.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.content.iter().find_map(ContentItem::as_prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialogType {
    #[default]
    Alert,
    Dialog,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: DialogType,
    #[serde(default)]
    pub content: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Number,
    Boolean,
    String,
}

/// A declared variable and the value it starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    pub default: Value,
}

/// A validated, normalized content document. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub metadata: Metadata,
    pub config: DocumentConfig,
    pub screens: Vec<Screen>,
    pub dialogs: Vec<Dialog>,
    pub variables: Vec<VariableDecl>,
    screen_index: FxHashMap<String, usize>,
    dialog_index: FxHashMap<String, usize>,
}

// Raw document shape. Content entries may be bare strings, items carry
// optional ids, and links name their targets in several ways, so parsing
// goes through these structs before normalization.

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    config: DocumentConfig,
    #[serde(default)]
    screens: Vec<RawScreen>,
    #[serde(default)]
    dialogs: Vec<Dialog>,
    #[serde(default)]
    variables: Vec<VariableDecl>,
}

#[derive(Debug, Deserialize)]
struct RawScreen {
    id: String,
    #[serde(rename = "type", default)]
    kind: ScreenType,
    #[serde(default)]
    content: Vec<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Plain(String),
    Item(RawItem),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawItem {
    Void,
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
        #[serde(default)]
        text_opts: TextOptions,
    },
    #[serde(rename_all = "camelCase")]
    Bitmap {
        src: String,
        alt: Option<String>,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    Link {
        text: Option<String>,
        target: Option<RawLinkTarget>,
        actions: Option<LinkActions>,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
        #[serde(default)]
        text_opts: TextOptions,
    },
    #[serde(rename_all = "camelCase")]
    Toggle {
        states: Vec<ToggleState>,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
        #[serde(default)]
        text_opts: TextOptions,
    },
    #[serde(rename_all = "camelCase")]
    Prompt {
        prompt: Option<String>,
        #[serde(default)]
        commands: Vec<Command>,
        #[serde(default)]
        allow_meta_commands: bool,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
        #[serde(default)]
        text_opts: TextOptions,
    },
    #[serde(rename_all = "camelCase")]
    Countdown {
        prompt: String,
        duration: u64,
        id: Option<String>,
        class_name: Option<String>,
        on_load: Option<bool>,
        #[serde(default)]
        text_opts: TextOptions,
    },
    #[serde(rename_all = "camelCase")]
    Variable {
        target: String,
        context: VariableContext,
        id: Option<String>,
        on_load: Option<bool>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLinkTarget {
    Screen(String),
    Targets(Vec<LinkTarget>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkTarget {
    target: String,
    #[serde(rename = "type", default = "default_link_type")]
    kind: String,
    #[serde(default)]
    shift_key: bool,
}

fn default_link_type() -> String {
    "link".to_string()
}

impl LinkTarget {
    fn to_action(&self) -> SingleAction {
        let target = self.target.clone();
        match self.kind.as_str() {
            "dialog" | "alert" => SingleAction::Dialog { target },
            "toggle" => SingleAction::Toggle { target },
            _ => SingleAction::Link {
                target,
                shift_key: self.shift_key,
            },
        }
    }
}

fn link_actions(target: Option<RawLinkTarget>, actions: Option<LinkActions>) -> LinkActions {
    if let Some(actions) = actions {
        return actions;
    }
    match target {
        Some(RawLinkTarget::Screen(screen)) => LinkActions {
            base: Action::link(screen),
            shift: None,
        },
        Some(RawLinkTarget::Targets(targets)) => {
            let base: Vec<SingleAction> = targets
                .iter()
                .filter(|t| !t.shift_key)
                .map(LinkTarget::to_action)
                .collect();
            let shift: Vec<SingleAction> = targets
                .iter()
                .filter(|t| t.shift_key)
                .map(LinkTarget::to_action)
                .collect();
            LinkActions {
                base: Action::Chain(base),
                shift: if shift.is_empty() {
                    None
                } else {
                    Some(Action::Chain(shift))
                },
            }
        }
        None => LinkActions {
            base: Action::Chain(Vec::new()),
            shift: None,
        },
    }
}

fn normalize_item(screen_id: &str, index: usize, raw: RawContent) -> Option<ContentItem> {
    let fallback_id = || format!("{}-{}", screen_id, index);
    let item = match raw {
        RawContent::Plain(text) => ContentItem {
            id: fallback_id(),
            class_name: None,
            on_load: true,
            kind: ContentKind::Text {
                text,
                text_opts: TextOptions::default(),
            },
        },
        RawContent::Item(RawItem::Void) => return None,
        RawContent::Item(RawItem::Text {
            text,
            id,
            class_name,
            on_load,
            text_opts,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Text { text, text_opts },
        },
        RawContent::Item(RawItem::Bitmap {
            src,
            alt,
            id,
            class_name,
            on_load,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Bitmap { src, alt },
        },
        RawContent::Item(RawItem::Link {
            text,
            target,
            actions,
            id,
            class_name,
            on_load,
            text_opts,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Link {
                text: text.unwrap_or_default(),
                actions: link_actions(target, actions),
                text_opts,
            },
        },
        RawContent::Item(RawItem::Toggle {
            states,
            id,
            class_name,
            on_load,
            text_opts,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Toggle { states, text_opts },
        },
        RawContent::Item(RawItem::Prompt {
            prompt,
            commands,
            allow_meta_commands,
            id,
            class_name,
            on_load,
            text_opts,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Prompt(Prompt {
                prompt: prompt.unwrap_or_default(),
                commands,
                allow_meta_commands,
                text_opts,
            }),
        },
        RawContent::Item(RawItem::Countdown {
            prompt,
            duration,
            id,
            class_name,
            on_load,
            text_opts,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Countdown(Countdown {
                prompt,
                duration,
                text_opts,
            }),
        },
        RawContent::Item(RawItem::Variable {
            target,
            context,
            id,
            on_load,
        }) => ContentItem {
            id: id.unwrap_or_else(fallback_id),
            class_name: None,
            on_load: on_load.unwrap_or(true),
            kind: ContentKind::Variable { target, context },
        },
    };
    Some(item)
}

impl Document {
    /// Load a document from a JSON file.
    pub fn load_from_json(path: &Path) -> Result<Document, DocumentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_json(&contents)
    }

    /// Parse a document from a JSON string.
    ///
    /// The input is assumed to be schema-valid already; only the shape
    /// needed for normalization is checked.
    pub fn parse_json(input: &str) -> Result<Document, DocumentError> {
        let raw: RawDocument = serde_json::from_str(input)?;
        let screens = raw
            .screens
            .into_iter()
            .map(|screen| {
                let content = screen
                    .content
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, item)| normalize_item(&screen.id, i, item))
                    .collect();
                Screen {
                    id: screen.id,
                    kind: screen.kind,
                    content,
                }
            })
            .collect();
        Self::from_parts(raw.metadata, raw.config, screens, raw.dialogs, raw.variables)
    }

    /// Assemble a document from already-normalized parts.
    pub fn from_parts(
        metadata: Metadata,
        config: DocumentConfig,
        screens: Vec<Screen>,
        dialogs: Vec<Dialog>,
        variables: Vec<VariableDecl>,
    ) -> Result<Document, DocumentError> {
        let mut screen_index = FxHashMap::default();
        for (i, screen) in screens.iter().enumerate() {
            if screen_index.insert(screen.id.clone(), i).is_some() {
                return Err(DocumentError::DuplicateId {
                    kind: "screen",
                    id: screen.id.clone(),
                });
            }
        }
        let mut dialog_index = FxHashMap::default();
        for (i, dialog) in dialogs.iter().enumerate() {
            if dialog_index.insert(dialog.id.clone(), i).is_some() {
                return Err(DocumentError::DuplicateId {
                    kind: "dialog",
                    id: dialog.id.clone(),
                });
            }
        }
        Ok(Document {
            metadata,
            config,
            screens,
            dialogs,
            variables,
            screen_index,
            dialog_index,
        })
    }

    pub fn screen(&self, id: &str) -> Option<&Screen> {
        self.screen_index.get(id).map(|&i| &self.screens[i])
    }

    pub fn dialog(&self, id: &str) -> Option<&Dialog> {
        self.dialog_index.get(id).map(|&i| &self.dialogs[i])
    }

    /// The screen shown when the document is first loaded.
    pub fn start_screen(&self) -> Option<&Screen> {
        self.screens.first()
    }

    /// Every toggle item across all screens, with its states.
    pub fn toggles(&self) -> impl Iterator<Item = (&str, &[ToggleState])> {
        self.screens
            .iter()
            .flat_map(|s| s.content.iter())
            .filter_map(|item| match &item.kind {
                ContentKind::Toggle { states, .. } => Some((item.id.as_str(), states.as_slice())),
                _ => None,
            })
    }
}
