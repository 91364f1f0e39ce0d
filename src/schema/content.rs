use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::action::{Action, Command, VariableContext};

/// Lifecycle of a content item on an active screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Ready,
    Active,
    Done,
}

/// Horizontal alignment of formatted lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Per-item text presentation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOptions {
    /// Delay between characters in milliseconds. `None` reveals the item at once.
    pub speed: Option<u32>,
    pub is_password: bool,
    pub play_sound: Option<bool>,
    /// Keep literal spacing and do not word-wrap.
    pub preserve_spacing: bool,
    /// Name of a big ASCII-art font, rendered by the host.
    pub big_font: Option<String>,
    /// Repeat the text until it exactly fills the available width.
    pub fill_width: bool,
    pub align: Align,
    pub pad_char: Option<String>,
    pub margin: usize,
    pub padding: usize,
    pub border_char: Option<String>,
    pub fill_char: Option<String>,
    pub margin_char: Option<String>,
}

/// First character of an optional single-glyph option.
pub(crate) fn first_char(opt: &Option<String>) -> Option<char> {
    opt.as_deref().and_then(|s| s.chars().next())
}

impl TextOptions {
    pub fn aligned(align: Align) -> Self {
        Self {
            align,
            ..Self::default()
        }
    }

    pub fn fill_width() -> Self {
        Self {
            fill_width: true,
            ..Self::default()
        }
    }

    pub fn pad_char(&self) -> Option<char> {
        first_char(&self.pad_char)
    }

    pub fn border_char(&self) -> Option<char> {
        first_char(&self.border_char)
    }

    pub fn fill_char(&self) -> Option<char> {
        first_char(&self.fill_char)
    }

    pub fn margin_char(&self) -> Option<char> {
        first_char(&self.margin_char)
    }

    /// Big-font output is ASCII art and keeps its spacing too.
    pub fn keeps_spacing(&self) -> bool {
        self.preserve_spacing || self.big_font.is_some()
    }
}

/// One state of a cyclic toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleState {
    pub text: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_text: Option<String>,
}

/// What a link does when followed, with an optional shift-click variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkActions {
    pub base: Action,
    #[serde(default, rename = "shiftKey", skip_serializing_if = "Option::is_none")]
    pub shift: Option<Action>,
}

impl LinkActions {
    /// The action for a click, falling back to `base` when no shift
    /// variant exists.
    pub fn action(&self, shift: bool) -> &Action {
        match (&self.shift, shift) {
            (Some(alt), true) => alt,
            _ => &self.base,
        }
    }
}

/// An input prompt hosting the screen's command table.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub prompt: String,
    pub commands: Vec<Command>,
    pub allow_meta_commands: bool,
    pub text_opts: TextOptions,
}

/// A countdown timer. Expiry handling belongs to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    pub prompt: String,
    /// Total duration in seconds.
    pub duration: u64,
    pub text_opts: TextOptions,
}

impl Countdown {
    pub fn total(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.total().saturating_sub(elapsed)
    }

    pub fn is_expired(&self, elapsed: Duration) -> bool {
        self.remaining(elapsed).is_zero()
    }

    /// Prompt followed by the remaining time as `MM:SS`, rounded up to
    /// the next whole second.
    pub fn display(&self, elapsed: Duration) -> String {
        let remaining = self.remaining(elapsed);
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        format!("{}{:02}:{:02}", self.prompt, secs / 60, secs % 60)
    }
}

/// The displayable/interactive payload of a content item.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    Text {
        text: String,
        text_opts: TextOptions,
    },
    Bitmap {
        src: String,
        alt: Option<String>,
    },
    Link {
        text: String,
        actions: LinkActions,
        text_opts: TextOptions,
    },
    Toggle {
        states: Vec<ToggleState>,
        text_opts: TextOptions,
    },
    Prompt(Prompt),
    Countdown(Countdown),
    /// Echoes a variable mutation when the item loads.
    Variable {
        target: String,
        context: VariableContext,
    },
}

/// One element of a screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub class_name: Option<String>,
    /// `false` keeps the item out of the reveal sequence.
    pub on_load: bool,
    pub kind: ContentKind,
}

impl ContentItem {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_name: None,
            on_load: true,
            kind: ContentKind::Text {
                text: text.into(),
                text_opts: TextOptions::default(),
            },
        }
    }

    pub fn text_opts(&self) -> Option<&TextOptions> {
        match &self.kind {
            ContentKind::Text { text_opts, .. }
            | ContentKind::Link { text_opts, .. }
            | ContentKind::Toggle { text_opts, .. } => Some(text_opts),
            ContentKind::Prompt(p) => Some(&p.text_opts),
            ContentKind::Countdown(c) => Some(&c.text_opts),
            ContentKind::Bitmap { .. } | ContentKind::Variable { .. } => None,
        }
    }

    pub fn as_prompt(&self) -> Option<&Prompt> {
        match &self.kind {
            ContentKind::Prompt(p) => Some(p),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ContentKind::Text { .. } => "text",
            ContentKind::Bitmap { .. } => "bitmap",
            ContentKind::Link { .. } => "link",
            ContentKind::Toggle { .. } => "toggle",
            ContentKind::Prompt(_) => "prompt",
            ContentKind::Countdown(_) => "countdown",
            ContentKind::Variable { .. } => "variable",
        }
    }
}
