/// The interpreter: one loaded document, its variable store, and the
/// active screen.
///
/// Wires together the executor, dispatcher, formatter, slicer and reveal
/// sequencing behind a single object the host drives with input, clicks
/// and ticks.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::dispatch::{DispatchOutcome, Dispatcher};
use crate::core::executor::{ActionError, ExecutionContext, Signal, ToggleBoard};
use crate::core::format::{
    render, BigFontRenderer, FormatError, InterpolationOptions, MissingMode, MissingPolicy,
    RenderContext,
};
use crate::core::reveal::{LifecycleEvent, RevealEntry, ScreenRun};
use crate::core::slice::{SliceResult, SlicedText, DEFAULT_CURSOR};
use crate::core::store::{Snapshot, VariableStore};
use crate::schema::action::Command;
use crate::schema::content::{ContentItem, ContentKind, LoadState};
use crate::schema::document::{Dialog, Document, DocumentError, Screen};

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
    #[error("action error: {0}")]
    Action(#[from] ActionError),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no document supplied")]
    NoDocument,
    #[error("document has no screens")]
    NoScreens,
    #[error("unknown screen: {0}")]
    UnknownScreen(String),
    #[error("unknown dialog: {0}")]
    UnknownDialog(String),
    #[error("no item {item} on screen {screen}")]
    UnknownItem { screen: String, item: String },
    #[error("no screen is active")]
    NoActiveScreen,
}

/// One host frame at 60 Hz.
pub const DEFAULT_TICK_MS: u64 = 16;

/// Interpreter settings, loadable from a RON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Column budget before the document's min/max width clamp.
    pub columns: usize,
    pub seed: Option<u64>,
    pub cursor_glyph: char,
    pub missing_variables: MissingMode,
    /// Screen to show first, instead of the document's first screen.
    pub start_screen: Option<String>,
    /// Time one [`Interpreter::tick`] stands for, in milliseconds.
    pub tick_ms: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            seed: None,
            cursor_glyph: DEFAULT_CURSOR,
            missing_variables: MissingMode::Leave,
            start_screen: None,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl InterpreterConfig {
    pub fn parse_ron(input: &str) -> Result<Self, InterpreterError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, InterpreterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

/// Everything a renderer needs to draw one item this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedItem {
    pub id: String,
    pub kind: &'static str,
    pub class_name: Option<String>,
    pub state: LoadState,
    pub slice: SliceResult,
}

/// Read-only view used to lay out items.
struct Layout<'a> {
    store: &'a VariableStore,
    toggles: &'a ToggleBoard,
    interpolation: &'a InterpolationOptions,
    fonts: Option<&'a dyn BigFontRenderer>,
    columns: usize,
}

impl Layout<'_> {
    /// Source text of an item, before interpolation and formatting.
    fn source_text<'i>(&self, item: &'i ContentItem) -> Option<&'i str> {
        match &item.kind {
            ContentKind::Text { text, .. } | ContentKind::Link { text, .. } => Some(text.as_str()),
            ContentKind::Toggle { states, .. } => {
                let index = self.toggles.active(&item.id).unwrap_or(0);
                states.get(index).map(|s| s.text.as_str())
            }
            ContentKind::Prompt(prompt) => Some(prompt.prompt.as_str()),
            ContentKind::Countdown(countdown) => Some(countdown.prompt.as_str()),
            ContentKind::Bitmap { .. } | ContentKind::Variable { .. } => None,
        }
    }

    fn sliced(&self, item: &ContentItem, text: &str) -> Result<SlicedText, FormatError> {
        let Some(opts) = item.text_opts() else {
            return Ok(SlicedText::new("", false, false));
        };
        let cx = RenderContext {
            store: self.store,
            interpolation: self.interpolation,
            fonts: self.fonts,
        };
        let formatted = render(text, self.columns, opts, &cx)?;
        Ok(SlicedText::from_options(&formatted, opts))
    }

    fn layout(&self, item: &ContentItem) -> Result<SlicedText, FormatError> {
        match self.source_text(item) {
            Some(text) => self.sliced(item, text),
            None => Ok(SlicedText::new("", false, false)),
        }
    }
}

/// The content interpreter. Built via `Interpreter::builder()`.
pub struct Interpreter {
    document: Document,
    store: VariableStore,
    toggles: ToggleBoard,
    rng: StdRng,
    dispatcher: Dispatcher,
    interpolation: InterpolationOptions,
    fonts: Option<Box<dyn BigFontRenderer>>,
    columns: usize,
    cursor_glyph: char,
    tick_interval: Duration,
    start_screen: Option<String>,
    run: Option<ScreenRun>,
    dialog: Option<String>,
}

/// Builder for constructing an `Interpreter`.
pub struct InterpreterBuilder {
    document: Option<Document>,
    document_path: Option<String>,
    config: Option<InterpreterConfig>,
    config_path: Option<String>,
    seed: Option<u64>,
    columns: Option<usize>,
    cursor_glyph: Option<char>,
    tick_ms: Option<u64>,
    interpolation: Option<InterpolationOptions>,
    meta_commands: Vec<Command>,
    fonts: Option<Box<dyn BigFontRenderer>>,
}

impl InterpreterBuilder {
    /// Provide a loaded document directly.
    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Load the document from a JSON file at build time.
    pub fn document_file(mut self, path: &str) -> Self {
        self.document_path = Some(path.to_string());
        self
    }

    pub fn config(mut self, config: InterpreterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load settings from a RON file at build time. Explicit builder
    /// settings take precedence over the file.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn cursor_glyph(mut self, glyph: char) -> Self {
        self.cursor_glyph = Some(glyph);
        self
    }

    pub fn tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = Some(ms);
        self
    }

    pub fn missing_variables(mut self, policy: MissingPolicy) -> Self {
        let stringify = self.interpolation.take().and_then(|i| i.stringify);
        self.interpolation = Some(InterpolationOptions {
            on_missing: policy,
            stringify,
        });
        self
    }

    pub fn interpolation(mut self, options: InterpolationOptions) -> Self {
        self.interpolation = Some(options);
        self
    }

    /// Engine-level commands checked before a screen's own table on
    /// prompts with `allowMetaCommands`.
    pub fn meta_commands(mut self, commands: Vec<Command>) -> Self {
        self.meta_commands = commands;
        self
    }

    pub fn big_font_renderer(mut self, renderer: impl BigFontRenderer + 'static) -> Self {
        self.fonts = Some(Box::new(renderer));
        self
    }

    pub fn build(self) -> Result<Interpreter, InterpreterError> {
        let mut config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => InterpreterConfig::load_from_ron(Path::new(path))?,
            (None, None) => InterpreterConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
        if let Some(glyph) = self.cursor_glyph {
            config.cursor_glyph = glyph;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_ms = ms;
        }

        let document = match (self.document, &self.document_path) {
            (Some(document), _) => document,
            (None, Some(path)) => Document::load_from_json(Path::new(path))?,
            (None, None) => return Err(InterpreterError::NoDocument),
        };
        if document.screens.is_empty() {
            return Err(InterpreterError::NoScreens);
        }
        if let Some(start) = &config.start_screen {
            if document.screen(start).is_none() {
                return Err(InterpreterError::UnknownScreen(start.clone()));
            }
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let interpolation = self
            .interpolation
            .unwrap_or_else(|| InterpolationOptions::new(config.missing_variables.into()));

        info!(
            title = %document.metadata.title,
            screens = document.screens.len(),
            "interpreter built"
        );
        Ok(Interpreter {
            store: VariableStore::with_defaults(&document.variables),
            toggles: ToggleBoard::from_toggles(document.toggles()),
            rng,
            dispatcher: Dispatcher::with_meta_commands(self.meta_commands),
            interpolation,
            fonts: self.fonts,
            columns: document.config.clamp_columns(config.columns),
            cursor_glyph: config.cursor_glyph,
            tick_interval: Duration::from_millis(config.tick_ms),
            start_screen: config.start_screen,
            run: None,
            dialog: None,
            document,
        })
    }
}

impl Interpreter {
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder {
            document: None,
            document_path: None,
            config: None,
            config_path: None,
            seed: None,
            columns: None,
            cursor_glyph: None,
            tick_ms: None,
            interpolation: None,
            meta_commands: Vec::new(),
            fonts: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.store
    }

    pub fn toggles(&self) -> &ToggleBoard {
        &self.toggles
    }

    /// Effective column budget, after the document's clamp.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Change the host's column budget. Returns the clamped value.
    pub fn set_columns(&mut self, columns: usize) -> usize {
        self.columns = self.document.config.clamp_columns(columns);
        debug!(requested = columns, effective = self.columns, "columns changed");
        self.columns
    }

    pub fn cursor_glyph(&self) -> char {
        self.cursor_glyph
    }

    /// Activate the configured start screen, or the document's first.
    pub fn start(&mut self) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        let start = match &self.start_screen {
            Some(id) => id.clone(),
            None => self
                .document
                .start_screen()
                .map(|s| s.id.clone())
                .ok_or(InterpreterError::NoScreens)?,
        };
        self.activate(&start)
    }

    pub fn current_screen(&self) -> Option<&Screen> {
        self.run
            .as_ref()
            .and_then(|run| self.document.screen(run.screen_id()))
    }

    pub fn current_screen_id(&self) -> Option<&str> {
        self.run.as_ref().map(ScreenRun::screen_id)
    }

    /// Make `screen_id` the current screen and start its reveal sequence.
    /// Any reveal in progress on the previous screen is abandoned.
    pub fn activate(&mut self, screen_id: &str) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        let screen = self
            .document
            .screen(screen_id)
            .ok_or_else(|| InterpreterError::UnknownScreen(screen_id.to_string()))?;
        info!(screen = %screen_id, "activate screen");

        let default_speed = self.document.config.speed;
        let entries = screen.content.iter().map(|item| RevealEntry {
            id: item.id.clone(),
            on_load: item.on_load,
            speed: item
                .text_opts()
                .and_then(|o| o.speed)
                .or(default_speed),
        });
        let (run, mut events) = ScreenRun::start(screen_id, entries);
        self.run = Some(run);

        // items outside the reveal sequence apply their effects up front
        for item in screen.content.iter().filter(|item| !item.on_load) {
            if let ContentKind::Variable { target, context } = &item.kind {
                ExecutionContext::new(&mut self.store, &mut self.toggles, &mut self.rng)
                    .apply_variable(target, context, None)?;
            }
        }

        events.extend(self.advance()?);
        Ok(events)
    }

    /// Activate pending items until one needs ticks, applying variable
    /// items as the sequence reaches them.
    fn advance(&mut self) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(Vec::new());
        };
        let Some(screen) = self.document.screen(run.screen_id()) else {
            return Ok(Vec::new());
        };
        let store = &mut self.store;
        let toggles = &mut self.toggles;
        let rng = &mut self.rng;
        let interpolation = &self.interpolation;
        let fonts = self.fonts.as_deref();
        let columns = self.columns;

        run.advance(|id| -> Result<usize, InterpreterError> {
            let Some(item) = screen.item(id) else {
                return Ok(0);
            };
            if let ContentKind::Variable { target, context } = &item.kind {
                ExecutionContext::new(store, toggles, rng).apply_variable(target, context, None)?;
                return Ok(0);
            }
            let layout = Layout {
                store: &*store,
                toggles: &*toggles,
                interpolation,
                fonts,
                columns,
            };
            Ok(layout.layout(item)?.len())
        })
    }

    /// Advance the reveal of the current screen by one tick of the
    /// configured length.
    pub fn tick(&mut self) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        self.tick_by(self.tick_interval)
    }

    /// Advance the reveal by `elapsed`, for hosts that measure their own
    /// frame time.
    pub fn tick_by(&mut self, elapsed: Duration) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(Vec::new());
        };
        let mut events = run.tick(elapsed);
        events.extend(self.advance()?);
        Ok(events)
    }

    /// Finish the current screen's reveal at once. Items still waiting
    /// activate in order, so variable items apply as usual.
    pub fn skip_reveal(&mut self) -> Result<Vec<LifecycleEvent>, InterpreterError> {
        let mut events = Vec::new();
        loop {
            let Some(run) = self.run.as_mut() else {
                break;
            };
            if run.is_done() {
                break;
            }
            events.extend(run.finish_active());
            events.extend(self.advance()?);
        }
        Ok(events)
    }

    pub fn state(&self, item_id: &str) -> Option<LoadState> {
        self.run.as_ref().and_then(|run| run.state(item_id))
    }

    /// Dispatch typed input on `screen_id` and follow the resulting
    /// signals. On an action error the current screen stays as it is.
    pub fn dispatch(&mut self, screen_id: &str, input: &str) -> Result<DispatchOutcome, InterpreterError> {
        let screen = self
            .document
            .screen(screen_id)
            .ok_or_else(|| InterpreterError::UnknownScreen(screen_id.to_string()))?;
        let Some(prompt) = screen.prompt() else {
            debug!(screen = %screen_id, "screen has no prompt");
            return Ok(DispatchOutcome::unhandled());
        };

        let mut ctx = ExecutionContext::new(&mut self.store, &mut self.toggles, &mut self.rng);
        let outcome = match self.dispatcher.dispatch(&mut ctx, prompt, input) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "command failed");
                return Err(e.into());
            }
        };
        self.follow(&outcome.signals)?;
        Ok(outcome)
    }

    /// Dispatch typed input on the current screen.
    pub fn submit(&mut self, input: &str) -> Result<DispatchOutcome, InterpreterError> {
        let screen_id = self
            .current_screen_id()
            .ok_or(InterpreterError::NoActiveScreen)?
            .to_string();
        self.dispatch(&screen_id, input)
    }

    /// Follow a link item on the current screen.
    pub fn follow_link(&mut self, item_id: &str, shift: bool) -> Result<Vec<Signal>, InterpreterError> {
        let item = self.current_item(item_id)?;
        let ContentKind::Link { actions, .. } = &item.kind else {
            return Err(self.unknown_item(item_id));
        };
        let action = actions.action(shift).clone();
        let signals = ExecutionContext::new(&mut self.store, &mut self.toggles, &mut self.rng)
            .apply(&action, None)?;
        self.follow(&signals)?;
        Ok(signals)
    }

    /// Cycle a toggle to its next state. Returns the new state index.
    pub fn flip_toggle(&mut self, item_id: &str) -> Option<usize> {
        let index = self.toggles.flip(item_id);
        if index.is_none() {
            warn!(id = %item_id, "flip requested for unknown toggle");
        }
        index
    }

    fn follow(&mut self, signals: &[Signal]) -> Result<(), InterpreterError> {
        let navigate = signals.iter().rev().find_map(|s| match s {
            Signal::Navigate(id) => Some(id.clone()),
            Signal::Dialog(_) => None,
        });
        let dialogs: Vec<&String> = signals
            .iter()
            .filter_map(|s| match s {
                Signal::Dialog(id) => Some(id),
                Signal::Navigate(_) => None,
            })
            .collect();
        if let Some(id) = dialogs.iter().find(|id| self.document.dialog(id).is_none()) {
            return Err(InterpreterError::UnknownDialog(id.to_string()));
        }
        if let Some(id) = dialogs.last() {
            info!(dialog = %id, "open dialog");
            self.dialog = Some(id.to_string());
        }
        if let Some(screen) = navigate {
            self.activate(&screen)?;
        }
        Ok(())
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_deref().and_then(|id| self.document.dialog(id))
    }

    /// Close the open dialog, returning its id.
    pub fn dismiss_dialog(&mut self) -> Option<String> {
        self.dialog.take()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.store.restore(snapshot);
    }

    fn current_item(&self, item_id: &str) -> Result<&ContentItem, InterpreterError> {
        let screen = self.current_screen().ok_or(InterpreterError::NoActiveScreen)?;
        screen.item(item_id).ok_or_else(|| self.unknown_item(item_id))
    }

    fn unknown_item(&self, item_id: &str) -> InterpreterError {
        InterpreterError::UnknownItem {
            screen: self.current_screen_id().unwrap_or_default().to_string(),
            item: item_id.to_string(),
        }
    }

    fn layout(&self) -> Layout<'_> {
        Layout {
            store: &self.store,
            toggles: &self.toggles,
            interpolation: &self.interpolation,
            fonts: self.fonts.as_deref(),
            columns: self.columns,
        }
    }

    /// Render one item of the current screen at its reveal position.
    pub fn render(&self, item_id: &str) -> Result<RenderedItem, InterpreterError> {
        let item = self.current_item(item_id)?;
        let state = self.state(item_id).unwrap_or_default();
        let reveal = match state {
            LoadState::Done => None,
            LoadState::Active => self
                .run
                .as_ref()
                .and_then(|run| run.item(item_id))
                .map(|p| p.revealed),
            LoadState::Unloaded | LoadState::Ready => Some(0),
        };
        let sliced = self.layout().layout(item)?;
        Ok(RenderedItem {
            id: item.id.clone(),
            kind: item.kind_name(),
            class_name: item.class_name.clone(),
            state,
            slice: sliced.slice(reveal, self.cursor_glyph),
        })
    }

    /// Render every displayable item of the current screen.
    pub fn render_screen(&self) -> Result<Vec<RenderedItem>, InterpreterError> {
        let screen = self.current_screen().ok_or(InterpreterError::NoActiveScreen)?;
        screen
            .content
            .iter()
            .filter(|item| !matches!(item.kind, ContentKind::Variable { .. }))
            .map(|item| self.render(&item.id))
            .collect()
    }

    /// A countdown item's prompt and remaining time after `elapsed`.
    pub fn countdown(&self, item_id: &str, elapsed: Duration) -> Result<String, InterpreterError> {
        match &self.current_item(item_id)?.kind {
            ContentKind::Countdown(countdown) => Ok(countdown.display(elapsed)),
            _ => Err(self.unknown_item(item_id)),
        }
    }
}
