//! WASM bindings for phosphor-engine: drive a terminal document from a browser host.

use std::time::Duration;
use wasm_bindgen::prelude::*;

use phosphor_engine::core::reveal::LifecycleEvent;
use phosphor_engine::core::store::Snapshot;
use phosphor_engine::schema::content::LoadState;
use phosphor_engine::{Document, Interpreter, InterpreterConfig};

// ---------------------------------------------------------------------------
// Embedded demo document: compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const AIRLOCK: &str = include_str!("../../demos/airlock.json");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct EventInfo {
    kind: &'static str,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemInfo {
    id: String,
    kind: &'static str,
    class_name: Option<String>,
    state: LoadState,
    revealed: String,
    cursor: String,
    hidden: String,
}

#[derive(serde::Serialize)]
struct OutcomeInfo {
    matched: bool,
    target: Option<String>,
    screen: Option<String>,
}

#[derive(serde::Serialize)]
struct DialogInfo {
    id: String,
    kind: String,
    content: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn event_info(event: LifecycleEvent) -> EventInfo {
    match event {
        LifecycleEvent::Ready(id) => EventInfo {
            kind: "ready",
            id,
            count: None,
        },
        LifecycleEvent::Activated(id) => EventInfo {
            kind: "activated",
            id,
            count: None,
        },
        LifecycleEvent::Revealed { id, count } => EventInfo {
            kind: "revealed",
            id,
            count: Some(count),
        },
        LifecycleEvent::Done(id) => EventInfo {
            kind: "done",
            id,
            count: None,
        },
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn events_json(events: Vec<LifecycleEvent>) -> Result<String, JsError> {
    let events: Vec<EventInfo> = events.into_iter().map(event_info).collect();
    to_json(&events)
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// PhosphorTerminal: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct PhosphorTerminal {
    interpreter: Interpreter,
}

#[wasm_bindgen]
impl PhosphorTerminal {
    /// Load a document from JSON. `seed` fixes rule-generated values.
    #[wasm_bindgen(constructor)]
    pub fn new(document_json: &str, columns: usize, seed: u64) -> Result<PhosphorTerminal, JsError> {
        let document =
            Document::parse_json(document_json).map_err(|e| js_error("Document parse error", e))?;
        let interpreter = Interpreter::builder()
            .document(document)
            .config(InterpreterConfig {
                columns,
                seed: Some(seed),
                ..InterpreterConfig::default()
            })
            .build()
            .map_err(|e| js_error("Interpreter build error", e))?;
        Ok(PhosphorTerminal { interpreter })
    }

    /// The bundled airlock document.
    pub fn demo(columns: usize, seed: u64) -> Result<PhosphorTerminal, JsError> {
        Self::new(data::AIRLOCK, columns, seed)
    }

    /// Show the start screen. Returns the lifecycle events as a JSON array.
    pub fn start(&mut self) -> Result<String, JsError> {
        let events = self
            .interpreter
            .start()
            .map_err(|e| js_error("Start error", e))?;
        events_json(events)
    }

    /// Advance the reveal by the time since the last frame. Call from the
    /// host's frame timer.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<String, JsError> {
        let events = self
            .interpreter
            .tick_by(Duration::from_millis(elapsed_ms))
            .map_err(|e| js_error("Tick error", e))?;
        events_json(events)
    }

    /// Finish the current reveal at once.
    pub fn skip(&mut self) -> Result<String, JsError> {
        let events = self
            .interpreter
            .skip_reveal()
            .map_err(|e| js_error("Skip error", e))?;
        events_json(events)
    }

    /// Send typed input to the current screen's prompt.
    ///
    /// Returns JSON: `{ "matched": true, "target": "menu", "screen": "menu" }`.
    pub fn submit(&mut self, input: &str) -> Result<String, JsError> {
        let outcome = self
            .interpreter
            .submit(input)
            .map_err(|e| js_error("Command error", e))?;
        to_json(&OutcomeInfo {
            matched: outcome.matched,
            target: outcome.target().map(str::to_string),
            screen: self.interpreter.current_screen_id().map(str::to_string),
        })
    }

    /// Follow a link item on the current screen.
    pub fn follow_link(&mut self, item_id: &str, shift: bool) -> Result<(), JsError> {
        self.interpreter
            .follow_link(item_id, shift)
            .map(drop)
            .map_err(|e| js_error("Link error", e))
    }

    /// Cycle a toggle item. Returns the new state index, or -1 for an unknown id.
    pub fn flip_toggle(&mut self, item_id: &str) -> i32 {
        self.interpreter
            .flip_toggle(item_id)
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1)
    }

    /// The current screen's items at their reveal positions, as JSON.
    pub fn render_screen(&self) -> Result<String, JsError> {
        let items: Vec<ItemInfo> = self
            .interpreter
            .render_screen()
            .map_err(|e| js_error("Render error", e))?
            .into_iter()
            .map(|item| ItemInfo {
                id: item.id,
                kind: item.kind,
                class_name: item.class_name,
                state: item.state,
                revealed: item.slice.revealed,
                cursor: item.slice.cursor.to_string(),
                hidden: item.slice.hidden,
            })
            .collect();
        to_json(&items)
    }

    pub fn current_screen(&self) -> Option<String> {
        self.interpreter.current_screen_id().map(str::to_string)
    }

    /// The open dialog as JSON, or `null`.
    pub fn dialog(&self) -> Result<String, JsError> {
        let info = self.interpreter.dialog().map(|d| DialogInfo {
            id: d.id.clone(),
            kind: format!("{:?}", d.kind).to_lowercase(),
            content: d.content.clone(),
        });
        to_json(&info)
    }

    pub fn dismiss_dialog(&mut self) -> Option<String> {
        self.interpreter.dismiss_dialog()
    }

    /// Change the column budget. Returns the effective, clamped value.
    pub fn set_columns(&mut self, columns: usize) -> usize {
        self.interpreter.set_columns(columns)
    }

    /// A countdown item's display after `elapsed_ms` milliseconds.
    pub fn countdown(&self, item_id: &str, elapsed_ms: u64) -> Result<String, JsError> {
        self.interpreter
            .countdown(item_id, Duration::from_millis(elapsed_ms))
            .map_err(|e| js_error("Countdown error", e))
    }

    /// Every variable as a JSON object, for saving.
    pub fn snapshot(&self) -> Result<String, JsError> {
        self.interpreter
            .snapshot()
            .to_json()
            .map_err(|e| js_error("Snapshot error", e))
    }

    /// Merge a saved JSON snapshot back into the variables.
    pub fn restore(&mut self, snapshot_json: &str) -> Result<(), JsError> {
        let snapshot =
            Snapshot::from_json(snapshot_json).map_err(|e| js_error("Snapshot parse error", e))?;
        self.interpreter.restore(&snapshot);
        Ok(())
    }

    /// Document-level presentation settings as JSON.
    pub fn document_config(&self) -> Result<String, JsError> {
        to_json(&self.interpreter.document().config)
    }
}
