/// Content item lifecycle on an active screen.
///
/// Items move `Unloaded -> Ready -> Active -> Done`. Items that take part
/// in the reveal sequence activate one at a time in document order, each
/// only after the previous one is done. Items with `onLoad: false` are
/// done as soon as the screen starts. Progress only moves on explicit
/// ticks from the host, each carrying the time that passed.

use std::time::Duration;

use crate::schema::content::LoadState;

/// Characters visible once an item has been active for `elapsed`.
/// `speed` is the delay between characters in milliseconds; no speed, or
/// a speed of zero, reveals everything at once.
pub fn next_reveal_count(elapsed: Duration, length: usize, speed: Option<u32>) -> usize {
    match speed {
        Some(delay) if delay > 0 => {
            let shown = elapsed.as_millis() / u128::from(delay);
            usize::try_from(shown).unwrap_or(usize::MAX).min(length)
        }
        _ => length,
    }
}

/// Lifecycle transitions, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Ready(String),
    Activated(String),
    Revealed { id: String, count: usize },
    Done(String),
}

/// What the sequencer needs to know about an item up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealEntry {
    pub id: String,
    pub on_load: bool,
    pub speed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    pub id: String,
    pub state: LoadState,
    pub revealed: usize,
    pub length: usize,
    speed: Option<u32>,
    elapsed: Duration,
}

/// Reveal progress of every item on one screen.
#[derive(Debug, Clone)]
pub struct ScreenRun {
    screen_id: String,
    items: Vec<ItemProgress>,
    active: Option<usize>,
}

impl ScreenRun {
    /// Load a screen's items. Returns the run and the events for items
    /// becoming ready, plus `Done` for items outside the sequence. No item
    /// is active yet; call [`ScreenRun::advance`].
    pub fn start(
        screen_id: impl Into<String>,
        entries: impl IntoIterator<Item = RevealEntry>,
    ) -> (Self, Vec<LifecycleEvent>) {
        let mut events = Vec::new();
        let items = entries
            .into_iter()
            .map(|entry| {
                events.push(LifecycleEvent::Ready(entry.id.clone()));
                let state = if entry.on_load {
                    LoadState::Ready
                } else {
                    events.push(LifecycleEvent::Done(entry.id.clone()));
                    LoadState::Done
                };
                ItemProgress {
                    id: entry.id,
                    state,
                    revealed: 0,
                    length: 0,
                    speed: entry.speed,
                    elapsed: Duration::ZERO,
                }
            })
            .collect();
        let run = Self {
            screen_id: screen_id.into(),
            items,
            active: None,
        };
        (run, events)
    }

    pub fn screen_id(&self) -> &str {
        &self.screen_id
    }

    pub fn items(&self) -> &[ItemProgress] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&ItemProgress> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn state(&self, id: &str) -> Option<LoadState> {
        self.item(id).map(|item| item.state)
    }

    /// The item currently being revealed.
    pub fn active(&self) -> Option<&ItemProgress> {
        self.active.map(|i| &self.items[i])
    }

    pub fn is_done(&self) -> bool {
        self.items.iter().all(|item| item.state == LoadState::Done)
    }

    /// Activate pending items in order until one needs ticks to finish.
    ///
    /// `measure` is called as each item activates and returns its visible
    /// length, so text that depends on state changed by earlier items is
    /// measured after that change.
    pub fn advance<E>(
        &mut self,
        mut measure: impl FnMut(&str) -> Result<usize, E>,
    ) -> Result<Vec<LifecycleEvent>, E> {
        let mut events = Vec::new();
        while self.active.is_none() {
            let Some(index) = self
                .items
                .iter()
                .position(|item| item.state == LoadState::Ready)
            else {
                break;
            };
            let length = measure(&self.items[index].id)?;
            let item = &mut self.items[index];
            item.state = LoadState::Active;
            item.length = length;
            events.push(LifecycleEvent::Activated(item.id.clone()));

            if !matches!(item.speed, Some(step) if step > 0) || length == 0 {
                item.revealed = length;
                if length > 0 {
                    events.push(LifecycleEvent::Revealed {
                        id: item.id.clone(),
                        count: length,
                    });
                }
                item.state = LoadState::Done;
                events.push(LifecycleEvent::Done(item.id.clone()));
            } else {
                self.active = Some(index);
            }
        }
        Ok(events)
    }

    /// Move the active item's reveal on by `elapsed`. Time left over when
    /// the item finishes is dropped; activation of the next item is left
    /// to [`ScreenRun::advance`].
    pub fn tick(&mut self, elapsed: Duration) -> Vec<LifecycleEvent> {
        let Some(index) = self.active else {
            return Vec::new();
        };
        let item = &mut self.items[index];
        item.elapsed = item.elapsed.saturating_add(elapsed);
        item.revealed = next_reveal_count(item.elapsed, item.length, item.speed);
        let mut events = vec![LifecycleEvent::Revealed {
            id: item.id.clone(),
            count: item.revealed,
        }];
        if item.revealed >= item.length {
            item.state = LoadState::Done;
            events.push(LifecycleEvent::Done(item.id.clone()));
            self.active = None;
        }
        events
    }

    /// Reveal the active item completely.
    pub fn finish_active(&mut self) -> Vec<LifecycleEvent> {
        let Some(index) = self.active.take() else {
            return Vec::new();
        };
        let item = &mut self.items[index];
        item.revealed = item.length;
        item.state = LoadState::Done;
        vec![
            LifecycleEvent::Revealed {
                id: item.id.clone(),
                count: item.length,
            },
            LifecycleEvent::Done(item.id.clone()),
        ]
    }
}
