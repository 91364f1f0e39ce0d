/// Command dispatcher: matches typed input against a prompt's command
/// table and runs the winning command's action.

use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument, warn};

use crate::core::executor::{ActionError, ExecutionContext, Signal};
use crate::schema::action::Command;
use crate::schema::content::Prompt;

/// Reserved variable holding the raw text of the last matched command.
pub const LAST_COMMAND: &str = "_lastCommand";

/// A compiled command pattern.
///
/// Literal patterns compare case-insensitively against the trimmed input.
/// Regex patterns must match the whole trimmed input, case-insensitively.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(Vec<String>),
    Regex(Vec<Regex>),
}

impl Pattern {
    pub fn literal<S: AsRef<str>>(words: &[S]) -> Self {
        Self::Literal(words.iter().map(|w| w.as_ref().trim().to_lowercase()).collect())
    }

    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim();
        match self {
            Self::Literal(words) => {
                let folded = input.to_lowercase();
                words.iter().any(|w| *w == folded)
            }
            Self::Regex(patterns) => patterns.iter().any(|re| re.is_match(input)),
        }
    }
}

/// Compile a regex command pattern with full-match, case-insensitive
/// semantics.
pub fn compile_full_match(source: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i)^(?:{})$", source))
}

/// Result of dispatching one line of input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub matched: bool,
    pub signals: Vec<Signal>,
}

impl DispatchOutcome {
    pub fn unhandled() -> Self {
        Self::default()
    }

    /// The screen or dialog id the host should show next, if any. The
    /// last signal of the chain wins.
    pub fn target(&self) -> Option<&str> {
        self.signals.last().map(|s| match s {
            Signal::Navigate(id) | Signal::Dialog(id) => id.as_str(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    /// Compiled regexes keyed by pattern source. `None` marks a pattern
    /// that failed to compile.
    cache: FxHashMap<String, Option<Regex>>,
    meta_commands: Vec<Command>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that checks `meta_commands` before a screen's own
    /// table on prompts that allow it.
    pub fn with_meta_commands(meta_commands: Vec<Command>) -> Self {
        Self {
            cache: FxHashMap::default(),
            meta_commands,
        }
    }

    pub fn meta_commands(&self) -> &[Command] {
        &self.meta_commands
    }

    /// Build the pattern for a command, compiling regexes through the cache.
    pub fn pattern(&mut self, command: &Command) -> Pattern {
        pattern_for(&mut self.cache, command)
    }

    /// First command in `commands` whose pattern matches `input`.
    pub fn find<'c>(&mut self, commands: &'c [Command], input: &str) -> Option<&'c Command> {
        find_in(&mut self.cache, commands, input)
    }

    /// Match `input` against the prompt and run the winning action.
    ///
    /// The raw input is written to `_lastCommand` before the action runs.
    /// Unmatched input is not an error.
    #[instrument(skip(self, ctx, prompt))]
    pub fn dispatch(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        prompt: &Prompt,
        input: &str,
    ) -> Result<DispatchOutcome, ActionError> {
        let meta = if prompt.allow_meta_commands {
            find_in(&mut self.cache, &self.meta_commands, input)
        } else {
            None
        };
        let Some(command) = meta.or_else(|| find_in(&mut self.cache, &prompt.commands, input))
        else {
            debug!("no command matched");
            return Ok(DispatchOutcome::unhandled());
        };

        info!(pattern = ?command.command.patterns(), "command matched");
        ctx.store.set(LAST_COMMAND, input);
        let signals = ctx.apply(&command.action, Some(input))?;
        Ok(DispatchOutcome {
            matched: true,
            signals,
        })
    }
}

fn find_in<'c>(
    cache: &mut FxHashMap<String, Option<Regex>>,
    commands: &'c [Command],
    input: &str,
) -> Option<&'c Command> {
    commands
        .iter()
        .find(|command| pattern_for(cache, command).matches(input))
}

fn pattern_for(cache: &mut FxHashMap<String, Option<Regex>>, command: &Command) -> Pattern {
    let sources = command.command.patterns();
    if !command.allow_regex {
        return Pattern::literal(sources);
    }
    let compiled = sources
        .iter()
        .filter_map(|source| {
            cache
                .entry(source.clone())
                .or_insert_with(|| match compile_full_match(source) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = %source, error = %e, "command pattern does not compile");
                        None
                    }
                })
                .clone()
        })
        .collect();
    Pattern::Regex(compiled)
}
