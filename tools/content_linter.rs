/// Content Linter: checks a content document for broken references.
///
/// Usage: content_linter <document.json> [--strict]
///
/// Errors: links and dialogs to missing ids, toggles that do not exist,
/// regex commands that do not compile, rules that cannot generate, and
/// action kinds the interpreter does not know. Warnings: variables read
/// but never declared or assigned, unreachable screens, empty prompts.
/// With `--strict` warnings fail the run too.

use phosphor_engine::core::dispatch::{compile_full_match, LAST_COMMAND};
use phosphor_engine::core::format::placeholders;
use phosphor_engine::core::rule;
use phosphor_engine::schema::action::{Action, Command, SingleAction, VariableOp};
use phosphor_engine::schema::content::{ContentItem, ContentKind};
use phosphor_engine::schema::document::Document;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::process;

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: content_linter <document.json> [--strict]");
        process::exit(0);
    }

    let document_path = &args[1];
    let strict = args[2..].iter().any(|a| a == "--strict");

    let document = match Document::load_from_json(Path::new(document_path)) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("ERROR: Failed to load document: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded '{}': {} screens, {} dialogs, {} variables",
        document.metadata.title,
        document.screens.len(),
        document.dialogs.len(),
        document.variables.len()
    );

    let report = lint_document(&document);

    println!("\n=== Content Lint Report ===\n");

    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    if report.errors.is_empty() && !(strict && !report.warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

/// Names a document declares or writes somewhere.
fn known_variables(document: &Document) -> HashSet<String> {
    let mut known: HashSet<String> = document.variables.iter().map(|v| v.id.clone()).collect();
    known.insert(LAST_COMMAND.to_string());

    fn collect(action: &Action, known: &mut HashSet<String>) {
        for step in action.steps() {
            match step {
                SingleAction::Variable { target, .. } => {
                    known.insert(target.clone());
                }
                SingleAction::Condition {
                    when_true,
                    when_false,
                    ..
                } => {
                    collect(when_true, known);
                    collect(when_false, known);
                }
                _ => {}
            }
        }
    }

    for item in document.screens.iter().flat_map(|s| s.content.iter()) {
        match &item.kind {
            ContentKind::Variable { target, .. } => {
                known.insert(target.clone());
            }
            ContentKind::Link { actions, .. } => {
                collect(&actions.base, &mut known);
                if let Some(shift) = &actions.shift {
                    collect(shift, &mut known);
                }
            }
            ContentKind::Prompt(prompt) => {
                for command in &prompt.commands {
                    collect(&command.action, &mut known);
                }
            }
            _ => {}
        }
    }
    known
}

struct Linter<'a> {
    document: &'a Document,
    known: HashSet<String>,
    toggles: HashSet<&'a str>,
    rng: StdRng,
    report: Report,
}

fn lint_document(document: &Document) -> Report {
    let mut linter = Linter {
        document,
        known: known_variables(document),
        toggles: document.toggles().map(|(id, _)| id).collect(),
        rng: StdRng::seed_from_u64(0),
        report: Report::default(),
    };

    for screen in &document.screens {
        for item in &screen.content {
            linter.lint_item(&screen.id, item);
        }
    }

    for screen in unreachable_screens(document) {
        linter
            .report
            .warnings
            .push(format!("Screen '{}' is unreachable from the start screen", screen));
    }

    linter.report
}

impl Linter<'_> {
    fn lint_item(&mut self, screen: &str, item: &ContentItem) {
        let at = format!("{}/{}", screen, item.id);
        match &item.kind {
            ContentKind::Text { text, .. } => self.lint_placeholders(&at, text),
            ContentKind::Link { text, actions, .. } => {
                self.lint_placeholders(&at, text);
                self.lint_action(&at, &actions.base);
                if let Some(shift) = &actions.shift {
                    self.lint_action(&at, shift);
                }
            }
            ContentKind::Toggle { states, .. } => {
                if states.is_empty() {
                    self.report
                        .errors
                        .push(format!("{}: toggle has no states", at));
                }
                for state in states {
                    self.lint_placeholders(&at, &state.text);
                }
            }
            ContentKind::Prompt(prompt) => {
                if prompt.commands.is_empty() && !prompt.allow_meta_commands {
                    self.report
                        .warnings
                        .push(format!("{}: prompt has no commands", at));
                }
                for command in &prompt.commands {
                    self.lint_command(&at, command);
                }
            }
            ContentKind::Variable { target, context } => {
                self.lint_action(
                    &at,
                    &Action::Single(SingleAction::Variable {
                        target: target.clone(),
                        context: context.clone(),
                    }),
                );
            }
            ContentKind::Bitmap { .. } | ContentKind::Countdown(_) => {}
        }
    }

    fn lint_command(&mut self, at: &str, command: &Command) {
        if command.allow_regex {
            for pattern in command.command.patterns() {
                if let Err(e) = compile_full_match(pattern) {
                    self.report.errors.push(format!(
                        "{}: command pattern '{}' does not compile: {}",
                        at, pattern, e
                    ));
                }
            }
        }
        self.lint_action(at, &command.action);
    }

    fn lint_action(&mut self, at: &str, action: &Action) {
        for step in action.steps() {
            match step {
                SingleAction::Link { target, .. } => {
                    if self.document.screen(target).is_none() {
                        self.report
                            .errors
                            .push(format!("{}: link to missing screen '{}'", at, target));
                    }
                }
                SingleAction::Dialog { target } => {
                    if self.document.dialog(target).is_none() {
                        self.report
                            .errors
                            .push(format!("{}: missing dialog '{}'", at, target));
                    }
                }
                SingleAction::Toggle { target } => {
                    if !self.toggles.contains(target.as_str()) {
                        self.report
                            .errors
                            .push(format!("{}: no toggle item '{}'", at, target));
                    }
                }
                SingleAction::Variable { target, context } => match &context.action {
                    VariableOp::Unsupported(kind) => {
                        self.report.errors.push(format!(
                            "{}: unknown variable action '{}' on '{}'",
                            at, kind, target
                        ));
                    }
                    VariableOp::Set if context.value.is_none() => {
                        if let Some(r) = &context.rule {
                            if let Err(e) = rule::generate(r, &mut self.rng) {
                                self.report.errors.push(format!("{}: {}", at, e));
                            }
                        }
                    }
                    _ => {}
                },
                SingleAction::Condition {
                    condition,
                    when_true,
                    when_false,
                } => {
                    for name in condition.variables() {
                        if !self.known.contains(name) {
                            self.report.warnings.push(format!(
                                "{}: condition reads '{}', which is never declared or set",
                                at, name
                            ));
                        }
                    }
                    self.lint_action(at, when_true);
                    self.lint_action(at, when_false);
                }
                SingleAction::Unknown => {
                    self.report
                        .errors
                        .push(format!("{}: unknown action type", at));
                }
            }
        }
    }

    fn lint_placeholders(&mut self, at: &str, text: &str) {
        let missing: BTreeSet<&str> = placeholders(text)
            .into_iter()
            .filter(|name| !self.known.contains(*name))
            .collect();
        for name in missing {
            self.report.warnings.push(format!(
                "{}: placeholder '{{{{{}}}}}' names a variable that is never declared or set",
                at, name
            ));
        }
    }
}

/// Screens no link or command chain leads to, starting from the first.
fn unreachable_screens(document: &Document) -> Vec<String> {
    fn targets(action: &Action, out: &mut Vec<String>) {
        for step in action.steps() {
            match step {
                SingleAction::Link { target, .. } => out.push(target.clone()),
                SingleAction::Condition {
                    when_true,
                    when_false,
                    ..
                } => {
                    targets(when_true, out);
                    targets(when_false, out);
                }
                _ => {}
            }
        }
    }

    let Some(start) = document.start_screen() else {
        return Vec::new();
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::from([start.id.as_str()]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let Some(screen) = document.screen(id) else {
            continue;
        };
        let mut next = Vec::new();
        for item in &screen.content {
            match &item.kind {
                ContentKind::Link { actions, .. } => {
                    targets(&actions.base, &mut next);
                    if let Some(shift) = &actions.shift {
                        targets(shift, &mut next);
                    }
                }
                ContentKind::Prompt(prompt) => {
                    for command in &prompt.commands {
                        targets(&command.action, &mut next);
                    }
                }
                _ => {}
            }
        }
        for target in next {
            if let Some(screen) = document.screen(&target) {
                queue.push_back(screen.id.as_str());
            }
        }
    }

    document
        .screens
        .iter()
        .filter(|s| !seen.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect()
}
