/// Text formatter: variable interpolation, word-wrap, alignment and the
/// margin/border/padding layers around each line.
///
/// Widths are counted in characters; the display is assumed monospace.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::store::VariableStore;
use crate::schema::content::{Align, TextOptions};
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("missing variable: {0}")]
    MissingVariable(String),
}

/// `\{{` escape or a `{{ name }}` placeholder.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\\{\{|\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}")
        .expect("placeholder regex must compile")
});

/// What to do with a placeholder naming an unset variable.
pub enum MissingPolicy {
    /// Keep the placeholder text, normalized to `{{name}}`.
    Leave,
    Empty,
    Fail,
    Resolve(Box<dyn Fn(&str) -> String>),
}

impl fmt::Debug for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leave => f.write_str("Leave"),
            Self::Empty => f.write_str("Empty"),
            Self::Fail => f.write_str("Fail"),
            Self::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

/// Serializable subset of [`MissingPolicy`], for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MissingMode {
    #[default]
    Leave,
    Empty,
    Fail,
}

impl From<MissingMode> for MissingPolicy {
    fn from(mode: MissingMode) -> Self {
        match mode {
            MissingMode::Leave => Self::Leave,
            MissingMode::Empty => Self::Empty,
            MissingMode::Fail => Self::Fail,
        }
    }
}

type Stringify = Box<dyn Fn(&Value, &str) -> String>;

pub struct InterpolationOptions {
    pub on_missing: MissingPolicy,
    /// Turns a resolved value into text. Receives the value and the
    /// variable name. Defaults to the value's display form.
    pub stringify: Option<Stringify>,
}

impl Default for InterpolationOptions {
    fn default() -> Self {
        Self::new(MissingPolicy::Leave)
    }
}

impl fmt::Debug for InterpolationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpolationOptions")
            .field("on_missing", &self.on_missing)
            .field("stringify", &self.stringify.as_ref().map(|_| ".."))
            .finish()
    }
}

impl InterpolationOptions {
    pub fn new(on_missing: MissingPolicy) -> Self {
        Self {
            on_missing,
            stringify: None,
        }
    }

    pub fn with_stringify(mut self, stringify: impl Fn(&Value, &str) -> String + 'static) -> Self {
        self.stringify = Some(Box::new(stringify));
        self
    }
}

/// Replace `{{name}}` placeholders with variable values. `\{{` yields a
/// literal `{{`.
pub fn interpolate(
    text: &str,
    store: &VariableStore,
    options: &InterpolationOptions,
) -> Result<String, FormatError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            out.push_str("{{");
            continue;
        };
        match store.get(name) {
            Some(value) => match &options.stringify {
                Some(stringify) => out.push_str(&stringify(value, name)),
                None => out.push_str(&value.to_string()),
            },
            None => match &options.on_missing {
                MissingPolicy::Leave => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
                MissingPolicy::Empty => {}
                MissingPolicy::Fail => return Err(FormatError::MissingVariable(name.to_string())),
                MissingPolicy::Resolve(resolve) => out.push_str(&resolve(name)),
            },
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Names referenced by `{{name}}` placeholders, in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Break text into lines of at most `columns` characters.
///
/// Existing newlines are kept. An overlong line breaks at its last space
/// within the limit, or hard at `columns` when there is none; the
/// remainder is left-trimmed. With zero columns lines come back as-is.
pub fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.split('\n') {
        let mut rest: Vec<char> = line.chars().collect();
        if columns == 0 || rest.len() <= columns {
            out.push(line.to_string());
            continue;
        }
        while rest.len() > columns {
            let cut = rest[..columns]
                .iter()
                .rposition(|&c| c == ' ')
                .unwrap_or(columns);
            out.push(rest[..cut].iter().collect());
            let skip = rest[cut..].iter().take_while(|c| c.is_whitespace()).count();
            rest.drain(..cut + skip);
        }
        if !rest.is_empty() {
            out.push(rest.into_iter().collect());
        }
    }
    out
}

fn repeat(c: char, n: usize) -> String {
    std::iter::repeat(c).take(n).collect()
}

/// Align one line within `columns`.
///
/// Center puts the smaller half of the slack on the left. Trailing fill
/// is only written when `fill` is visible or `fill_line` forces it, so
/// plain left-aligned text carries no trailing blanks.
pub fn align(line: &str, columns: usize, align: Align, fill: char, fill_line: bool) -> String {
    let len = line.chars().count();
    if len >= columns {
        return line.to_string();
    }
    let space = columns - len;
    let trailing = fill != ' ' || fill_line;
    match align {
        Align::Left => {
            let mut out = line.to_string();
            if trailing {
                out.push_str(&repeat(fill, space));
            }
            out
        }
        Align::Center => {
            let left = space / 2;
            let mut out = repeat(fill, left);
            out.push_str(line);
            if trailing {
                out.push_str(&repeat(fill, space - left));
            }
            out
        }
        Align::Right => {
            let mut out = repeat(fill, space);
            out.push_str(line);
            out
        }
    }
}

/// Lay out text for a column budget.
///
/// Each line is `margin | border | padding | aligned text | padding |
/// border | margin`. Without any of the outer layers this is plain
/// wrap-then-align. `fillWidth` repeats the text across the inner width
/// instead of wrapping it. When the layers leave no room, the result is
/// a single blank line of the full width.
pub fn format(text: &str, columns: usize, opts: &TextOptions) -> String {
    let border = opts.border_char();
    let border_width = if border.is_some() { 2 } else { 0 };
    let chrome = 2 * opts.margin + border_width + 2 * opts.padding;
    if chrome >= columns && (chrome > 0 || opts.fill_width) {
        return repeat(' ', columns);
    }
    let inner = columns - chrome;

    let fill = opts.fill_char().or(opts.pad_char()).unwrap_or(' ');
    let fill_line = chrome > 0;
    let margin = repeat(opts.margin_char().unwrap_or(' '), opts.margin);
    let padding = repeat(opts.pad_char().unwrap_or(' '), opts.padding);
    let border: String = border.map(String::from).unwrap_or_default();

    let lines: Vec<String> = if opts.fill_width {
        vec![text.chars().cycle().take(inner).collect()]
    } else if opts.keeps_spacing() {
        text.split('\n').map(str::to_string).collect()
    } else {
        wrap(text, inner)
    };

    let mut out = Vec::with_capacity(lines.len());
    for line in &lines {
        let aligned = align(line, inner, opts.align, fill, fill_line);
        out.push(format!(
            "{margin}{border}{padding}{aligned}{padding}{border}{margin}"
        ));
    }
    out.join("\n")
}

/// Host-supplied renderer for big ASCII-art fonts.
pub trait BigFontRenderer {
    /// Render `text` in `font`, or `None` if the font is unavailable.
    fn render(&self, text: &str, font: &str) -> Option<String>;
}

/// Everything the formatter reads besides the text itself.
pub struct RenderContext<'a> {
    pub store: &'a VariableStore,
    pub interpolation: &'a InterpolationOptions,
    pub fonts: Option<&'a dyn BigFontRenderer>,
}

/// Interpolate, apply the big font if any, then format.
pub fn render(
    text: &str,
    columns: usize,
    opts: &TextOptions,
    cx: &RenderContext<'_>,
) -> Result<String, FormatError> {
    let expanded = interpolate(text, cx.store, cx.interpolation)?;
    let art = match (&opts.big_font, cx.fonts) {
        (Some(font), Some(fonts)) => fonts.render(&expanded, font),
        _ => None,
    };
    Ok(format(art.as_deref().unwrap_or(&expanded), columns, opts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> TextOptions {
        TextOptions::default()
    }

    #[test]
    fn placeholder_names_skip_escapes() {
        assert_eq!(
            placeholders("{{ a }} and \\{{b}} then {{c.d}}"),
            vec!["a", "c.d"]
        );
        assert!(placeholders("no slots").is_empty());
    }

    #[test]
    fn wrap_breaks_at_last_space() {
        assert_eq!(
            wrap("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("one\ntwo three", 5), vec!["one", "two", "three"]);
        assert_eq!(wrap("", 5), vec![""]);
    }

    #[test]
    fn wrap_never_exceeds_columns() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
                    eiusmod tempor incididunt ut labore et dolore magna aliqua. \
                    Supercalifragilisticexpialidocious is long.";
        for cols in 1..40 {
            for line in wrap(text, cols) {
                assert!(line.chars().count() <= cols, "{:?} exceeds {}", line, cols);
            }
        }
    }

    #[test]
    fn wrap_zero_columns_is_identity() {
        assert_eq!(wrap("a b\nc", 0), vec!["a b", "c"]);
    }

    #[test]
    fn center_puts_smaller_half_left() {
        assert_eq!(align("ab", 7, Align::Center, '*', false), "**ab***");
        assert_eq!(align("ab", 7, Align::Center, ' ', false), "  ab");
        assert_eq!(align("ab", 7, Align::Center, ' ', true), "  ab   ");
        assert_eq!(align("ab", 5, Align::Right, ' ', false), "   ab");
        assert_eq!(align("ab", 5, Align::Left, '=', false), "ab===");
        assert_eq!(align("ab", 5, Align::Left, ' ', false), "ab");
        assert_eq!(align("abcdef", 5, Align::Right, ' ', false), "abcdef");
    }

    #[test]
    fn fill_width_is_exact() {
        for cols in 1..30 {
            for text in ["-", "=+", "abc def"] {
                let out = format(text, cols, &TextOptions::fill_width());
                assert_eq!(out.chars().count(), cols);
            }
        }
        assert_eq!(format("-=", 5, &TextOptions::fill_width()), "-=-=-");
    }

    #[test]
    fn format_wraps_then_aligns() {
        let mut o = TextOptions::aligned(Align::Right);
        assert_eq!(format("hello world", 8, &o), "   hello\n   world");
        o.align = Align::Center;
        o.pad_char = Some("-".to_string());
        assert_eq!(format("hi", 7, &o), "--hi---");
    }

    #[test]
    fn layered_border_margin_padding() {
        let o = TextOptions {
            margin: 1,
            padding: 1,
            border_char: Some("|".to_string()),
            margin_char: Some(".".to_string()),
            ..opts()
        };
        // inner width = 14 - 2 - 2 - 2 = 8
        assert_eq!(format("hi", 14, &o), ".| hi       |.");
        assert_eq!(
            format("one two three", 14, &o),
            ".| one two  |.\n.| three    |."
        );
    }

    #[test]
    fn layered_fill_char_and_center() {
        let o = TextOptions {
            border_char: Some("#".to_string()),
            fill_char: Some("~".to_string()),
            align: Align::Center,
            ..opts()
        };
        assert_eq!(format("ab", 9, &o), "#~~ab~~~#");
    }

    #[test]
    fn no_room_yields_blank_line() {
        let o = TextOptions {
            margin: 3,
            border_char: Some("|".to_string()),
            ..opts()
        };
        assert_eq!(format("text", 8, &o), "        ");
    }

    #[test]
    fn preserve_spacing_skips_wrap() {
        let o = TextOptions {
            preserve_spacing: true,
            ..opts()
        };
        assert_eq!(format("a   b   c", 3, &o), "a   b   c");
    }

    #[test]
    fn interpolation_policies() {
        let mut store = VariableStore::new();
        store.set("name", "Sonya");
        store.set("count", 3);

        let leave = InterpolationOptions::default();
        assert_eq!(
            interpolate("Hi {{ name }}, {{count}} left, {{ ghost }}", &store, &leave).unwrap(),
            "Hi Sonya, 3 left, {{ghost}}"
        );

        let empty = InterpolationOptions::new(MissingPolicy::Empty);
        assert_eq!(interpolate("[{{ghost}}]", &store, &empty).unwrap(), "[]");

        let fail = InterpolationOptions::new(MissingPolicy::Fail);
        assert!(matches!(
            interpolate("{{ghost}}", &store, &fail),
            Err(FormatError::MissingVariable(ref n)) if n == "ghost"
        ));

        let resolve = InterpolationOptions::new(MissingPolicy::Resolve(Box::new(|n: &str| {
            format!("<{}?>", n)
        })));
        assert_eq!(interpolate("{{ghost}}", &store, &resolve).unwrap(), "<ghost?>");
    }

    #[test]
    fn escaped_placeholder_is_literal() {
        let mut store = VariableStore::new();
        store.set("name", "Sonya");
        let fail = InterpolationOptions::new(MissingPolicy::Fail);
        assert_eq!(
            interpolate(r"\{{name}} is {{name}}", &store, &fail).unwrap(),
            "{{name}} is Sonya"
        );
    }

    #[test]
    fn custom_stringify() {
        let mut store = VariableStore::new();
        store.set("armed", true);
        let o = InterpolationOptions::default()
            .with_stringify(|v, _| if v.is_truthy() { "YES".into() } else { "NO".into() });
        assert_eq!(interpolate("armed: {{armed}}", &store, &o).unwrap(), "armed: YES");
    }

    struct Shouty;

    impl BigFontRenderer for Shouty {
        fn render(&self, text: &str, font: &str) -> Option<String> {
            (font == "block").then(|| format!("{}\n{}", text.to_uppercase(), "^".repeat(text.len())))
        }
    }

    #[test]
    fn render_interpolates_before_measuring() {
        let mut store = VariableStore::new();
        store.set("who", "operator");
        let interpolation = InterpolationOptions::default();
        let cx = RenderContext {
            store: &store,
            interpolation: &interpolation,
            fonts: Some(&Shouty),
        };
        let o = TextOptions::aligned(Align::Right);
        assert_eq!(render("{{who}}", 10, &o, &cx).unwrap(), "  operator");

        let big = TextOptions {
            big_font: Some("block".to_string()),
            ..opts()
        };
        assert_eq!(render("hi you", 3, &big, &cx).unwrap(), "HI YOU\n^^^^^^");
    }
}
