/// Incremental reveal slicer.
///
/// Formatted text may carry single-level `{class:content}` styled runs.
/// A [`SlicedText`] parses them once; each reveal step then splits the
/// plain characters into revealed markup, a cursor glyph and a hidden
/// tail without re-parsing.

use crate::core::format::{render, FormatError, RenderContext};
use crate::schema::content::TextOptions;

/// Glyph shown as the cursor once everything is revealed.
pub const DEFAULT_CURSOR: char = '.';

/// A parsed run of formatted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(Vec<char>),
    Styled { class: String, text: Vec<char> },
}

impl Segment {
    fn chars(&self) -> &[char] {
        match self {
            Self::Plain(text) | Self::Styled { text, .. } => text,
        }
    }
}

/// The three parts of a partially revealed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceResult {
    /// Escaped markup for the revealed prefix, styled runs wrapped in
    /// `<span class="...">`.
    pub revealed: String,
    /// The glyph just after the reveal point, unescaped.
    pub cursor: char,
    /// Escaped plain text after the cursor, without styling.
    pub hidden: String,
}

fn is_valid_class(class: &str) -> bool {
    !class.is_empty() && !class.contains(['"', '\'', '<', '>'])
}

/// Split text into plain and styled segments.
///
/// A `{class:content}` token needs a closing brace, a colon and a class
/// name free of quotes and angle brackets. Anything else is plain text.
pub fn parse_segments(s: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut rest = s;

    loop {
        let Some(open) = rest.find('{') else {
            buffer.push_str(rest);
            break;
        };
        buffer.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            buffer.push_str(&rest[open..]);
            break;
        };
        let inside = &after_open[..close];
        let token = &rest[open..open + close + 2];
        rest = &after_open[close + 1..];

        let Some((class, content)) = inside.split_once(':') else {
            buffer.push_str(token);
            continue;
        };
        let class = class.trim();
        if !is_valid_class(class) {
            buffer.push_str(token);
            continue;
        }

        if !buffer.is_empty() {
            segments.push(Segment::Plain(buffer.chars().collect()));
            buffer.clear();
        }
        segments.push(Segment::Styled {
            class: class.to_string(),
            text: content.chars().collect(),
        });
    }

    if !buffer.is_empty() {
        segments.push(Segment::Plain(buffer.chars().collect()));
    }
    segments
}

fn push_escaped(out: &mut String, c: char, preserve_spacing: bool) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        ' ' if preserve_spacing => out.push_str("&nbsp;"),
        _ => out.push(c),
    }
}

/// HTML-escape text. With `preserve_spacing` spaces become `&nbsp;`.
pub fn escape_html(chars: &[char], preserve_spacing: bool) -> String {
    let mut out = String::with_capacity(chars.len());
    for &c in chars {
        push_escaped(&mut out, c, preserve_spacing);
    }
    out
}

/// Keep only characters safe inside a class attribute.
pub fn escape_attr(class: &str) -> String {
    class
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect()
}

/// Formatted text, segmented once, ready to be sliced at any reveal count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicedText {
    segments: Vec<Segment>,
    plain: Vec<char>,
    preserve_spacing: bool,
}

impl SlicedText {
    pub fn new(formatted: &str, preserve_spacing: bool, is_password: bool) -> Self {
        let mut segments = parse_segments(formatted);
        if is_password {
            for segment in &mut segments {
                let chars = match segment {
                    Segment::Plain(text) | Segment::Styled { text, .. } => text,
                };
                for c in chars.iter_mut().filter(|c| **c != '\n') {
                    *c = '*';
                }
            }
        }
        let plain = segments.iter().flat_map(|s| s.chars().iter().copied()).collect();
        Self {
            segments,
            plain,
            preserve_spacing,
        }
    }

    pub fn from_options(formatted: &str, opts: &TextOptions) -> Self {
        Self::new(formatted, opts.keeps_spacing(), opts.is_password)
    }

    /// Number of visible characters.
    pub fn len(&self) -> usize {
        self.plain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The visible text without styling or escaping.
    pub fn plain(&self) -> String {
        self.plain.iter().collect()
    }

    /// Split at `reveal_count` visible characters (everything when
    /// `None`). The count is clamped to the text length.
    pub fn slice(&self, reveal_count: Option<usize>, cursor_fallback: char) -> SliceResult {
        let upto = reveal_count.unwrap_or(self.plain.len()).min(self.plain.len());

        let mut remaining = upto;
        let mut revealed = String::new();
        for segment in &self.segments {
            if remaining == 0 {
                break;
            }
            let chars = segment.chars();
            let take = &chars[..remaining.min(chars.len())];
            remaining -= take.len();
            match segment {
                Segment::Plain(_) => revealed.push_str(&escape_html(take, self.preserve_spacing)),
                Segment::Styled { class, .. } if !take.is_empty() => {
                    revealed.push_str("<span class=\"");
                    revealed.push_str(&escape_attr(class));
                    revealed.push_str("\">");
                    revealed.push_str(&escape_html(take, self.preserve_spacing));
                    revealed.push_str("</span>");
                }
                Segment::Styled { .. } => {}
            }
        }

        let cursor = self.plain.get(upto).copied().unwrap_or(cursor_fallback);
        let hidden = match self.plain.get(upto + 1..) {
            Some(tail) => escape_html(tail, self.preserve_spacing),
            None => String::new(),
        };
        SliceResult {
            revealed,
            cursor,
            hidden,
        }
    }
}

/// Interpolate and format `text`, then slice it at `reveal_count`.
pub fn slice(
    text: &str,
    columns: usize,
    opts: &TextOptions,
    reveal_count: Option<usize>,
    cx: &RenderContext<'_>,
) -> Result<SliceResult, FormatError> {
    let formatted = render(text, columns, opts, cx)?;
    Ok(SlicedText::from_options(&formatted, opts).slice(reveal_count, DEFAULT_CURSOR))
}
