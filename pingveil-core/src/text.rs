//! Tag-style markup for static MOTDs.
//!
//! Supports the subset of MiniMessage that makes sense in a server list:
//! named and hex colors (`<red>`, `<#ff5555>`, `<color:gold>`), decorations
//! (`<bold>`/`<b>`, `<italic>`/`<i>`/`<em>`, `<underlined>`/`<u>`,
//! `<strikethrough>`/`<st>`, `<obfuscated>`/`<obf>`) with `<!bold>` negation,
//! closing tags, `<reset>`, `<newline>`/`<br>`, and `\<` escapes. Unknown tags
//! are kept as literal text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const NAMED_COLORS: &[&str] = &[
    "black",
    "dark_blue",
    "dark_green",
    "dark_aqua",
    "dark_red",
    "dark_purple",
    "gold",
    "gray",
    "dark_gray",
    "blue",
    "green",
    "aqua",
    "red",
    "light_purple",
    "yellow",
    "white",
];

/// A chat component as it appears in the status JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlined: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfuscated: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<TextComponent>,
}

impl TextComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Concatenated text of this component and its children, without styling.
    pub fn plain_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.extra {
            out.push_str(&child.plain_text());
        }
        out
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::String(self.plain_text()))
    }

    fn styled(text: String, style: &Style) -> Self {
        Self {
            text,
            color: style.color.clone(),
            bold: style.bold,
            italic: style.italic,
            underlined: style.underlined,
            strikethrough: style.strikethrough,
            obfuscated: style.obfuscated,
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoration {
    Bold,
    Italic,
    Underlined,
    Strikethrough,
    Obfuscated,
}

impl Decoration {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "bold" | "b" => Some(Self::Bold),
            "italic" | "i" | "em" => Some(Self::Italic),
            "underlined" | "u" => Some(Self::Underlined),
            "strikethrough" | "st" => Some(Self::Strikethrough),
            "obfuscated" | "obf" => Some(Self::Obfuscated),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underlined => "underlined",
            Self::Strikethrough => "strikethrough",
            Self::Obfuscated => "obfuscated",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Style {
    color: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    underlined: Option<bool>,
    strikethrough: Option<bool>,
    obfuscated: Option<bool>,
}

impl Style {
    fn with_decoration(&self, decoration: Decoration, on: bool) -> Self {
        let mut next = self.clone();
        let slot = match decoration {
            Decoration::Bold => &mut next.bold,
            Decoration::Italic => &mut next.italic,
            Decoration::Underlined => &mut next.underlined,
            Decoration::Strikethrough => &mut next.strikethrough,
            Decoration::Obfuscated => &mut next.obfuscated,
        };
        *slot = Some(on);
        next
    }

    fn with_color(&self, color: String) -> Self {
        Self {
            color: Some(color),
            ..self.clone()
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Tag {
    Color { key: String, color: String },
    Decoration { decoration: Decoration, on: bool },
    Close(String),
    Reset,
    Newline,
}

impl Tag {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.is_empty() {
            return None;
        }
        if let Some(name) = raw.strip_prefix('/') {
            return Self::close_key(name).map(Tag::Close);
        }
        match raw.as_str() {
            "reset" => return Some(Tag::Reset),
            "newline" | "br" => return Some(Tag::Newline),
            _ => {}
        }
        if let Some(name) = raw.strip_prefix('!') {
            return Decoration::from_name(name).map(|decoration| Tag::Decoration {
                decoration,
                on: false,
            });
        }
        if let Some(decoration) = Decoration::from_name(&raw) {
            return Some(Tag::Decoration {
                decoration,
                on: true,
            });
        }
        if let Some(value) = raw.strip_prefix("color:").or_else(|| raw.strip_prefix("c:")) {
            return parse_color(value).map(|color| Tag::Color {
                key: "color".to_string(),
                color,
            });
        }
        parse_color(&raw).map(|color| Tag::Color {
            key: raw.clone(),
            color,
        })
    }

    /// Stack key a closing tag refers to, if the name is a known tag.
    fn close_key(name: &str) -> Option<String> {
        if let Some(decoration) = Decoration::from_name(name) {
            return Some(decoration.key().to_string());
        }
        if name == "color" || name == "c" {
            return Some("color".to_string());
        }
        parse_color(name).map(|_| name.to_string())
    }
}

fn parse_color(value: &str) -> Option<String> {
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(format!("#{hex}"));
        }
        return None;
    }
    let value = match value {
        "grey" => "gray",
        "dark_grey" => "dark_gray",
        other => other,
    };
    NAMED_COLORS
        .iter()
        .find(|name| **name == value)
        .map(|name| name.to_string())
}

#[derive(Default)]
struct MarkupParser {
    /// Open tags, innermost last, each with the style in effect inside it.
    stack: Vec<(String, Style)>,
    buffer: String,
    segments: Vec<TextComponent>,
}

impl MarkupParser {
    fn style(&self) -> Style {
        self.stack
            .last()
            .map(|(_, style)| style.clone())
            .unwrap_or_default()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        let style = self.style();
        self.segments.push(TextComponent::styled(text, &style));
    }

    fn apply(&mut self, tag: Tag) {
        if tag == Tag::Newline {
            self.buffer.push('\n');
            return;
        }
        self.flush();
        match tag {
            Tag::Color { key, color } => {
                let style = self.style().with_color(color);
                self.stack.push((key, style));
            }
            Tag::Decoration { decoration, on } => {
                let style = self.style().with_decoration(decoration, on);
                self.stack.push((decoration.key().to_string(), style));
            }
            Tag::Close(key) => {
                if let Some(idx) = self.stack.iter().rposition(|(open, _)| *open == key) {
                    self.stack.truncate(idx);
                }
            }
            Tag::Reset => self.stack.clear(),
            Tag::Newline => {}
        }
    }

    fn finish(mut self) -> TextComponent {
        self.flush();
        match self.segments.len() {
            0 => TextComponent::default(),
            1 => self.segments.remove(0),
            _ => TextComponent {
                extra: self.segments,
                ..Default::default()
            },
        }
    }
}

/// Parse markup into a chat component.
///
/// Plain input yields a single `{"text": ...}` component. Styled input yields
/// an empty root whose `extra` holds one child per styled run.
pub fn parse_markup(input: &str) -> TextComponent {
    let mut parser = MarkupParser::default();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\<") {
            parser.buffer.push('<');
            rest = after;
            continue;
        }
        if rest.starts_with('<') {
            if let Some(end) = rest.find('>') {
                if let Some(tag) = Tag::parse(&rest[1..end]) {
                    parser.apply(tag);
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            parser.buffer.push(ch);
        }
        rest = chars.as_str();
    }

    parser.finish()
}
