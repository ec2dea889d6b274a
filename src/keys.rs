//! Per-keystroke filtering and live mask formatting for text controls.

use keyboard_types::{Key, Modifiers};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPreset {
    /// Digits and `-`.
    Int,
    /// Digits, `-` and `.`.
    Number,
    /// Letters only; spaces are rejected. Names that need spaces use a
    /// pattern such as `^[A-Za-z ]$`.
    Alpha,
    /// Letters and digits, no whitespace.
    AlphaNum,
    Hex,
    /// Digits and a single `.`.
    Decimal,
}

impl FilterPreset {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "int" => Some(Self::Int),
            "number" => Some(Self::Number),
            "alpha" => Some(Self::Alpha),
            "alphanum" => Some(Self::AlphaNum),
            "hex" => Some(Self::Hex),
            "decimal" => Some(Self::Decimal),
            _ => None,
        }
    }

    fn accepts(self, ch: char, current: &str) -> bool {
        match self {
            Self::Int => ch.is_ascii_digit() || ch == '-',
            Self::Number => ch.is_ascii_digit() || ch == '-' || ch == '.',
            Self::Alpha => ch.is_alphabetic(),
            Self::AlphaNum => ch.is_alphanumeric(),
            Self::Hex => ch.is_ascii_hexdigit(),
            Self::Decimal => ch.is_ascii_digit() || (ch == '.' && !current.contains('.')),
        }
    }
}

/// Decides whether a keystroke may reach a text control.
#[derive(Debug, Clone)]
pub enum KeyFilter {
    Preset(FilterPreset),
    /// Tested against the typed character alone.
    Pattern(Regex),
}

impl KeyFilter {
    /// Preset names win; anything else is compiled as a regular expression.
    pub fn parse(filter: &str) -> Result<Self, regex::Error> {
        match FilterPreset::parse(filter) {
            Some(preset) => Ok(Self::Preset(preset)),
            None => Regex::new(filter).map(Self::Pattern),
        }
    }

    /// `current` is the control's value before the keystroke.
    pub fn allows(&self, key: &Key, modifiers: Modifiers, current: &str) -> bool {
        if modifiers.intersects(Modifiers::CONTROL | Modifiers::META) {
            return true;
        }
        let Key::Character(text) = key else {
            // Navigation and editing keys never insert anything.
            return true;
        };
        text.chars().all(|ch| match self {
            Self::Preset(preset) => preset.accepts(ch, current),
            Self::Pattern(pattern) => {
                let mut buf = [0u8; 4];
                pattern.is_match(ch.encode_utf8(&mut buf))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskToken {
    Digit,
    Letter,
    AlphaNum,
    Literal(char),
}

impl MaskToken {
    fn from_char(ch: char) -> Self {
        match ch {
            '9' => Self::Digit,
            'x' | 'X' => Self::Letter,
            '*' => Self::AlphaNum,
            other => Self::Literal(other),
        }
    }

    /// The character stored for `ch`, if this placeholder takes it.
    fn take(self, ch: char) -> Option<char> {
        match self {
            Self::Digit if ch.is_ascii_digit() => Some(ch),
            Self::Letter if ch.is_alphabetic() => ch.to_uppercase().next(),
            Self::AlphaNum if ch.is_alphanumeric() => Some(ch),
            _ => None,
        }
    }
}

/// Result of formatting one raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    /// What the element shows.
    pub display: String,
    /// Accepted data characters, without literals.
    pub value: String,
    /// Caret offset in `display`.
    pub caret: usize,
}

/// Live formatter for masks such as `999-999` or `XX-9999`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMask {
    pattern: String,
    tokens: Vec<MaskToken>,
}

impl InputMask {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            tokens: pattern.chars().map(MaskToken::from_char).collect(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Reformats `raw` (the element value after an edit) and maps `caret`,
    /// an offset into `raw`, onto the formatted string.
    pub fn apply(&self, raw: &str, caret: usize) -> Masked {
        let data = self.data_chars(raw);
        let typed_before_caret = data.iter().filter(|(index, _)| *index < caret).count();

        let mut display = String::new();
        let mut value = String::new();
        // Offset in `display` after each accepted data character.
        let mut ends = Vec::new();
        let mut remaining = data.iter().map(|(_, ch)| *ch).peekable();
        let mut length = 0usize;

        'tokens: for token in &self.tokens {
            if remaining.peek().is_none() {
                break;
            }
            if let MaskToken::Literal(literal) = token {
                display.push(*literal);
                length += 1;
                continue;
            }
            for ch in remaining.by_ref() {
                if let Some(accepted) = token.take(ch) {
                    display.push(accepted);
                    value.push(accepted);
                    length += 1;
                    ends.push(length);
                    continue 'tokens;
                }
            }
            break;
        }
        // Literals pushed ahead of data that then did not fit are dropped.
        let display_len = ends.last().copied().unwrap_or(0);
        let display: String = display.chars().take(display_len).collect();

        let caret = match typed_before_caret.min(ends.len()) {
            0 => 0,
            count => ends[count - 1],
        };
        Masked { display, value, caret }
    }

    /// Alphanumeric characters of `raw` paired with their offsets, skipping
    /// alphanumeric literals the mask itself put at their position.
    fn data_chars(&self, raw: &str) -> Vec<(usize, char)> {
        raw.chars()
            .enumerate()
            .filter(|(index, ch)| {
                if !ch.is_alphanumeric() {
                    return false;
                }
                !matches!(self.tokens.get(*index), Some(MaskToken::Literal(literal)) if literal == ch)
            })
            .collect()
    }
}
