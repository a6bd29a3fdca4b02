use crate::constant::Constant;
use include_dir::{include_dir, Dir};
use std::fs;
use std::path::Path;
use thiserror::Error;

static DIGITS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources");

#[derive(Debug, Error)]
pub enum DigitsError {
    #[error("digits file '{0}' not found")]
    NotFound(String),
    #[error("invalid digits content: {0}")]
    InvalidContent(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-only oracle over the fractional digits of a constant.
pub trait DigitSource {
    fn total_digits(&self) -> usize;

    /// Digit at a zero-based index (0 = first digit after the decimal point).
    fn digit_at(&self, index: usize) -> Option<u8>;
}

impl<T: DigitSource + ?Sized> DigitSource for &T {
    fn total_digits(&self) -> usize {
        (**self).total_digits()
    }

    fn digit_at(&self, index: usize) -> Option<u8> {
        (**self).digit_at(index)
    }
}

impl<T: DigitSource + ?Sized> DigitSource for Box<T> {
    fn total_digits(&self) -> usize {
        (**self).total_digits()
    }

    fn digit_at(&self, index: usize) -> Option<u8> {
        (**self).digit_at(index)
    }
}

/// Fully loaded in-memory digit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigitBuffer {
    digits: Vec<u8>,
}

impl DigitBuffer {
    pub fn parse(text: &str) -> Result<Self, DigitsError> {
        let trimmed = text.trim();
        if let Some(bad) = trimmed.bytes().position(|b| !b.is_ascii_digit()) {
            return Err(DigitsError::InvalidContent(format!(
                "non-digit character at offset {bad}"
            )));
        }
        Ok(Self {
            digits: trimmed.bytes().map(|b| b - b'0').collect(),
        })
    }

    /// Expansion shipped inside the binary.
    pub fn bundled(constant: Constant) -> Result<Self, DigitsError> {
        let name = format!("{}.txt", constant.resource_name());
        let file = DIGITS_DIR
            .get_file(&name)
            .ok_or_else(|| DigitsError::NotFound(name.clone()))?;
        let text = file
            .contents_utf8()
            .ok_or_else(|| DigitsError::InvalidContent(format!("{name} is not utf-8")))?;
        Self::parse(text)
    }

    /// Loads `<dir>/<resource_name>.txt`, e.g. a user-supplied longer expansion.
    pub fn from_dir<P: AsRef<Path>>(dir: P, constant: Constant) -> Result<Self, DigitsError> {
        let path = dir
            .as_ref()
            .join(format!("{}.txt", constant.resource_name()));
        if !path.exists() {
            return Err(DigitsError::NotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(&path)?;
        let buffer = Self::parse(&text)?;
        log::debug!(
            "loaded {} digits for {} from {}",
            buffer.total_digits(),
            constant,
            path.display()
        );
        Ok(buffer)
    }

    /// Digits in `[start, start + len)`, clamped to the loaded length.
    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        let start = start.min(self.digits.len());
        let end = start.saturating_add(len).min(self.digits.len());
        &self.digits[start..end]
    }
}

impl DigitSource for DigitBuffer {
    fn total_digits(&self) -> usize {
        self.digits.len()
    }

    fn digit_at(&self, index: usize) -> Option<u8> {
        self.digits.get(index).copied()
    }
}

/// Renders digits as a plain string, e.g. for showing a chunk.
pub fn render(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}
