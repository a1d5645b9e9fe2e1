//! # Barcode Module
//!
//! Symbology selection, EAN-13 check digits and numeric normalization for
//! shelf labels.
//!
//! ## Encoding Decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    LabelSpec::encode(value)                             │
//! │                                                                         │
//! │  empty? ─────────────────────────────────────► EncodingError::Empty     │
//! │     │                                                                   │
//! │  any letter? ──yes──► CODE128, literal value                            │
//! │     │ no                (invalid flag if CODE128 can't print it)        │
//! │     ▼                                                                   │
//! │  normalize_ean13(value)                                                 │
//! │     │                                                                   │
//! │     ├── 13 digits ──► passthrough                ┐                      │
//! │     ├── 14 digits ──► first 12 + new checksum    ├─► EAN13              │
//! │     ├── <13 digits ─► 0-pad to 12 + checksum     ┘  (invalid flag if    │
//! │     │                                               check digit fails)  │
//! │     └── non-digit / >14 digits                                          │
//! │            │                                                            │
//! │            ├── printable ASCII, within length ─► CODE128 literal         │
//! │            └── otherwise ──────────────────────► EncodingError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## EAN-13 Check Digit
//! For the 12-digit payload `d[0..11]`, weights alternate 1,3,1,3,...
//! starting at index 0. `check = (10 - (Σ d[i]·w[i] mod 10)) mod 10`.
//!
//! ```rust
//! use mart_core::barcode::ean13_checksum;
//!
//! // 1·1 + 2·3 + 3·1 + 4·3 + 5·1 + 6·3 + 7·1 + 8·3 + 9·1 + 0·3 + 1·1 + 2·3 = 92
//! assert_eq!(ean13_checksum("123456789012"), Some(8));
//! ```
//!
//! CODE128 carries its own internal check character, which is the renderer's
//! job; this module only decides that CODE128 is the symbology.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{EncodingError, NormalizeError};
use crate::types::CatalogItem;

const EAN13_LEN: usize = 13;
const EAN13_PAYLOAD_LEN: usize = 12;
/// Exports sometimes append a stray digit to a valid EAN-13.
const EAN13_OVERLONG_LEN: usize = 14;

// =============================================================================
// Symbology
// =============================================================================

/// Barcode symbology chosen for a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Symbology {
    #[serde(rename = "CODE128")]
    Code128,
    #[serde(rename = "EAN13")]
    Ean13,
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbology::Code128 => write!(f, "CODE128"),
            Symbology::Ean13 => write!(f, "EAN13"),
        }
    }
}

// =============================================================================
// EAN-13 Arithmetic
// =============================================================================

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Check digit over twelve digit values (0-9 each).
fn check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * (if i % 2 == 0 { 1 } else { 3 }))
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Computes the EAN-13 check digit for a 12-digit payload.
///
/// Returns `None` unless `payload` is exactly twelve ASCII digits.
pub fn ean13_checksum(payload: &str) -> Option<u8> {
    if payload.len() != EAN13_PAYLOAD_LEN || !is_all_digits(payload) {
        return None;
    }
    let digits: Vec<u8> = payload.bytes().map(|b| b - b'0').collect();
    Some(check_digit(&digits))
}

/// True when `code` is thirteen digits whose last digit is the correct
/// check digit for the first twelve.
pub fn is_valid_ean13(code: &str) -> bool {
    if code.len() != EAN13_LEN || !is_all_digits(code) {
        return false;
    }
    let (payload, check) = code.split_at(EAN13_PAYLOAD_LEN);
    ean13_checksum(payload) == Some(check.as_bytes()[0] - b'0')
}

/// Turns a purely numeric code into a 13-digit EAN code.
///
/// | Input | Result |
/// |---|---|
/// | 13 digits | unchanged (check digit is **not** re-validated) |
/// | 14 digits | first 12 digits + recomputed check digit |
/// | 1..=12 digits | left-padded with `0` to 12 + check digit |
/// | anything else | `NormalizeError` |
///
/// The output is always 13 digits, so normalizing twice is the same as
/// normalizing once.
pub fn normalize_ean13(raw: &str) -> Result<String, NormalizeError> {
    if raw.is_empty() {
        return Err(NormalizeError::Empty);
    }
    if !is_all_digits(raw) {
        return Err(NormalizeError::NonDigit(raw.to_string()));
    }

    let payload = match raw.len() {
        EAN13_LEN => return Ok(raw.to_string()),
        EAN13_OVERLONG_LEN => raw[..EAN13_PAYLOAD_LEN].to_string(),
        len if len < EAN13_LEN => format!("{:0>12}", raw),
        len => return Err(NormalizeError::TooLong(len)),
    };

    // Only reachable with exactly 12 digits.
    let check = ean13_checksum(&payload).ok_or_else(|| NormalizeError::NonDigit(raw.to_string()))?;
    Ok(format!("{}{}", payload, check))
}

// =============================================================================
// CODE128 Safety
// =============================================================================

/// Checks that `value` can be printed as a CODE128 literal on a label:
/// non-empty, printable ASCII only, at most `max_len` characters.
pub fn check_code128(value: &str, max_len: usize) -> Result<(), EncodingError> {
    if value.is_empty() {
        return Err(EncodingError::Empty);
    }
    if !value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(EncodingError::UnprintableCharacters {
            value: value.to_string(),
        });
    }
    if value.len() > max_len {
        return Err(EncodingError::TooLong {
            len: value.len(),
            max: max_len,
        });
    }
    Ok(())
}

// =============================================================================
// Label Spec
// =============================================================================

/// A barcode ready for the label printer.
///
/// `invalid` is the render check: when set, the chosen symbology rejects
/// `barcode_value` and the printer shows a placeholder instead of bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LabelSpec {
    pub sku: String,
    pub barcode_value: String,
    pub symbology: Symbology,
    /// Present for EAN13 only.
    pub check_digit: Option<u8>,
    pub invalid: bool,
}

impl LabelSpec {
    /// Encodes `value` for the item identified by `sku`.
    pub fn encode(sku: &str, value: &str, max_code128_len: usize) -> Result<Self, EncodingError> {
        if value.is_empty() {
            return Err(EncodingError::Empty);
        }

        if value.chars().any(char::is_alphabetic) {
            return Ok(Self::code128(sku, value, max_code128_len));
        }

        match normalize_ean13(value) {
            Ok(code) => {
                let check_digit = code.as_bytes()[EAN13_LEN - 1] - b'0';
                let invalid = !is_valid_ean13(&code);
                Ok(LabelSpec {
                    sku: sku.to_string(),
                    barcode_value: code,
                    symbology: Symbology::Ean13,
                    check_digit: Some(check_digit),
                    invalid,
                })
            }
            Err(_) => {
                check_code128(value, max_code128_len)?;
                Ok(Self::code128(sku, value, max_code128_len))
            }
        }
    }

    /// Encodes the item's barcode, or its SKU when it has none.
    pub fn for_item(item: &CatalogItem, max_code128_len: usize) -> Result<Self, EncodingError> {
        Self::encode(&item.sku, item.label_value(), max_code128_len)
    }

    fn code128(sku: &str, value: &str, max_len: usize) -> Self {
        LabelSpec {
            sku: sku.to_string(),
            barcode_value: value.to_string(),
            symbology: Symbology::Code128,
            check_digit: None,
            invalid: check_code128(value, max_len).is_err(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
