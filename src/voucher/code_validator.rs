//! Submitted-code checks: placeholder detection, brand format matching,
//! and duplicate lookup against live inventory and the archive.
//!
//! The pure checks never fail for valid input; they return booleans and let
//! the caller translate a hit into a rejection message. Only the duplicate
//! lookup touches the database.

use anyhow::Result;
use regex::RegexBuilder;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;

/// Placeholder fragments that immediately disqualify a code
const DUMMY_SUBSTRINGS: &[&str] = &["TEST", "DUMMY", "SAMPLE", "FAKE", "ADMIN", "12345", "00000"];

/// Alphanumeric sequence used to catch ascending runs like "ABCDEF"
const ASCENDING_SEQUENCE: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Window length for the ascending-run check
const ASCENDING_WINDOW: usize = 6;

/// Length of an identical-character run that flags a code
const REPEAT_RUN: usize = 5;

/// Fallback pattern for brands without a dedicated entry
const DEFAULT_FORMAT: &str = r"^[A-Za-z0-9\-_@.]{4,64}$";

/// Brand-specific code formats, matched case-insensitively
const BRAND_FORMATS: &[(&str, &str)] = &[
    ("amazon", r"^[A-Z0-9]{4}-[A-Z0-9]{6}-[A-Z0-9]{4}$"),
    ("google play", r"^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$"),
    ("steam", r"^[A-Z0-9]{5}-[A-Z0-9]{5}-[A-Z0-9]{5}$"),
    ("itunes", r"^X[A-Z0-9]{15}$"),
    ("netflix", r"^[A-Z0-9]{11,12}$"),
    ("flipkart", r"^[A-Z0-9]{14,16}$"),
];

/// Normalize a code the way every check and every stored hash expects it.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Detect obviously fake or placeholder codes.
///
/// Any single rule hit is sufficient: denylisted substrings, runs of five or
/// more identical characters, six-character ascending sequences, or long
/// codes with almost no character variety.
pub fn is_dummy_code(code: &str) -> bool {
    let normalized = normalize_code(code);

    if DUMMY_SUBSTRINGS.iter().any(|s| normalized.contains(s)) {
        return true;
    }

    if has_repeat_run(&normalized, REPEAT_RUN) {
        return true;
    }

    if has_ascending_window(&normalized, ASCENDING_WINDOW) {
        return true;
    }

    // Low entropy: long code drawing on fewer than 4 distinct characters
    if normalized.len() > 10 {
        let mut distinct: Vec<char> = normalized.chars().collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 4 {
            return true;
        }
    }

    false
}

fn has_repeat_run(code: &str, run: usize) -> bool {
    let chars: Vec<char> = code.chars().collect();
    let mut count = 1;
    for window in chars.windows(2) {
        if window[0] == window[1] {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            count = 1;
        }
    }
    false
}

fn has_ascending_window(code: &str, window: usize) -> bool {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() < window {
        return false;
    }
    chars
        .windows(window)
        .map(|w| w.iter().collect::<String>())
        .any(|candidate| ASCENDING_SEQUENCE.contains(&candidate))
}

/// Check a code against the brand's expected format.
///
/// Unknown brands fall back to a permissive default pattern.
pub fn validate_format(brand: &str, code: &str) -> bool {
    let brand_key = brand.trim().to_lowercase();
    let pattern = BRAND_FORMATS
        .iter()
        .find(|(name, _)| *name == brand_key)
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_FORMAT);

    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(code.trim()),
        Err(e) => {
            // A broken table entry is a programming error; fail closed.
            tracing::error!(brand = %brand_key, error = %e, "Invalid brand format pattern");
            false
        }
    }
}

/// Where a duplicate code was found
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateLocation {
    /// Matches a currently listed voucher: "already listed"
    Active,
    /// Matches an archived voucher's hash: "previously used, cannot relist"
    Archive,
}

/// Result of the duplicate lookup
#[derive(Debug, Serialize, Clone, Copy)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub location: Option<DuplicateLocation>,
}

impl DuplicateCheck {
    fn clean() -> Self {
        Self {
            is_duplicate: false,
            location: None,
        }
    }

    fn found(location: DuplicateLocation) -> Self {
        Self {
            is_duplicate: true,
            location: Some(location),
        }
    }
}

/// Search active inventory and the archive for a code's hash.
///
/// `exclude` skips the voucher being updated so a voucher never collides
/// with itself. Active and archived matches are reported separately because
/// the user-facing message differs.
pub async fn check_duplicates(
    pool: &PgPool,
    code: &str,
    exclude: Option<Uuid>,
) -> Result<DuplicateCheck> {
    let hash = crypto::hash_code(&normalize_code(code));

    let active: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM vouchers
        WHERE scratch_code_hash = $1
          AND is_active = TRUE
          AND ($2::uuid IS NULL OR id != $2)
        LIMIT 1
        "#,
    )
    .bind(&hash)
    .bind(exclude)
    .fetch_optional(pool)
    .await?;

    if active.is_some() {
        return Ok(DuplicateCheck::found(DuplicateLocation::Active));
    }

    let archived: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM voucher_archives WHERE scratch_code_hash = $1 LIMIT 1",
    )
    .bind(&hash)
    .fetch_optional(pool)
    .await?;

    if archived.is_some() {
        return Ok(DuplicateCheck::found(DuplicateLocation::Archive));
    }

    Ok(DuplicateCheck::clean())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist_substrings() {
        assert!(is_dummy_code("TESTCODE1"));
        assert!(is_dummy_code("my-dummy-code"));
        assert!(is_dummy_code("code12345x"));
        assert!(is_dummy_code("adminVoucher"));
        assert!(!is_dummy_code("GC-9X2B-K7QM"));
    }

    #[test]
    fn test_repeat_run() {
        assert!(is_dummy_code("AAAAA9"));
        assert!(is_dummy_code("X99999Y"));
        // Four in a row is fine
        assert!(!is_dummy_code("AAAA9B7"));
    }

    #[test]
    fn test_ascending_sequence() {
        assert!(is_dummy_code("ABCDEF"));
        assert!(is_dummy_code("Z456789Q"));
        // 5-char ascending window alone does not trip the check
        assert!(!is_dummy_code("ABCDE9X"));
    }

    #[test]
    fn test_low_entropy() {
        // 11 chars, 3 distinct
        assert!(is_dummy_code("ABABABABABC"));
        // Short codes are exempt from the entropy rule
        assert!(!is_dummy_code("ABAB"));
        // 11 chars, 4 distinct
        assert!(!is_dummy_code("QXQXQXQXQZW"));
    }

    #[test]
    fn test_normalization() {
        assert!(is_dummy_code("  testCode1  "));
        assert_eq!(normalize_code(" gc-1a2b "), "GC-1A2B");
    }

    #[test]
    fn test_known_brand_formats() {
        assert!(validate_format("Amazon", "Q4X9-7BK2MD-81ZC"));
        assert!(!validate_format("Amazon", "Q4X97BK2MD81ZC"));
        assert!(validate_format("Steam", "9XK2M-7QW4R-B8ZC3"));
        assert!(!validate_format("Steam", "9XK2M-7QW4R"));
        assert!(validate_format("Google Play", "9XK2-M7QW-4RB8-ZC31"));
    }

    #[test]
    fn test_brand_lookup_is_case_insensitive() {
        assert!(validate_format("aMaZoN", "q4x9-7bk2md-81zc"));
    }

    #[test]
    fn test_unknown_brand_uses_default() {
        assert!(validate_format("Localmart", "GC_2024@promo.9"));
        assert!(!validate_format("Localmart", "ab"));
        assert!(!validate_format("Localmart", "has spaces in it"));
    }
}
