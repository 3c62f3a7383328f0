//! IBAN and BIC validation.
//!
//! Pure predicates — malformed input yields `false`, never a panic or error.

/// Normalize an IBAN to machine format: uppercase, no spaces or separators.
pub fn iban_to_machine_format(iban: &str) -> String {
    iban.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate a full IBAN (any input format) against the ISO 13616 mod-97 checksum.
///
/// Fails closed: structurally malformed input returns `false`.
pub fn validate_iban(iban: &str) -> bool {
    let iban = iban_to_machine_format(iban);

    // Country code (2 letters) + check digits (2) + BBAN (at least 11, at most 30)
    if iban.len() < 15 || iban.len() > 34 {
        return false;
    }
    let bytes = iban.as_bytes();
    if !bytes[0].is_ascii_uppercase() || !bytes[1].is_ascii_uppercase() {
        return false;
    }
    if !bytes[2].is_ascii_digit() || !bytes[3].is_ascii_digit() {
        return false;
    }

    // Rearrange: BBAN + country + check digits, letters as 10..35, mod 97 == 1
    let mut rem: u32 = 0;
    for &b in bytes[4..].iter().chain(&bytes[..4]) {
        let v = match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'A'..=b'Z' => (b - b'A') as u32 + 10,
            _ => return false,
        };
        rem = if v < 10 {
            (rem * 10 + v) % 97
        } else {
            (rem * 100 + v) % 97
        };
    }
    rem == 1
}

/// Validate a BIC: 4 letters (bank) + 2 letters (country) + 2 alphanumerics
/// (location) + optional 3 alphanumerics (branch). Case-insensitive.
pub fn validate_bic(bic: &str) -> bool {
    let bytes = bic.as_bytes();
    if bytes.len() != 8 && bytes.len() != 11 {
        return false;
    }
    bytes[..6].iter().all(|b| b.is_ascii_alphabetic())
        && bytes[6..].iter().all(|b| b.is_ascii_alphanumeric())
}

/// Validate an IBAN given as its three stored parts (country code, key,
/// account number).
///
/// If either prefix part is empty the check passes: presence of the parts is
/// enforced by the parameter-level validation, not here.
pub fn validate_iban_parts(country: &str, key: &str, number: &str) -> bool {
    if country.trim().is_empty() || key.trim().is_empty() {
        return true;
    }
    validate_iban(&format!("{country}{key}{number}"))
}

/// Obfuscate an IBAN for on-screen display: keep the first six and last two
/// characters, mask the rest.
pub fn mask_iban(iban: &str) -> Option<String> {
    const VISIBLE_PREFIX: usize = 6;
    const VISIBLE_SUFFIX: usize = 2;

    if iban.is_empty() {
        return None;
    }
    if iban.len() <= VISIBLE_PREFIX + VISIBLE_SUFFIX {
        return Some(iban.to_string());
    }
    let masked = iban.len() - VISIBLE_PREFIX - VISIBLE_SUFFIX;
    Some(format!(
        "{}{}{}",
        &iban[..VISIBLE_PREFIX],
        "*".repeat(masked),
        &iban[iban.len() - VISIBLE_SUFFIX..]
    ))
}
