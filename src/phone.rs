//! Phone number normalization for identity matching
//!
//! Loans are created against contacts identified by phone number, so two
//! differently formatted inputs must resolve to the same canonical form
//! before being compared. The canonical form is `+<countrycode><digits>`.
//! Peru is the home country: mobile numbers are 9 digits starting with 9,
//! country calling code 51.

/// Peru's international calling code.
const HOME_COUNTRY_CODE: &str = "51";
/// Digits in a fully qualified home-country number (51 + 9-digit mobile).
const HOME_FULL_LEN: usize = 11;
/// Digits in a local home-country mobile number.
const HOME_LOCAL_LEN: usize = 9;
/// Leading digit of home-country mobile numbers.
const HOME_MOBILE_PREFIX: char = '9';

/// Normalize a phone number to the canonical `+51XXXXXXXXX` form.
///
/// Handles local numbers, numbers already carrying the country code, the
/// occasional duplicated country code produced by contact apps, and foreign
/// E.164-like numbers. Returns an empty string for unparseable input. Total
/// and idempotent: normalizing an already-normalized number is a no-op.
pub fn normalize_phone(phone: &str) -> String {
    let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return String::new();
    }

    // Strip leading zeros (trunk prefixes)
    let stripped: String = digits.trim_start_matches('0').to_string();
    digits = stripped;

    if digits.is_empty() {
        return String::new();
    }

    // Already carries the home country code (e.g. "51999999999")
    if digits.starts_with(HOME_COUNTRY_CODE) && digits.len() == HOME_FULL_LEN {
        return format!("+{}", digits);
    }

    // Duplicated country code from contact-app round-trips (e.g. "5151999999999")
    if digits.starts_with("5151") && digits.len() == HOME_FULL_LEN + 2 {
        return format!("+{}", &digits[HOME_COUNTRY_CODE.len()..]);
    }

    // Bare local mobile number (e.g. "999999999")
    if digits.len() == HOME_LOCAL_LEN && digits.starts_with(HOME_MOBILE_PREFIX) {
        return format!("+{}{}", HOME_COUNTRY_CODE, digits);
    }

    // Foreign number in E.164-like range
    if (10..=15).contains(&digits.len()) {
        return format!("+{}", digits);
    }

    String::new()
}

/// Format a normalized phone number for display, e.g. `+51 999 999 999`.
pub fn format_phone_for_display(phone: &str) -> String {
    let normalized = normalize_phone(phone);
    if normalized.is_empty() {
        return String::new();
    }

    // Split off the country code, then group the subscriber digits in threes
    let digits = &normalized[1..];
    let (country, subscriber) = if digits.starts_with(HOME_COUNTRY_CODE) {
        digits.split_at(HOME_COUNTRY_CODE.len())
    } else {
        // Unknown country code length; leave the number ungrouped
        return normalized;
    };

    let grouped = subscriber
        .as_bytes()
        .chunks(3)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");

    format!("+{} {}", country, grouped)
}

/// Check whether a phone number normalizes to a valid canonical form.
pub fn is_valid_phone(phone: &str) -> bool {
    let normalized = normalize_phone(phone);
    let Some(digits) = normalized.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_mobile_gets_country_code() {
        assert_eq!(normalize_phone("999999999"), "+51999999999");
        assert_eq!(normalize_phone("987 654 321"), "+51987654321");
        assert_eq!(normalize_phone("987-654-321"), "+51987654321");
    }

    #[test]
    fn test_already_has_country_code() {
        assert_eq!(normalize_phone("51999999999"), "+51999999999");
        assert_eq!(normalize_phone("+51 999 999 999"), "+51999999999");
        assert_eq!(normalize_phone("(+51) 999999999"), "+51999999999");
    }

    #[test]
    fn test_duplicated_country_code_repaired() {
        assert_eq!(normalize_phone("5151999999999"), "+51999999999");
        assert_eq!(normalize_phone("+51 51 999 999 999"), "+51999999999");
    }

    #[test]
    fn test_leading_zeros_stripped() {
        assert_eq!(normalize_phone("0999999999"), "+51999999999");
        assert_eq!(normalize_phone("00999999999"), "+51999999999");
    }

    #[test]
    fn test_foreign_number_kept() {
        assert_eq!(normalize_phone("14155551234"), "+14155551234");
        assert_eq!(normalize_phone("+1 415 555 1234"), "+14155551234");
    }

    #[test]
    fn test_invalid_inputs_yield_empty() {
        assert_eq!(normalize_phone(""), "");
        assert_eq!(normalize_phone("abc"), "");
        assert_eq!(normalize_phone("12345"), "");
        assert_eq!(normalize_phone("000"), "");
        // 9 digits not starting with the mobile prefix and too short for E.164
        assert_eq!(normalize_phone("812345678"), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "999999999",
            "51999999999",
            "5151999999999",
            "+51 999 999 999",
            "14155551234",
            "0999999999",
            "garbage",
            "",
        ];
        for input in inputs {
            let once = normalize_phone(input);
            assert_eq!(normalize_phone(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(format_phone_for_display("999999999"), "+51 999 999 999");
        assert_eq!(format_phone_for_display(""), "");
    }

    #[test]
    fn test_validity() {
        assert!(is_valid_phone("999999999"));
        assert!(is_valid_phone("+51 999 999 999"));
        assert!(is_valid_phone("14155551234"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("123"));
        assert!(!is_valid_phone("not a phone"));
    }
}
