use regex::Regex;
use std::sync::LazyLock;

static STUDENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^S\d+$").unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").unwrap());

/// True iff `s` is a capital `S` followed by one or more digits.
pub fn is_valid_student_id(s: &str) -> bool {
    STUDENT_ID_RE.is_match(s)
}

/// True iff `s` has the `local@domain.tld` shape with no internal whitespace.
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

pub fn normalize_id(s: &str) -> String {
    s.trim().to_uppercase()
}

pub fn normalize_email(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Title-cases a name the way the registration desk stores it: a letter
/// following a non-letter is uppercased, every other letter lowercased.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
