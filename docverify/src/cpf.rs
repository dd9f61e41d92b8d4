//! Brazilian CPF (Cadastro de Pessoas Físicas) handling.
//!
//! A CPF is eleven decimal digits, the last two being check digits computed
//! with a weighted sum modulo 11. Documents print it as `###.###.###-##`.

use once_cell::sync::Lazy;
use regex::Regex;

const CPF_LEN: usize = 11;

/// Punctuated CPF as printed on identity documents. Bare 11-digit runs are
/// not matched. Digits and word boundaries are ASCII only, so `Nº529...`
/// or a trailing `ª` still delimit the number.
static CPF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)[0-9]{3}\.[0-9]{3}\.[0-9]{3}-[0-9]{2}(?-u:\b)")
        .expect("valid CPF regex")
});

/// Returns `true` when `input` is a checksum-valid CPF.
///
/// Every character that is not an ASCII digit is ignored, so both
/// `529.982.247-25` and `52998224725` are accepted. Wrong lengths and
/// repeated-digit placeholders such as `111.111.111-11` yield `false`.
pub fn is_valid_cpf(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(ascii_digit).collect();

    if digits.len() != CPF_LEN {
        return false;
    }

    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weights run from `len + 1` down to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();

    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

fn ascii_digit(c: char) -> Option<u32> {
    if c.is_ascii_digit() {
        c.to_digit(10)
    } else {
        None
    }
}

/// First punctuated CPF found in `text`, if any.
pub fn find_cpf(text: &str) -> Option<&str> {
    CPF_PATTERN.find(text).map(|m| m.as_str())
}

/// Masks all but the last two digits, for logging.
pub fn mask_cpf(cpf: &str) -> String {
    let total = cpf.chars().filter(char::is_ascii_digit).count();
    let mut seen = 0;
    cpf.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen + 2 > total {
                    c
                } else {
                    '*'
                }
            } else {
                c
            }
        })
        .collect()
}
