use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a reported amount as printed in filings.
///
/// Accepts full-width digits, `,`/`，` separators, and the negative markers `-`,
/// `△`, `▲` and surrounding parentheses. Returns `None` for blanks and the `－`
/// placeholder used for "not applicable".
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut normalized = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            '０'..='９' => {
                let digit = c as u32 - '０' as u32;
                normalized.push(char::from_digit(digit, 10)?);
            }
            ',' | '，' | ' ' | '\u{3000}' => {}
            '－' | '−' | '‐' => normalized.push('-'),
            '．' => normalized.push('.'),
            '（' => normalized.push('('),
            '）' => normalized.push(')'),
            '＋' => normalized.push('+'),
            other => normalized.push(other),
        }
    }

    let mut body = normalized.as_str();
    let mut negative = false;
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = inner;
    }
    if let Some(rest) = body
        .strip_prefix('△')
        .or_else(|| body.strip_prefix('▲'))
        .or_else(|| body.strip_prefix('-'))
    {
        negative = !negative;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }

    if body.is_empty() || !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = Decimal::from_str(body).ok()?;
    Some(if negative { -value } else { value })
}

/// Multiplies `value` by `10^scale`. Negative scales divide.
pub fn apply_scale(value: Decimal, scale: i32) -> Option<Decimal> {
    if scale == 0 {
        return Some(value);
    }
    let factor = if scale > 0 {
        Decimal::from(10_i64.checked_pow(scale.unsigned_abs())?)
    } else if scale >= -28 {
        Decimal::new(1, scale.unsigned_abs())
    } else {
        return None;
    };
    value.checked_mul(factor)
}

/// Power of ten implied by a Japanese unit label such as `百万円`.
///
/// `None` when the label carries no recognised multiplier.
pub fn unit_label_scale(label: &str) -> Option<i32> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    if label.contains("百万") {
        Some(6)
    } else if label.contains("十億") {
        Some(9)
    } else if label.contains('億') {
        Some(8)
    } else if label.contains('万') {
        Some(4)
    } else if label.contains('千') {
        Some(3)
    } else if label.contains('円') || label.eq_ignore_ascii_case("JPY") {
        Some(0)
    } else {
        None
    }
}
