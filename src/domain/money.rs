use std::fmt;

/// Balances and amounts are integer minor units (cents for EUR/USD) to avoid
/// floating-point drift. €50.00 = 5000 cents. Conversion to and from display
/// decimals happens only at the boundary (CLI, API payloads).
pub type Cents = i64;

/// Format cents as a display decimal: 5000 -> "50.00", -1234 -> "-12.34".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a display decimal into cents. Accepts "50", "50.5" and "50.00";
/// more than two decimal places is rejected rather than silently truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseAmountError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if digits.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let (units_str, frac_str) = match digits.split_once('.') {
        Some((units, frac)) => (units, frac),
        None => (digits, ""),
    };

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?
    };

    let frac: i64 = match frac_str.len() {
        0 => 0,
        1 => {
            frac_str
                .parse::<i64>()
                .map_err(|_| ParseAmountError::InvalidFormat)?
                * 10
        }
        2 => frac_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?,
        _ => return Err(ParseAmountError::TooPrecise),
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac))
        .ok_or(ParseAmountError::Overflow)?;

    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat,
    TooPrecise,
    Overflow,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "empty amount"),
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
            ParseAmountError::TooPrecise => {
                write!(f, "amounts support at most two decimal places")
            }
            ParseAmountError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
