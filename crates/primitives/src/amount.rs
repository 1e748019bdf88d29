//! Arbitrary-precision addition over decimal strings.
//!
//! Token amounts are persisted as exact decimal strings because they
//! routinely exceed 64 bits, and an aggregate over many transfers can
//! exceed 256 bits. Summation therefore stays in the decimal domain
//! instead of widening into a machine integer or float.

use eyre::{bail, Result};

/// Add two non-negative decimal strings.
pub fn add_decimal(a: &str, b: &str) -> Result<String> {
    let a = parse_digits(a)?;
    let b = parse_digits(b)?;

    let mut digits = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u8;
    let mut ai = a.iter().rev();
    let mut bi = b.iter().rev();
    loop {
        let (da, db) = (ai.next(), bi.next());
        if da.is_none() && db.is_none() && carry == 0 {
            break;
        }
        let sum = da.copied().unwrap_or(0) + db.copied().unwrap_or(0) + carry;
        digits.push(sum % 10);
        carry = sum / 10;
    }

    if digits.is_empty() {
        return Ok("0".to_owned());
    }
    Ok(digits.iter().rev().map(|d| char::from(b'0' + d)).collect())
}

/// Sum an iterator of non-negative decimal strings.
pub fn sum_decimal<'a, I>(values: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = "0".to_owned();
    for value in values {
        total = add_decimal(&total, value)?;
    }
    Ok(total)
}

fn parse_digits(value: &str) -> Result<Vec<u8>> {
    if value.is_empty() {
        bail!("empty decimal string");
    }
    let digits = value
        .bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                bail!("invalid decimal string: {value:?}")
            }
        })
        .collect::<Result<Vec<_>>>()?;
    // strip leading zeros but keep a lone zero
    let first_nonzero = digits.iter().position(|&d| d != 0).unwrap_or(digits.len() - 1);
    Ok(digits[first_nonzero..].to_vec())
}
