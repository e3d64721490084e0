//! Resource quantity parsing.
//!
//! CPU quantities come in nanocores (`n`), microcores (`u`), millicores
//! (`m`) or plain cores. Memory quantities carry binary (`Ki`..`Ei`) or
//! decimal (`k`/`K`..`E`) suffixes, or are plain bytes.

use thiserror::Error;

/// Errors from quantity parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity: {0:?}")]
    Invalid(String),
}

/// CPU suffixes as divisors into cores.
const CPU_SUFFIXES: &[(&str, f64)] = &[("n", 1e9), ("u", 1e6), ("m", 1e3)];

/// Memory suffixes as byte multipliers.
///
/// Binary suffixes come first so `Mi` is never read as `M` followed by a
/// stray `i`.
const MEMORY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
    ("k", 1e3),
    ("K", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a CPU quantity into cores.
pub fn parse_cpu(quantity: &str) -> Result<f64, QuantityError> {
    let quantity = quantity.trim();
    for (suffix, divisor) in CPU_SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return parse_number(number, quantity).map(|n| n / divisor);
        }
    }
    parse_number(quantity, quantity)
}

/// Parse a memory quantity into bytes.
pub fn parse_memory(quantity: &str) -> Result<f64, QuantityError> {
    let quantity = quantity.trim();
    for (suffix, multiplier) in MEMORY_SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return parse_number(number, quantity).map(|n| n * multiplier);
        }
    }
    parse_number(quantity, quantity)
}

fn parse_number(number: &str, raw: &str) -> Result<f64, QuantityError> {
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }
    match number.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(QuantityError::Invalid(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_suffixes() {
        assert_eq!(parse_cpu("250m").unwrap(), 0.25);
        assert_eq!(parse_cpu("500000000n").unwrap(), 0.5);
        assert_eq!(parse_cpu("1500000u").unwrap(), 1.5);
        assert_eq!(parse_cpu("4").unwrap(), 4.0);
        assert_eq!(parse_cpu("0.5").unwrap(), 0.5);
    }

    #[test]
    fn memory_binary_suffixes() {
        assert_eq!(parse_memory("1Gi").unwrap(), 1_073_741_824.0);
        assert_eq!(parse_memory("512Mi").unwrap(), 536_870_912.0);
        assert_eq!(parse_memory("16Ki").unwrap(), 16_384.0);
        assert_eq!(parse_memory("1Ti").unwrap(), 1_099_511_627_776.0);
        assert_eq!(parse_memory("1.5Gi").unwrap(), 1_610_612_736.0);
    }

    #[test]
    fn memory_decimal_suffixes() {
        assert_eq!(parse_memory("2G").unwrap(), 2_000_000_000.0);
        assert_eq!(parse_memory("3M").unwrap(), 3_000_000.0);
        assert_eq!(parse_memory("8K").unwrap(), 8_000.0);
        assert_eq!(parse_memory("8k").unwrap(), 8_000.0);
        assert_eq!(parse_memory("1T").unwrap(), 1e12);
    }

    #[test]
    fn binary_and_decimal_are_distinct() {
        assert_ne!(parse_memory("1Mi").unwrap(), parse_memory("1M").unwrap());
        assert_ne!(parse_memory("1Gi").unwrap(), parse_memory("1G").unwrap());
    }

    #[test]
    fn memory_plain_bytes() {
        assert_eq!(parse_memory("128974848").unwrap(), 128_974_848.0);
        assert_eq!(parse_memory(" 1024 ").unwrap(), 1024.0);
    }

    #[test]
    fn malformed_quantities() {
        assert_eq!(parse_cpu(""), Err(QuantityError::Empty));
        assert_eq!(parse_memory("   "), Err(QuantityError::Empty));
        assert!(matches!(parse_cpu("abc"), Err(QuantityError::Invalid(_))));
        assert!(matches!(parse_cpu("m"), Err(QuantityError::Invalid(_))));
        assert!(matches!(parse_memory("12Xi"), Err(QuantityError::Invalid(_))));
        assert!(matches!(parse_memory("inf"), Err(QuantityError::Invalid(_))));
    }
}
