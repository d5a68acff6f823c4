//! Utility functions: size-string parsing/formatting and positional templates

use crate::error::{Error, Result};

/// Parse a human-readable size string into bytes.
///
/// Grammar: `<digits>[.<digits>][<unit>]` where unit is one of
/// `{k,m,g,t,p,e,z}{i,}o`. Binary units (`kio`, `mio`, …) scale by powers of
/// 1024, decimal units (`ko`, `mo`, …) by powers of 1000. A unit without the
/// trailing `o` is tolerated by appending it (`"500k"` reads as `"500ko"`).
/// The result is truncated to an integer byte count.
///
/// # Examples
///
/// ```
/// use xdcc_dl::utils::parse_size;
///
/// assert_eq!(parse_size("1.5gio").unwrap(), (1.5 * (1u64 << 30) as f64) as u64);
/// assert_eq!(parse_size("2go").unwrap(), 2_000_000_000);
/// assert_eq!(parse_size("10").unwrap(), 10);
/// ```
pub fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim();

    let mut numeric_end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            numeric_end = i + 1;
        } else if c == '.' && !seen_dot && numeric_end > 0 {
            seen_dot = true;
            numeric_end = i + 1;
        } else {
            break;
        }
    }

    let numeric = &s[..numeric_end];
    if numeric.is_empty() {
        return Err(Error::InvalidSize {
            input: input.to_string(),
        });
    }

    let value: f64 = numeric.parse().map_err(|_| Error::InvalidSize {
        input: input.to_string(),
    })?;

    let mut unit = s[numeric_end..].to_ascii_lowercase();
    if unit.is_empty() {
        return Ok(value as u64);
    }
    if !unit.ends_with('o') {
        unit.push('o');
    }

    let factor = match unit.as_str() {
        "kio" => (1u64 << 10) as f64,
        "mio" => (1u64 << 20) as f64,
        "gio" => (1u64 << 30) as f64,
        "tio" => (1u64 << 40) as f64,
        "pio" => (1u64 << 50) as f64,
        "eio" => (1u64 << 60) as f64,
        "zio" => 1024f64.powi(7),
        "ko" => 1e3,
        "mo" => 1e6,
        "go" => 1e9,
        "to" => 1e12,
        "po" => 1e15,
        "eo" => 1e18,
        "zo" => 1e21,
        _ => {
            return Err(Error::InvalidSize {
                input: input.to_string(),
            });
        }
    };

    Ok((value * factor) as u64)
}

/// Format a byte count with binary suffixes (`KiB`, `MiB`, …) for display.
pub fn format_size(bytes: u64) -> String {
    let mut num = bytes as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if num.abs() < 1024.0 {
            return format!("{num:.1}{unit}B");
        }
        num /= 1024.0;
    }
    format!("{num:.1}YiB")
}

/// Instantiate a positional template from a pattern's capture groups.
///
/// Placeholders `$0$`, `$1$`, … are replaced with the capture groups in group
/// order. Placeholders without a matching group are left untouched.
pub fn substitute(template: &str, groups: &[String]) -> String {
    let mut out = template.to_string();
    for (i, group) in groups.iter().enumerate() {
        out = out.replace(&format!("${i}$"), group);
    }
    out
}

/// Reduce a display name to a safe file name: basename only, no traversal.
///
/// Returns `None` for names that reduce to nothing (empty, `.`, `..`).
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_units() {
        assert_eq!(parse_size("1kio").unwrap(), 1024);
        assert_eq!(parse_size("1mio").unwrap(), 1 << 20);
        assert_eq!(parse_size("1gio").unwrap(), 1 << 30);
        assert_eq!(parse_size("1tio").unwrap(), 1 << 40);
    }

    #[test]
    fn parses_decimal_units() {
        assert_eq!(parse_size("1ko").unwrap(), 1_000);
        assert_eq!(parse_size("3mo").unwrap(), 3_000_000);
        assert_eq!(parse_size("2go").unwrap(), 2_000_000_000);
    }

    #[test]
    fn fractional_binary_size_truncates() {
        // 1.5 * 2^30, truncated to an integer
        assert_eq!(parse_size("1.5gio").unwrap(), 1_610_612_736);
    }

    #[test]
    fn bare_number_is_bytes() {
        assert_eq!(parse_size("10").unwrap(), 10);
    }

    #[test]
    fn missing_o_suffix_is_tolerated() {
        assert_eq!(parse_size("500k").unwrap(), 500_000);
        assert_eq!(parse_size("2gi").unwrap(), 2 * (1 << 30));
    }

    #[test]
    fn unit_case_is_ignored() {
        assert_eq!(parse_size("1KiO").unwrap(), 1024);
        assert_eq!(parse_size("2GO").unwrap(), 2_000_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("12qo").is_err());
        assert!(parse_size(".5go").is_err());
    }

    #[test]
    fn formats_binary_suffixes() {
        assert_eq!(format_size(512), "512.0B");
        assert_eq!(format_size(1536), "1.5KiB");
        assert_eq!(format_size(1 << 20), "1.0MiB");
    }

    #[test]
    fn substitutes_groups_in_order() {
        let groups = vec!["ubuntu".to_string(), "24.04".to_string()];
        assert_eq!(
            substitute("http://mirror/$0$-$1$.iso", &groups),
            "http://mirror/ubuntu-24.04.iso"
        );
    }

    #[test]
    fn unmatched_placeholder_is_left_alone() {
        let groups = vec!["a".to_string()];
        assert_eq!(substitute("$0$/$1$", &groups), "a/$1$");
    }

    #[test]
    fn double_digit_placeholders_do_not_collide() {
        let groups: Vec<String> = (0..11).map(|i| format!("g{i}")).collect();
        assert_eq!(substitute("$1$|$10$", &groups), "g1|g10");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("a/b/c.iso").unwrap(), "c.iso");
        assert_eq!(sanitize_file_name("..\\evil.exe").unwrap(), "evil.exe");
        assert!(sanitize_file_name("..").is_none());
        assert!(sanitize_file_name("").is_none());
        assert!(sanitize_file_name("dir/").is_none());
    }
}
