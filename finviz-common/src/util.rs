//! Utility functions shared by the proxy crates.

/// Redact credentials from a string before it is logged.
///
/// Covers the `auth=` API key of export URIs and login form fields.
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        (r"(?i)\b(auth|api[_-]?key|apikey)=[^&\s]+", "$1=***REDACTED***"),
        (r"(?i)\b(password|passwd|pwd)=[^&\s]+", "$1=***REDACTED***"),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

/// Parse a duration string like "60", "30s", "5m", "1h" into seconds.
///
/// A bare number is taken as seconds.
pub fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".into());
    }

    if let Ok(num) = s.parse::<u64>() {
        return Ok(num);
    }

    let Some((split, _)) = s.char_indices().last() else {
        return Err("Empty duration string".into());
    };
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    let factor = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return Err(format!("Unknown unit: {unit}")),
    };
    num.checked_mul(factor).ok_or_else(|| format!("Duration too large: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_auth_key() {
        let uri = "o=price&f=exch_nasd&auth=0123-abcd";
        assert_eq!(sanitize_for_log(uri), "o=price&f=exch_nasd&auth=***REDACTED***");
    }

    #[test]
    fn test_sanitize_password() {
        let body = "email=me@example.com&password=hunter2";
        let sanitized = sanitize_for_log(body);
        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("email=me@example.com"));
    }

    #[test]
    fn test_sanitize_leaves_plain_uri() {
        assert_eq!(sanitize_for_log("o=-price&s=ta_topgainers"), "o=-price&s=ta_topgainers");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs("45"), Ok(45));
        assert_eq!(parse_duration_secs("30s"), Ok(30));
        assert_eq!(parse_duration_secs("5m"), Ok(300));
        assert_eq!(parse_duration_secs("1h"), Ok(3600));
        assert_eq!(parse_duration_secs("1d"), Ok(86400));
        assert!(parse_duration_secs("").is_err());
        assert!(parse_duration_secs("10x").is_err());
        assert!(parse_duration_secs("abc").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_without_panicking() {
        assert_eq!(parse_duration_secs("5µ"), Err("Unknown unit: µ".to_string()));
        assert!(parse_duration_secs("µ").is_err());
        assert!(parse_duration_secs(&format!("{}d", u64::MAX / 2)).is_err());
        assert_eq!(parse_duration_secs(&format!("{}s", u64::MAX)), Ok(u64::MAX));
    }
}
