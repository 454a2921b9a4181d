//! Utility functions for chordfs

/// Parse duration string (e.g., "500ms", "3s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else {
        let last = s.char_indices().last().map(|(i, _)| i).unwrap_or(0);
        s.split_at(last)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Validate a file name (must be non-empty, reasonable length, printable)
pub fn validate_filename(filename: &str) -> crate::Result<()> {
    if filename.is_empty() {
        return Err(crate::Error::InvalidConfig("filename cannot be empty".into()));
    }

    if filename.len() > 1024 {
        return Err(crate::Error::InvalidConfig(
            "filename too long (max 1024 bytes)".into(),
        ));
    }

    if filename.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidConfig(
            "filename contains invalid characters".into(),
        ));
    }

    Ok(())
}
