//! Units formatting and conversion utilities
//!
//! Human-readable sizes, durations, throughput and ETA text for progress
//! and summary output.

use std::time::Duration;

const BINARY_UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format bytes into human-readable size with binary units
///
/// # Examples
/// ```
/// use skipwipe::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// assert_eq!(format_bytes(1073741824), "1.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let (value, unit) = scale_binary(bytes as f64);
    format!("{:.1} {}", value, unit)
}

/// Parse a size such as `4096`, `4MiB` or `1.5 GB` into bytes
///
/// # Examples
/// ```
/// use skipwipe::util::units::parse_bytes;
///
/// assert_eq!(parse_bytes("4MiB").unwrap(), 4194304);
/// assert_eq!(parse_bytes("1.5 KiB").unwrap(), 1536);
/// assert_eq!(parse_bytes("2 GB").unwrap(), 2000000000);
/// ```
pub fn parse_bytes(input: &str) -> Result<u64, String> {
    let input = input.trim();

    let split_pos = input
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(input.len());
    let number_part = input[..split_pos].trim();
    let unit_part = input[split_pos..].trim();

    let number: f64 = number_part
        .parse()
        .map_err(|_| format!("Invalid number: {}", number_part))?;

    if !number.is_finite() || number < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier = match unit_part.to_uppercase().as_str() {
        "" | "B" => 1u64,
        "K" | "KIB" => 1 << 10,
        "M" | "MIB" => 1 << 20,
        "G" | "GIB" => 1 << 30,
        "T" | "TIB" => 1 << 40,
        "KB" => 1_000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        "TB" => 1_000_000_000_000,
        _ => return Err(format!("Unknown unit: {}", unit_part)),
    };

    let bytes = number * multiplier as f64;
    if bytes > u64::MAX as f64 {
        return Err(format!("Size too large: {}", input));
    }
    Ok(bytes as u64)
}

/// Format a duration as `1h 2m 3s`, with days for long wipes
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use skipwipe::util::units::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if total_secs > 0 {
        if millis > 0 {
            format!("{}.{:02}s", total_secs, millis / 10)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        format!("{}ms", millis)
    }
}

/// Format an ETA, `unknown` when no estimate exists
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => format_duration(Duration::from_secs(eta.as_secs())),
        None => "unknown".to_string(),
    }
}

/// Format a bytes/second rate with binary units
///
/// # Examples
/// ```
/// use skipwipe::util::units::format_throughput;
///
/// assert_eq!(format_throughput(1572864.0), "1.5 MiB/s");
/// assert_eq!(format_throughput(0.0), "0 B/s");
/// ```
pub fn format_throughput(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 B/s".to_string();
    }
    if bytes_per_sec < 1024.0 {
        return format!("{:.0} B/s", bytes_per_sec);
    }
    let (value, unit) = scale_binary(bytes_per_sec);
    format!("{:.1} {}/s", value, unit)
}

fn scale_binary(mut value: f64) -> (f64, &'static str) {
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < BINARY_UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    (value, BINARY_UNITS[unit_index])
}
