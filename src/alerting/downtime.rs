const UNITS: [(&str, i64); 4] = [("days", 86_400), ("hours", 3_600), ("minutes", 60), ("seconds", 1)];

/// Renders a duration as days, hours, minutes and seconds.
///
/// Leading zero units are dropped; once a unit is shown every smaller unit is
/// shown too, so `3605` renders as `1 hours, 0 minutes, 5 seconds`. Seconds
/// are always present.
pub fn format_downtime(total_seconds: i64) -> String {
    let mut remaining = total_seconds.max(0);
    let mut parts = Vec::with_capacity(UNITS.len());
    for (name, size) in UNITS {
        let value = remaining / size;
        remaining %= size;
        if value > 0 || !parts.is_empty() || size == 1 {
            parts.push(format!("{value} {name}"));
        }
    }
    parts.join(", ")
}
