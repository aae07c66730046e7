pub fn format_meters(meters: f32) -> String {
    if !meters.is_finite() {
        return "? m".to_owned();
    }
    if meters.abs() < 1.0 {
        format!("{:.0} cm", meters * 100.0)
    } else {
        format!("{meters:.2} m")
    }
}

pub fn format_age(age_ms: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(3_600_000, "h"), (60_000, "m"), (1_000, "s")];

    if age_ms < 1_000 {
        return format!("{age_ms} ms");
    }

    let mut remaining = age_ms;
    let mut parts = Vec::new();
    for (unit_ms, suffix) in UNITS {
        let value = remaining / unit_ms;
        remaining %= unit_ms;
        if value > 0 || !parts.is_empty() {
            parts.push(format!("{value}{suffix}"));
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}
