//! Fixed-width and CSV rendering helpers shared by the report commands.

use hifitime::Epoch;

pub fn format_time(epoch: Epoch) -> String {
    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{:03}",
        nanos / 1_000_000
    )
}

pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1 << 30 => format!("{:.1}GB", b as f64 / f64::from(1u32 << 30)),
        b if b >= 1 << 20 => format!("{:.1}MB", b as f64 / f64::from(1u32 << 20)),
        b if b >= 1 << 10 => format!("{:.1}KB", b as f64 / f64::from(1u32 << 10)),
        b => format!("{b}B"),
    }
}
