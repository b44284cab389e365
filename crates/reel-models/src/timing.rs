//! Timeline formatting helpers for reports and subtitle tracks.

/// Format seconds as `HH:MM:SS` for per-scene report timestamps.
pub fn format_timestamp(total_secs: f64) -> String {
    let total_secs = total_secs.max(0.0);
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = (total_secs % 60.0).floor() as u32;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Format seconds as `HH:MM:SS.mmm` for WebVTT cue times.
pub fn format_vtt_time(total_secs: f64) -> String {
    let total_secs = total_secs.max(0.0);
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(90.0), "00:01:30");
        assert_eq!(format_timestamp(3661.0), "01:01:01");
        assert_eq!(format_timestamp(6.7), "00:00:06");
    }

    #[test]
    fn test_format_vtt_time() {
        assert_eq!(format_vtt_time(0.0), "00:00:00.000");
        assert_eq!(format_vtt_time(6.5), "00:00:06.500");
        assert_eq!(format_vtt_time(90.25), "00:01:30.250");
        assert_eq!(format_vtt_time(3600.0), "01:00:00.000");
    }

    #[test]
    fn test_negative_clamped() {
        assert_eq!(format_timestamp(-3.0), "00:00:00");
        assert_eq!(format_vtt_time(-0.5), "00:00:00.000");
    }
}
