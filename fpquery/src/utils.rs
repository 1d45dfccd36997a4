use std::fmt::{Display, Formatter};

/// Seconds rendered as `H:MM:SS.ff`.
pub struct DurationDisplay(u64);

pub trait DurationExt {
    fn display_duration(&self) -> DurationDisplay;
}

impl DurationExt for f32 {
    fn display_duration(&self) -> DurationDisplay {
        DurationDisplay((self.max(0.0) * 100.0).round() as _)
    }
}

impl Display for DurationDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let centis = self.0 % 100;
        let total_secs = self.0 / 100;
        let (hours, minutes, seconds) = (total_secs / 3600, total_secs / 60 % 60, total_secs % 60);

        write!(f, "{hours}:{minutes:02}:{seconds:02}.{centis:02}")
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::DurationExt;

    #[test]
    fn formats_hours_minutes_and_hundredths() {
        assert_eq!("0:00:00.00", 0.0f32.display_duration().to_string());
        assert_eq!("0:01:05.25", 65.25f32.display_duration().to_string());
        assert_eq!("1:00:00.50", 3600.5f32.display_duration().to_string());
        assert_eq!("0:00:00.00", (-2.0f32).display_duration().to_string());
    }
}
