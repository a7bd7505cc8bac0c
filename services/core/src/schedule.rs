//! Weekly schedule rules
//!
//! An identity's schedule is a per-weekday ordered list of disjoint HH:MM
//! intervals, capped at eight hours of monitoring per day. Window resolution
//! works in the device's local time, reported as a UTC offset at check-in,
//! and yields UTC bounds for the monitoring session.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use crate::repositories::schedule::ScheduleEntry;

/// Maximum scheduled monitoring per weekday
const MAX_DAILY_MINUTES: i64 = 8 * 60;

/// Parse an HH:MM time-of-day value
pub fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| format!("Horario invalido: {}", value))
}

/// Validate a full schedule: well-formed times, start < end, disjoint
/// intervals, and at most eight hours total per weekday.
pub fn validate_entries(entries: &[ScheduleEntry]) -> Result<(), String> {
    for entry in entries {
        if !(0..=6).contains(&entry.weekday) {
            return Err(format!("Dia da semana invalido: {}", entry.weekday));
        }

        let start = parse_time(&entry.start_time)?;
        let end = parse_time(&entry.end_time)?;

        if start >= end {
            return Err(format!(
                "Intervalo invalido: {} >= {}",
                entry.start_time, entry.end_time
            ));
        }
    }

    for weekday in 0..=6i16 {
        let mut day: Vec<(NaiveTime, NaiveTime)> = entries
            .iter()
            .filter(|e| e.weekday == weekday)
            .map(|e| {
                // Parse errors were ruled out above.
                (
                    parse_time(&e.start_time).unwrap_or(NaiveTime::MIN),
                    parse_time(&e.end_time).unwrap_or(NaiveTime::MIN),
                )
            })
            .collect();

        day.sort_by_key(|(start, _)| *start);

        let mut total = Duration::zero();
        for window in day.windows(2) {
            if window[1].0 < window[0].1 {
                return Err("Intervalos sobrepostos no mesmo dia".to_string());
            }
        }

        for (start, end) in &day {
            total += *end - *start;
        }

        if total.num_minutes() > MAX_DAILY_MINUTES {
            return Err("Maximo de 8 horas de monitoramento por dia".to_string());
        }
    }

    Ok(())
}

/// Resolve the first interval containing the device's local time right now,
/// returning the session window in UTC. None means no window is due.
pub fn resolve_window(
    entries: &[ScheduleEntry],
    utc_now: DateTime<Utc>,
    offset_minutes: i32,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, String> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .ok_or_else(|| "Fuso horario invalido".to_string())?;
    let local = utc_now.with_timezone(&offset);
    let local_time = local.time();
    let local_date = local.date_naive();

    for entry in entries {
        let start = parse_time(&entry.start_time)?;
        let end = parse_time(&entry.end_time)?;

        if local_time >= start && local_time < end {
            let window_start = local_date
                .and_time(start)
                .and_local_timezone(offset)
                .single()
                .ok_or_else(|| "Janela local ambigua".to_string())?
                .with_timezone(&Utc);
            let window_end = local_date
                .and_time(end)
                .and_local_timezone(offset)
                .single()
                .ok_or_else(|| "Janela local ambigua".to_string())?
                .with_timezone(&Utc);

            return Ok(Some((window_start, window_end)));
        }
    }

    Ok(None)
}

/// Weekday index for a device-local timestamp, Monday = 0
pub fn local_weekday(utc_now: DateTime<Utc>, offset_minutes: i32) -> Result<i16, String> {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .ok_or_else(|| "Fuso horario invalido".to_string())?;
    let local = utc_now.with_timezone(&offset);

    Ok(chrono::Datelike::weekday(&local).num_days_from_monday() as i16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(weekday: i16, start: &str, end: &str) -> ScheduleEntry {
        ScheduleEntry {
            weekday,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(
            parse_time("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert!(parse_time("8h30").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn accepts_disjoint_schedule() {
        let entries = vec![
            entry(0, "08:00", "10:00"),
            entry(0, "14:00", "16:00"),
            entry(3, "22:00", "23:30"),
        ];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn rejects_inverted_interval() {
        assert!(validate_entries(&[entry(0, "10:00", "08:00")]).is_err());
    }

    #[test]
    fn rejects_overlap_on_same_day() {
        let entries = vec![entry(2, "08:00", "12:00"), entry(2, "11:00", "13:00")];
        assert!(validate_entries(&entries).is_err());
    }

    #[test]
    fn allows_same_interval_on_different_days() {
        let entries = vec![entry(1, "08:00", "12:00"), entry(2, "08:00", "12:00")];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn rejects_more_than_eight_hours_per_day() {
        let entries = vec![entry(5, "06:00", "12:00"), entry(5, "13:00", "18:00")];
        assert!(validate_entries(&entries).is_err());
    }

    #[test]
    fn exactly_eight_hours_is_allowed() {
        assert!(validate_entries(&[entry(5, "08:00", "16:00")]).is_ok());
    }

    #[test]
    fn rejects_bad_weekday() {
        assert!(validate_entries(&[entry(7, "08:00", "09:00")]).is_err());
    }

    #[test]
    fn resolves_window_inside_interval() {
        // 2026-03-02 is a Monday. Device at UTC-03:00, local time 08:30.
        let utc_now = Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap();
        let entries = vec![entry(0, "08:00", "10:00")];

        let (start, end) = resolve_window(&entries, utc_now, -180).unwrap().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap());
    }

    #[test]
    fn no_window_outside_intervals() {
        let utc_now = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        let entries = vec![entry(0, "08:00", "10:00")];
        assert!(resolve_window(&entries, utc_now, -180).unwrap().is_none());
    }

    #[test]
    fn window_end_is_exclusive() {
        // Local time exactly 10:00: the 08:00-10:00 interval no longer matches.
        let utc_now = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
        let entries = vec![entry(0, "08:00", "10:00")];
        assert!(resolve_window(&entries, utc_now, -180).unwrap().is_none());
    }

    #[test]
    fn picks_first_matching_interval() {
        let utc_now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let entries = vec![entry(0, "08:00", "10:00"), entry(0, "08:30", "09:45")];
        // Local 09:00 at UTC-03:00; the first listed interval wins.
        let (start, _) = resolve_window(&entries, utc_now, -180).unwrap().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap());
    }

    #[test]
    fn local_weekday_crosses_date_line() {
        // 2026-03-02 01:00 UTC is still Sunday 2026-03-01 22:00 at UTC-03:00.
        let utc_now = Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap();
        assert_eq!(local_weekday(utc_now, 0).unwrap(), 0);
        assert_eq!(local_weekday(utc_now, -180).unwrap(), 6);
    }
}
