//! Millisecond time values with calendar arithmetic.
//!
//! A [`DateValue`] is a count of milliseconds since the Unix epoch, or `NaN`
//! for an invalid date. Field setters recompose the value from its calendar
//! fields the way ECMAScript dates do, so out-of-range fields roll over
//! (`setDate(32)` lands in the next month) and a `NaN` argument invalidates
//! the date. Calendar decomposition and the local time zone come from
//! `chrono`.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_SECOND: f64 = 1_000.0;
const MAX_TIME: f64 = 8.64e15;
/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Which clock calendar fields are read and written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Local,
    Utc,
}

/// Calendar fields in setter order: a setter starting at one field also
/// accepts values for the fields after it within the same date or time group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    FullYear,
    Month,
    Date,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl DateField {
    fn position(self) -> usize {
        self as usize
    }

    /// Number of arguments the matching setter consumes at most.
    pub fn arity(self) -> usize {
        let group_end = if self.position() <= DateField::Date.position() {
            3
        } else {
            7
        };
        group_end - self.position()
    }
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    values: [f64; 7],
    weekday: f64,
}

#[derive(Clone, Copy, PartialEq)]
pub struct DateValue {
    time: f64,
}

impl DateValue {
    pub fn from_time(time: f64) -> Self {
        DateValue {
            time: time_clip(time),
        }
    }

    pub fn invalid() -> Self {
        DateValue { time: f64::NAN }
    }

    pub fn now() -> Self {
        Self::from_time(Utc::now().timestamp_millis() as f64)
    }

    /// Builds a date from UTC calendar fields (`month` is zero-based).
    pub fn from_utc(year: f64, month: f64, date: f64, hours: f64, minutes: f64, seconds: f64, ms: f64) -> Self {
        Self::from_time(make_date(
            make_day(year, month, date),
            make_time(hours, minutes, seconds, ms),
        ))
    }

    /// Builds a date from local calendar fields (`month` is zero-based).
    pub fn from_local(year: f64, month: f64, date: f64, hours: f64, minutes: f64, seconds: f64, ms: f64) -> Self {
        Self::from_time(utc_from_local(make_date(
            make_day(year, month, date),
            make_time(hours, minutes, seconds, ms),
        )))
    }

    /// Parses RFC 3339 timestamps, date-only ISO forms (UTC) and date-time
    /// forms without an offset (local). Anything else is an invalid date.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
            return Self::from_time(parsed.timestamp_millis() as f64);
        }
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            return Self::from_time(days_from_epoch(date) as f64 * MS_PER_DAY);
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                let local = naive.and_utc().timestamp_millis() as f64;
                return Self::from_time(utc_from_local(local));
            }
        }
        Self::invalid()
    }

    /// Milliseconds since the epoch; `NaN` when invalid.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_valid(&self) -> bool {
        !self.time.is_nan()
    }

    pub fn get(&self, field: DateField, zone: Zone) -> f64 {
        self.fields(zone)
            .map_or(f64::NAN, |fields| fields.values[field.position()])
    }

    /// Day of the week, Sunday being 0.
    pub fn day(&self, zone: Zone) -> f64 {
        self.fields(zone).map_or(f64::NAN, |fields| fields.weekday)
    }

    /// Minutes to add to local time to get UTC.
    pub fn timezone_offset(&self) -> f64 {
        if !self.is_valid() {
            return f64::NAN;
        }
        -local_offset_ms(self.time) / MS_PER_MINUTE
    }

    /// Local full year minus 1900.
    pub fn year(&self) -> f64 {
        self.get(DateField::FullYear, Zone::Local) - 1900.0
    }

    /// Replaces `field` and, from `values[1..]`, the fields after it, then
    /// returns the new time value.
    ///
    /// Only a full-year write revives an invalid date (from the epoch).
    pub fn set(&mut self, field: DateField, values: &[f64], zone: Zone) -> f64 {
        let base = if self.is_valid() {
            self.fields(zone)
        } else if field == DateField::FullYear {
            decompose(0.0)
        } else {
            None
        };
        let Some(mut fields) = base else {
            self.time = f64::NAN;
            return self.time;
        };
        let start = field.position();
        for (offset, value) in values.iter().take(field.arity()).enumerate() {
            fields.values[start + offset] = *value;
        }
        let [year, month, date, hours, minutes, seconds, ms] = fields.values;
        let composed = make_date(
            make_day(year, month, date),
            make_time(hours, minutes, seconds, ms),
        );
        self.time = time_clip(match zone {
            Zone::Local => utc_from_local(composed),
            Zone::Utc => composed,
        });
        self.time
    }

    pub fn set_time(&mut self, time: f64) -> f64 {
        self.time = time_clip(time);
        self.time
    }

    /// Legacy two-digit-aware year setter: 0..=99 means 1900..=1999.
    pub fn set_year(&mut self, year: f64) -> f64 {
        if year.is_nan() {
            self.time = f64::NAN;
            return self.time;
        }
        let year = year.trunc();
        let full_year = if (0.0..=99.0).contains(&year) {
            1900.0 + year
        } else {
            year
        };
        self.set(DateField::FullYear, &[full_year], Zone::Local)
    }

    /// `YYYY-MM-DDTHH:mm:ss.sssZ`, or `None` for an invalid date.
    pub fn to_iso_string(&self) -> Option<String> {
        let f = self.fields(Zone::Utc)?.values;
        Some(format!(
            "{}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            iso_year(f[0]),
            f[1] as i64 + 1,
            f[2] as i64,
            f[3] as i64,
            f[4] as i64,
            f[5] as i64,
            f[6] as i64
        ))
    }

    /// `Tue, 15 Oct 2024 12:00:00 GMT`
    pub fn to_utc_string(&self) -> String {
        let Some(fields) = self.fields(Zone::Utc) else {
            return INVALID.to_string();
        };
        let f = fields.values;
        format!(
            "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
            WEEKDAYS[fields.weekday as usize],
            f[2] as i64,
            MONTHS[f[1] as usize],
            display_year(f[0]),
            f[3] as i64,
            f[4] as i64,
            f[5] as i64
        )
    }

    /// `Tue Oct 15 2024`
    pub fn to_date_string(&self) -> String {
        let Some(fields) = self.fields(Zone::Local) else {
            return INVALID.to_string();
        };
        let f = fields.values;
        format!(
            "{} {} {:02} {}",
            WEEKDAYS[fields.weekday as usize],
            MONTHS[f[1] as usize],
            f[2] as i64,
            display_year(f[0])
        )
    }

    /// `14:00:00 GMT+0200`
    pub fn to_time_string(&self) -> String {
        let Some(fields) = self.fields(Zone::Local) else {
            return INVALID.to_string();
        };
        let f = fields.values;
        let offset = (local_offset_ms(self.time) / MS_PER_MINUTE) as i64;
        let sign = if offset < 0 { '-' } else { '+' };
        format!(
            "{:02}:{:02}:{:02} GMT{}{:02}{:02}",
            f[3] as i64,
            f[4] as i64,
            f[5] as i64,
            sign,
            offset.abs() / 60,
            offset.abs() % 60
        )
    }

    /// `Tue Oct 15 2024 14:00:00 GMT+0200`
    pub fn to_date_time_string(&self) -> String {
        if !self.is_valid() {
            return INVALID.to_string();
        }
        format!("{} {}", self.to_date_string(), self.to_time_string())
    }

    fn fields(&self, zone: Zone) -> Option<Fields> {
        if !self.is_valid() {
            return None;
        }
        match zone {
            Zone::Utc => decompose(self.time),
            Zone::Local => decompose(self.time + local_offset_ms(self.time)),
        }
    }
}

impl std::fmt::Debug for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_iso_string() {
            Some(iso) => write!(f, "DateValue({iso})"),
            None => f.write_str("DateValue(Invalid Date)"),
        }
    }
}

const INVALID: &str = "Invalid Date";

fn iso_year(year: f64) -> String {
    let year = year as i64;
    if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else if year < 0 {
        format!("-{:06}", -year)
    } else {
        format!("+{year:06}")
    }
}

fn display_year(year: f64) -> String {
    let year = year as i64;
    if year < 0 {
        format!("-{:06}", -year)
    } else {
        format!("{year:04}")
    }
}

fn days_from_epoch(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
}

fn decompose(t: f64) -> Option<Fields> {
    if !t.is_finite() {
        return None;
    }
    let day = (t / MS_PER_DAY).floor();
    let within = t - day * MS_PER_DAY;
    let days_from_ce = i32::try_from(day as i64 + UNIX_EPOCH_DAYS_FROM_CE).ok()?;
    let date = NaiveDate::from_num_days_from_ce_opt(days_from_ce)?;
    Some(Fields {
        values: [
            f64::from(date.year()),
            f64::from(date.month0()),
            f64::from(date.day()),
            (within / MS_PER_HOUR).floor(),
            (within / MS_PER_MINUTE).floor() % 60.0,
            (within / MS_PER_SECOND).floor() % 60.0,
            within % MS_PER_SECOND,
        ],
        weekday: f64::from(date.weekday().num_days_from_sunday()),
    })
}

fn make_time(hours: f64, minutes: f64, seconds: f64, ms: f64) -> f64 {
    if ![hours, minutes, seconds, ms].iter().all(|n| n.is_finite()) {
        return f64::NAN;
    }
    hours.trunc() * MS_PER_HOUR
        + minutes.trunc() * MS_PER_MINUTE
        + seconds.trunc() * MS_PER_SECOND
        + ms.trunc()
}

fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if ![year, month, date].iter().all(|n| n.is_finite()) {
        return f64::NAN;
    }
    let month = month.trunc();
    let year = year.trunc() + (month / 12.0).floor();
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    let month_in_year = month.rem_euclid(12.0) as u32;
    match NaiveDate::from_ymd_opt(year as i32, month_in_year + 1, 1) {
        Some(first) => days_from_epoch(first) as f64 + date.trunc() - 1.0,
        None => f64::NAN,
    }
}

fn make_date(day: f64, time: f64) -> f64 {
    if !day.is_finite() || !time.is_finite() {
        return f64::NAN;
    }
    day * MS_PER_DAY + time
}

fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        return f64::NAN;
    }
    t.trunc() + 0.0
}

/// Offset of local time from UTC at UTC instant `t`, in milliseconds.
fn local_offset_ms(t: f64) -> f64 {
    match Local.timestamp_millis_opt(t as i64).earliest() {
        Some(local) => f64::from(local.offset().local_minus_utc()) * MS_PER_SECOND,
        None => 0.0,
    }
}

/// Converts a local wall-clock time value to UTC. Ambiguous wall times
/// resolve to the earlier instant; wall times inside a gap use the offset in
/// effect before it.
fn utc_from_local(local: f64) -> f64 {
    if !local.is_finite() || local.abs() > MAX_TIME + MS_PER_DAY {
        return f64::NAN;
    }
    let Some(naive) = DateTime::from_timestamp_millis(local as i64).map(|d| d.naive_utc()) else {
        return f64::NAN;
    };
    let offset = match Local.from_local_datetime(&naive).earliest() {
        Some(resolved) => resolved.offset().local_minus_utc(),
        None => Local.offset_from_utc_datetime(&naive).local_minus_utc(),
    };
    local - f64::from(offset) * MS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(year: f64, month: f64, date: f64) -> DateValue {
        DateValue::from_utc(year, month, date, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn epoch_decomposes() {
        let epoch = DateValue::from_time(0.0);
        assert_eq!(epoch.get(DateField::FullYear, Zone::Utc), 1970.0);
        assert_eq!(epoch.get(DateField::Month, Zone::Utc), 0.0);
        assert_eq!(epoch.get(DateField::Date, Zone::Utc), 1.0);
        assert_eq!(epoch.day(Zone::Utc), 4.0);
        assert_eq!(epoch.to_iso_string().unwrap(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn setters_roll_over_out_of_range_fields() {
        let mut date = utc(2024.0, 0.0, 31.0);
        date.set(DateField::Date, &[32.0], Zone::Utc);
        assert_eq!(date.to_iso_string().unwrap(), "2024-02-01T00:00:00.000Z");
        date.set(DateField::Month, &[12.0], Zone::Utc);
        assert_eq!(date.to_iso_string().unwrap(), "2025-01-01T00:00:00.000Z");
        date.set(DateField::Hours, &[25.0, 61.0], Zone::Utc);
        assert_eq!(date.to_iso_string().unwrap(), "2025-01-02T02:01:00.000Z");
    }

    #[test]
    fn multi_argument_setters_respect_arity() {
        let mut date = utc(2020.0, 5.0, 15.0);
        date.set(DateField::FullYear, &[2021.0, 1.0, 3.0, 99.0], Zone::Utc);
        assert_eq!(date.to_iso_string().unwrap(), "2021-02-03T00:00:00.000Z");
        assert_eq!(DateField::Seconds.arity(), 2);
        assert_eq!(DateField::Month.arity(), 2);
    }

    #[test]
    fn nan_invalidates_and_full_year_revives() {
        let mut date = utc(2020.0, 0.0, 1.0);
        assert!(date.set(DateField::Minutes, &[f64::NAN], Zone::Utc).is_nan());
        assert!(date.to_iso_string().is_none());
        assert_eq!(date.to_utc_string(), "Invalid Date");
        assert!(date.set(DateField::Date, &[3.0], Zone::Utc).is_nan());
        date.set(DateField::FullYear, &[2000.0], Zone::Utc);
        assert_eq!(date.to_iso_string().unwrap(), "2000-01-01T00:00:00.000Z");
    }

    #[test]
    fn string_forms() {
        let date = DateValue::from_utc(2024.0, 9.0, 15.0, 12.0, 5.0, 9.0, 7.0);
        assert_eq!(date.to_utc_string(), "Tue, 15 Oct 2024 12:05:09 GMT");
        assert_eq!(date.to_iso_string().unwrap(), "2024-10-15T12:05:09.007Z");
        assert_eq!(utc(-1.0, 0.0, 1.0).to_iso_string().unwrap(), "-000001-01-01T00:00:00.000Z");
    }

    #[test]
    fn parses_iso_forms() {
        assert_eq!(DateValue::parse("1970-01-02").time(), MS_PER_DAY);
        assert_eq!(DateValue::parse("1970-01-01T00:00:01Z").time(), 1000.0);
        assert!(!DateValue::parse("not a date").is_valid());
    }

    #[test]
    fn time_values_are_clipped() {
        assert!(!DateValue::from_time(MAX_TIME + 1.0).is_valid());
        assert_eq!(DateValue::from_time(1.9).time(), 1.0);
    }
}
