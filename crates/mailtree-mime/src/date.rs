//! `Date:` header parsing.
//!
//! Accepts RFC 5322 dates and the usual deviations: leading comments or
//! other noise, a missing weekday, two-digit years, missing seconds,
//! obsolete zone names, a missing zone, and `asctime`-style ordering.
//! The result is always converted to UTC.

use crate::content_type::strip_comments;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parses a date header value into a UTC instant.
///
/// ```
/// use mailtree_mime::parse_date;
///
/// let date = parse_date("Mon, 24 Jun 2013 10:37:36 +0100").unwrap();
/// assert_eq!(date.to_rfc3339(), "2013-06-24T09:37:36+00:00");
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] when no day, month, year and time can
/// be found.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let cleaned = strip_comments(input);
    let tokens = tokenize(&cleaned);

    parse_tokens(&tokens)
        .or_else(|| parse_rfc3339(cleaned.trim()))
        .ok_or_else(|| {
            tracing::debug!(input, "Unparsable date");
            Error::InvalidDate(input.trim().to_string())
        })
}

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .flat_map(|token| {
            // 24-Jun-2013
            let dashed = token.matches('-').count() == 2
                && token.starts_with(|c: char| c.is_ascii_digit());
            if dashed {
                token.split('-').map(str::to_string).collect::<Vec<_>>()
            } else {
                vec![token.to_string()]
            }
        })
        .collect()
}

/// Finds the date in `tokens`, skipping anything before it.
fn parse_tokens(tokens: &[String]) -> Option<DateTime<Utc>> {
    (0..tokens.len()).find_map(|start| parse_from(&tokens[start..]))
}

/// Reads `day month year time [zone]` or `month day time year [zone]`.
fn parse_from(tokens: &[String]) -> Option<DateTime<Utc>> {
    let (day, month, rest) = match tokens {
        [day, month, rest @ ..] if is_day(day) && month_number(month).is_some() => {
            (day.parse().ok()?, month_number(month)?, rest)
        }
        [month, day, rest @ ..] if is_day(day) && month_number(month).is_some() => {
            (day.parse().ok()?, month_number(month)?, rest)
        }
        _ => return None,
    };

    let (year, time, rest) = match rest {
        [year, time, rest @ ..] if !year.contains(':') => (parse_year(year)?, parse_time(time)?, rest),
        [time, year, rest @ ..] => (parse_year(year)?, parse_time(time)?, rest),
        _ => return None,
    };

    let offset = rest.first().map_or(Some(0), |zone| parse_zone(zone))?;
    let naive = NaiveDateTime::new(NaiveDate::from_ymd_opt(year, month, day)?, time);

    FixedOffset::east_opt(offset)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_day(token: &str) -> bool {
    (1..=2).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_digit())
}

fn month_number(token: &str) -> Option<u32> {
    let lowered = token.to_ascii_lowercase();
    let prefix = lowered.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .and_then(|i| u32::try_from(i + 1).ok())
}

/// Two-digit years below 50 are 20xx, others 19xx; three-digit years
/// count from 1900.
fn parse_year(token: &str) -> Option<i32> {
    if token.is_empty() || token.len() > 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token.parse().ok()?;
    Some(match token.len() {
        1 | 2 if year < 50 => year + 2000,
        1 | 2 | 3 => year + 1900,
        _ => year,
    })
}

/// Reads `hh:mm` or `hh:mm:ss`, tolerating fractional or leap seconds.
fn parse_time(token: &str) -> Option<NaiveTime> {
    let mut fields = token.split(':');
    let hour: u32 = fields.next()?.parse().ok()?;
    let minute: u32 = fields.next()?.parse().ok()?;
    let second: u32 = match fields.next() {
        Some(s) => s.split('.').next()?.parse().ok()?,
        None => 0,
    };
    if fields.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, second.min(59))
}

/// Zone offset in seconds east of UTC.
fn parse_zone(token: &str) -> Option<i32> {
    let token = token.trim();
    if let Some(sign) = token.chars().next().filter(|c| matches!(c, '+' | '-')) {
        let digits: String = token[1..].chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 4 {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        let offset = hours * 3600 + minutes * 60;
        return Some(if sign == '-' { -offset } else { offset });
    }

    let hours = match token.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        // UT, GMT, Z, military zones and anything unknown
        _ => 0,
    };
    Some(hours * 3600)
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_simple_date() {
        let date = parse_date("Mon, 24 Jun 2013 10:37:36 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_clean_input() {
        let date = parse_date("(noise\\input)Mon, 24 Jun 2013 10:37:36 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_result_is_utc() {
        let date = parse_date("Mon, 24 Jun 2013 10:37:36 +0100").unwrap();
        assert_eq!(date.timezone(), Utc);
    }

    #[test]
    fn test_no_day_of_week() {
        let date = parse_date("24 Jun 2013 10:37:36 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_two_digit_year() {
        let date = parse_date("Mon, 24 Jun 13 10:37:36 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
        let date = parse_date("Fri, 21 Nov 97 09:55:06 -0600").unwrap();
        assert_eq!(date, utc(1997, 11, 21, 15, 55, 6));
    }

    #[test]
    fn test_no_seconds() {
        let date = parse_date("Mon, 24 Jun 2013 10:37 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 0));
    }

    #[test]
    fn test_negative_offset_crosses_midnight() {
        let date = parse_date("Tue, 31 Dec 2019 22:30:00 -0330").unwrap();
        assert_eq!(date, utc(2020, 1, 1, 2, 0, 0));
    }

    #[test]
    fn test_obsolete_zones() {
        assert_eq!(
            parse_date("24 Jun 2013 10:37:36 GMT").unwrap(),
            utc(2013, 6, 24, 10, 37, 36)
        );
        assert_eq!(
            parse_date("24 Jun 2013 10:37:36 EST").unwrap(),
            utc(2013, 6, 24, 15, 37, 36)
        );
        assert_eq!(
            parse_date("24 Jun 2013 10:37:36").unwrap(),
            utc(2013, 6, 24, 10, 37, 36)
        );
    }

    #[test]
    fn test_trailing_zone_comment() {
        let date = parse_date("Mon, 24 Jun 2013 10:37:36 +0100 (CET)").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_asctime_order() {
        let date = parse_date("Mon Jun 24 10:37:36 2013").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 10, 37, 36));
    }

    #[test]
    fn test_dashed_date() {
        let date = parse_date("24-Jun-2013 10:37:36 +0000").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 10, 37, 36));
    }

    #[test]
    fn test_full_month_name() {
        let date = parse_date("Monday, 24 June 2013 10:37:36 +0100").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_rfc3339_fallback() {
        let date = parse_date("2013-06-24T10:37:36+01:00").unwrap();
        assert_eq!(date, utc(2013, 6, 24, 9, 37, 36));
    }

    #[test]
    fn test_invalid_dates() {
        assert!(matches!(parse_date(""), Err(Error::InvalidDate(_))));
        assert!(parse_date("not a date").is_err());
        assert!(parse_date("31 Feb 2013 10:00:00 +0000").is_err());
        assert!(parse_date("24 Jun 2013").is_err());
    }
}
