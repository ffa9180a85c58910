//! Parsing of the `$GPZDA` NMEA sentence (date and time), the one sentence
//! the external-reference discipline needs out of the configured set
//! (§4.7). Grounded on `gps_process_gpzda_sentence`/`gps_process_nmea_sentence`.

use ptp_core::time::Time;

/// The wall-clock time carried by a `$GPZDA` sentence, already advanced by
/// one second: the GPS receiver reports the time of the *start* of the
/// second that is about to elapse, and the PPS edge marks its end
/// (`gps_process_gpzda_sentence`'s `gps_parse_time += 1000000000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPpsTime(pub Time);

/// Parse a `$GPZDA` sentence of the form
/// `$GPZDA,hhmmss.sss,dd,mm,yyyy,xx,yy*CS`. Returns `None` on anything that
/// doesn't look like a well-formed, in-range date/time, mirroring the
/// original's defensive field-range checks.
pub fn parse_gpzda(sentence: &str) -> Option<NextPpsTime> {
    let sentence = sentence.trim_end_matches(['\r', '\n']);
    let body = sentence.split('*').next().unwrap_or(sentence);
    let mut fields = body.split(',');

    let talker = fields.next()?;
    if talker != "$GPZDA" {
        return None;
    }

    let time_field = fields.next()?;
    let day: u32 = fields.next()?.parse().ok()?;
    let month: u32 = fields.next()?.parse().ok()?;
    let year: i32 = fields.next()?.parse().ok()?;

    if time_field.len() < 9 {
        return None;
    }
    let hour: u32 = time_field.get(0..2)?.parse().ok()?;
    let minute: u32 = time_field.get(2..4)?.parse().ok()?;
    let second: u32 = time_field.get(4..6)?.parse().ok()?;
    let millis: u32 = time_field.get(7..10).unwrap_or("0").parse().ok()?;

    if second > 59 || minute > 59 || hour > 23 {
        return None;
    }
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }
    if !(2000..=2140).contains(&year) {
        return None;
    }

    let days_since_epoch = days_from_civil(year, month, day);
    let seconds =
        days_since_epoch * 86_400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64;

    // The start-of-second reading plus one second yields the time of the
    // next PPS rising edge.
    let next_pps_seconds = seconds + 1;
    Some(NextPpsTime(Time::new(
        next_pps_seconds as u64,
        millis * 1_000_000,
    )))
}

/// Howard Hinnant's days-from-civil algorithm (proleptic Gregorian, days
/// since the Unix epoch). Avoids pulling in a full calendar dependency for
/// one date conversion.
fn days_from_civil(y: i32, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y } as i64;
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_gpzda() {
        let sentence = "$GPZDA,143042.500,17,03,2026,00,00*4F";
        let parsed = parse_gpzda(sentence).unwrap();
        // 2026-03-17T14:30:43.5Z, one second past the reported reading.
        assert_eq!(parsed.0.subsec_nanos(), 500_000_000);
    }

    #[test]
    fn rejects_non_gpzda_sentence() {
        assert!(parse_gpzda("$GPGGA,143042.00,4807.038,N*47").is_none());
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(parse_gpzda("$GPZDA,143042.500,17,13,2026,00,00*00").is_none());
    }
}
