//! Parsing for the two schedule kinds. Kept separate from the job runner
//! so the parsing rules are unit-testable without spawning anything.

use std::str::FromStr;
use std::time::Duration;

use conectasei_types::domain::ScheduleKind;
use conectasei_types::error::ConectaError;

/// A parsed, ready-to-run schedule: either a fixed interval or a cron
/// expression evaluated against each fire to find the next occurrence.
#[derive(Clone)]
pub enum JobSchedule {
    Interval(Duration),
    Cron(cron::Schedule),
}

pub fn parse_expression(kind: ScheduleKind, expression: &str) -> Result<JobSchedule, ConectaError> {
    match kind {
        ScheduleKind::Interval => parse_interval(expression).map(JobSchedule::Interval),
        ScheduleKind::Cron => {
            // The `cron` crate always expects a leading seconds field; a
            // standard five-field line (minute hour dom month dow) gets one
            // prepended so both five- and six-field expressions are accepted.
            let normalized = if expression.split_whitespace().count() == 5 {
                format!("0 {expression}")
            } else {
                expression.to_string()
            };
            cron::Schedule::from_str(&normalized).map(JobSchedule::Cron).map_err(|err| {
                ConectaError::Config(format!("invalid cron expression '{expression}': {err}"))
            })
        }
    }
}

/// `<number><unit>` where unit is one of `s`, `m`, `h`, `d` — e.g. `30m`.
fn parse_interval(expression: &str) -> Result<Duration, ConectaError> {
    let expression = expression.trim();
    let split_at = expression
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .ok_or_else(|| ConectaError::Config(format!("missing unit in interval expression: {expression}")))?;
    let (number_part, unit) = expression.split_at(split_at);
    let value: u64 = number_part
        .parse()
        .map_err(|_| ConectaError::Config(format!("invalid interval expression: {expression}")))?;
    let seconds = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3_600,
        "d" => value * 86_400,
        other => {
            return Err(ConectaError::Config(format!(
                "unsupported interval unit '{other}' in expression: {expression}"
            )))
        }
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes() {
        let JobSchedule::Interval(d) = parse_expression(ScheduleKind::Interval, "30m").unwrap() else {
            panic!("expected interval");
        };
        assert_eq!(d, Duration::from_secs(1_800));
    }

    #[test]
    fn parses_hours_and_days() {
        let JobSchedule::Interval(d) = parse_expression(ScheduleKind::Interval, "2h").unwrap() else {
            panic!("expected interval");
        };
        assert_eq!(d, Duration::from_secs(7_200));
        let JobSchedule::Interval(d) = parse_expression(ScheduleKind::Interval, "1d").unwrap() else {
            panic!("expected interval");
        };
        assert_eq!(d, Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_expression(ScheduleKind::Interval, "30x").is_err());
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse_expression(ScheduleKind::Interval, "30").is_err());
    }

    #[test]
    fn parses_five_field_cron() {
        assert!(matches!(
            parse_expression(ScheduleKind::Cron, "0 0 * * *"),
            Ok(JobSchedule::Cron(_))
        ));
    }

    #[test]
    fn rejects_malformed_cron() {
        assert!(parse_expression(ScheduleKind::Cron, "not a cron").is_err());
    }
}
