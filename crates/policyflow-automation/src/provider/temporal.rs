use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use policyflow_config::ConfigError;
use policyflow_config::provider::{
  DateProviderModel, DateTimeProviderModel, DurationProviderModel, DurationUnit,
  PeriodProviderModel, TimeProviderModel,
};
use serde::Serialize;

use super::{BoxProvider, MapProvider, PathLookup, Provider, ProviderContext, StaticProvider};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;

/// A closed interval between two instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
  let text = text.trim();
  NaiveDate::parse_from_str(text, "%Y-%m-%d")
    .ok()
    .or_else(|| parse_date_time(text).map(|instant| instant.date_naive()))
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
  let text = text.trim();
  NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
    .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
    .ok()
}

/// RFC 3339, a naive date-time taken as UTC, or a bare date at midnight UTC.
pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
  let text = text.trim();
  if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
    return Some(instant.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(naive.and_utc());
  }
  NaiveDate::parse_from_str(text, "%Y-%m-%d")
    .ok()
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
}

/// Parse an ISO-8601 duration made of weeks, days, hours, minutes and
/// seconds, e.g. `P1W2D`, `PT1H30M` or `-PT0.5S`. Years and months have no
/// fixed length and are rejected.
pub fn parse_iso_duration(text: &str) -> Option<TimeDelta> {
  let text = text.trim();
  let (negative, text) = match text.strip_prefix('-') {
    Some(rest) => (true, rest),
    None => (false, text),
  };
  let body = text.strip_prefix('P').or_else(|| text.strip_prefix('p'))?;
  if body.is_empty() {
    return None;
  }

  let mut total = TimeDelta::zero();
  let mut in_time = false;
  let mut number = String::new();
  let mut components = 0;
  for c in body.chars() {
    match c.to_ascii_uppercase() {
      'T' if !in_time && number.is_empty() => in_time = true,
      '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
      unit => {
        if number.is_empty() {
          return None;
        }
        let seconds_per_unit: f64 = match (unit, in_time) {
          ('W', false) => 604_800.0,
          ('D', false) => 86_400.0,
          ('H', true) => 3_600.0,
          ('M', true) => 60.0,
          ('S', true) => 1.0,
          _ => return None,
        };
        let amount: f64 = number.parse().ok()?;
        let millis = (amount * seconds_per_unit * 1000.0).round();
        if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
          return None;
        }
        total = total.checked_add(&TimeDelta::try_milliseconds(millis as i64)?)?;
        number.clear();
        components += 1;
      }
    }
  }
  if !number.is_empty() || components == 0 {
    return None;
  }
  Some(if negative { -total } else { total })
}

fn invalid(field: &str, text: &str, kind: &str) -> ConfigError {
  ConfigError::InvalidValue {
    field: field.to_string(),
    message: format!("'{}' is not a valid {}", text, kind),
  }
}

impl Build for DateProviderModel {
  type Output = BoxProvider<NaiveDate>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(text) => Box::new(StaticProvider(
        parse_date(text).ok_or_else(|| invalid("staticDate", text, "date"))?,
      )),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupDate", model, deps)?)
      }
      Self::TextToDate(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        parse_date(&text).ok_or_else(|| {
          EngineError::invalid_value("textToDate", format!("'{}' is not a valid date", text))
        })
      })),
      Self::CurrentDate(_) => Box::new(Clock::<NaiveDate>(|| Utc::now().date_naive())),
    })
  }
}

impl Build for TimeProviderModel {
  type Output = BoxProvider<NaiveTime>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(text) => Box::new(StaticProvider(
        parse_time(text).ok_or_else(|| invalid("staticTime", text, "time"))?,
      )),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupTime", model, deps)?)
      }
      Self::TextToTime(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        parse_time(&text).ok_or_else(|| {
          EngineError::invalid_value("textToTime", format!("'{}' is not a valid time", text))
        })
      })),
    })
  }
}

impl Build for DateTimeProviderModel {
  type Output = BoxProvider<DateTime<Utc>>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Static(text) => Box::new(StaticProvider(
        parse_date_time(text).ok_or_else(|| invalid("staticDateTime", text, "date time"))?,
      )),
      Self::ObjectPathLookup(model) => {
        Box::new(PathLookup::build("objectPathLookupDateTime", model, deps)?)
      }
      Self::TextToDateTime(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        parse_date_time(&text).ok_or_else(|| {
          EngineError::invalid_value("textToDateTime", format!("'{}' is not a valid date time", text))
        })
      })),
      Self::CurrentDateTime(_) => Box::new(Clock::<DateTime<Utc>>(Utc::now)),
      Self::AddDuration(model) => Box::new(AddDuration {
        date_time: model.date_time.build(deps)?,
        duration: model.duration.build(deps)?,
      }),
    })
  }
}

impl Build for DurationProviderModel {
  type Output = BoxProvider<TimeDelta>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Duration(model) => Box::new(UnitDuration {
        value: model.value.build(deps)?,
        unit: model.unit,
      }),
      Self::TextToDuration(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        parse_iso_duration(&text).ok_or_else(|| {
          EngineError::invalid_value("textToDuration", format!("'{}' is not a valid duration", text))
        })
      })),
    })
  }
}

impl Build for PeriodProviderModel {
  type Output = BoxProvider<Period>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Between(model) => Box::new(Between {
        from: model.from.build(deps)?,
        to: model.to.build(deps)?,
      }),
      Self::LastDuration(model) => Box::new(LastDuration {
        duration: model.duration.build(deps)?,
        end: model.end.build(deps)?,
      }),
    })
  }
}

/// Reads the UTC clock on every resolution.
struct Clock<T>(fn() -> T);

#[async_trait]
impl<T: Send + Sync + 'static> Provider<T> for Clock<T> {
  async fn resolve(&self, _ctx: &ProviderContext<'_>) -> Result<Option<T>, EngineError> {
    Ok(Some((self.0)()))
  }
}

struct AddDuration {
  date_time: BoxProvider<DateTime<Utc>>,
  duration: BoxProvider<TimeDelta>,
}

#[async_trait]
impl Provider<DateTime<Utc>> for AddDuration {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<DateTime<Utc>>, EngineError> {
    let Some(instant) = self.date_time.resolve(ctx).await? else {
      return Ok(None);
    };
    let duration = self.duration.require(ctx, "addDurationToDateTime").await?;
    instant
      .checked_add_signed(duration)
      .map(Some)
      .ok_or_else(|| EngineError::invalid_value("addDurationToDateTime", "date time out of range"))
  }
}

struct UnitDuration {
  value: BoxProvider<i64>,
  unit: DurationUnit,
}

#[async_trait]
impl Provider<TimeDelta> for UnitDuration {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<TimeDelta>, EngineError> {
    let Some(value) = self.value.resolve(ctx).await? else {
      return Ok(None);
    };
    let duration = match self.unit {
      DurationUnit::Seconds => TimeDelta::try_seconds(value),
      DurationUnit::Minutes => TimeDelta::try_minutes(value),
      DurationUnit::Hours => TimeDelta::try_hours(value),
      DurationUnit::Days => TimeDelta::try_days(value),
      DurationUnit::Weeks => TimeDelta::try_weeks(value),
    };
    duration
      .map(Some)
      .ok_or_else(|| EngineError::invalid_value("duration", format!("{} is out of range", value)))
  }
}

struct Between {
  from: BoxProvider<DateTime<Utc>>,
  to: BoxProvider<DateTime<Utc>>,
}

#[async_trait]
impl Provider<Period> for Between {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Period>, EngineError> {
    let start = self.from.require(ctx, "from").await?;
    let end = self.to.require(ctx, "to").await?;
    if end < start {
      return Err(EngineError::invalid_value(
        "periodBetweenDateTimes",
        "the period ends before it starts",
      ));
    }
    Ok(Some(Period { start, end }))
  }
}

struct LastDuration {
  duration: BoxProvider<TimeDelta>,
  end: Option<BoxProvider<DateTime<Utc>>>,
}

#[async_trait]
impl Provider<Period> for LastDuration {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<Period>, EngineError> {
    let duration = self.duration.require(ctx, "duration").await?;
    let end = match &self.end {
      Some(end) => end.require(ctx, "end").await?,
      None => Utc::now(),
    };
    let start = end
      .checked_sub_signed(duration)
      .ok_or_else(|| EngineError::invalid_value("lastDuration", "date time out of range"))?;
    Ok(Some(Period { start, end }))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  #[test]
  fn test_iso_durations() {
    assert_eq!(parse_iso_duration("P3D"), Some(TimeDelta::days(3)));
    assert_eq!(
      parse_iso_duration("PT1H30M"),
      Some(TimeDelta::minutes(90))
    );
    assert_eq!(
      parse_iso_duration("P1WT0.5S"),
      Some(TimeDelta::weeks(1) + TimeDelta::milliseconds(500))
    );
    assert_eq!(parse_iso_duration("-PT10S"), Some(TimeDelta::seconds(-10)));
    assert_eq!(parse_iso_duration("P1M"), None);
    assert_eq!(parse_iso_duration("PT"), None);
    assert_eq!(parse_iso_duration("3D"), None);
  }

  #[test]
  fn test_date_time_forms() {
    let midnight = parse_date_time("2024-03-01").unwrap();
    assert_eq!(midnight.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    let shifted = parse_date_time("2024-03-01T10:00:00+02:00").unwrap();
    assert_eq!(shifted.to_rfc3339(), "2024-03-01T08:00:00+00:00");
    assert_eq!(
      parse_date("2024-03-01T23:00:00Z"),
      NaiveDate::from_ymd_opt(2024, 3, 1)
    );
    assert!(parse_time("25:00").is_none());
  }

  #[test]
  fn test_static_date_checked_at_build() {
    let model: DateProviderModel = serde_json::from_value(json!("not a date")).unwrap();
    assert!(model.build(&Dependencies::in_memory()).is_err());
  }

  #[tokio::test]
  async fn test_add_duration_and_period() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let later = testing::build::<DateTimeProviderModel>(json!({"addDurationToDateTime": {
      "dateTime": "2024-01-31T00:00:00Z",
      "duration": {"duration": {"value": 2, "unit": "days"}}
    }}));
    assert_eq!(
      later.resolve(&ctx).await.unwrap(),
      parse_date_time("2024-02-02T00:00:00Z")
    );

    let period = testing::build::<PeriodProviderModel>(json!({"lastDuration": {
      "duration": {"textToDuration": "P1D"},
      "end": "2024-01-02T00:00:00Z"
    }}));
    let period = period.resolve(&ctx).await.unwrap().unwrap();
    assert_eq!(period.start, parse_date_time("2024-01-01").unwrap());
  }
}
