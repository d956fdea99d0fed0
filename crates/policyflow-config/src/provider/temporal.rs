use std::sync::LazyLock;

use serde::Deserialize;

use super::{IntegerProviderModel, ObjectPathLookupModel, TextProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

/// Body of the `current*` providers. Clock readings are always UTC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentTimeModel {}

#[derive(Debug, Clone, PartialEq)]
pub enum DateProviderModel {
  /// ISO-8601 date, parsed when the configuration is built.
  Static(String),
  ObjectPathLookup(ObjectPathLookupModel<DateProviderModel>),
  TextToDate(Box<TextProviderModel>),
  CurrentDate(CurrentTimeModel),
}

pub static DATE_PROVIDERS: LazyLock<TypeMap<DateProviderModel>> = LazyLock::new(|| {
  TypeMap::new("date provider")
    .register("objectPathLookupDate", variant!(DateProviderModel::ObjectPathLookup))
    .register("textToDate", variant!(DateProviderModel::TextToDate, boxed))
    .register("currentDate", variant!(DateProviderModel::CurrentDate))
    .literal(|value| value.as_str().map(|s| DateProviderModel::Static(s.to_string())))
});

discriminated!(DateProviderModel, DATE_PROVIDERS);

#[derive(Debug, Clone, PartialEq)]
pub enum TimeProviderModel {
  Static(String),
  ObjectPathLookup(ObjectPathLookupModel<TimeProviderModel>),
  TextToTime(Box<TextProviderModel>),
}

pub static TIME_PROVIDERS: LazyLock<TypeMap<TimeProviderModel>> = LazyLock::new(|| {
  TypeMap::new("time provider")
    .register("objectPathLookupTime", variant!(TimeProviderModel::ObjectPathLookup))
    .register("textToTime", variant!(TimeProviderModel::TextToTime, boxed))
    .literal(|value| value.as_str().map(|s| TimeProviderModel::Static(s.to_string())))
});

discriminated!(TimeProviderModel, TIME_PROVIDERS);

#[derive(Debug, Clone, PartialEq)]
pub enum DateTimeProviderModel {
  Static(String),
  ObjectPathLookup(ObjectPathLookupModel<DateTimeProviderModel>),
  TextToDateTime(Box<TextProviderModel>),
  CurrentDateTime(CurrentTimeModel),
  AddDuration(AddDurationModel),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDurationModel {
  pub date_time: Box<DateTimeProviderModel>,
  pub duration: DurationProviderModel,
}

pub static DATE_TIME_PROVIDERS: LazyLock<TypeMap<DateTimeProviderModel>> = LazyLock::new(|| {
  TypeMap::new("date time provider")
    .register(
      "objectPathLookupDateTime",
      variant!(DateTimeProviderModel::ObjectPathLookup),
    )
    .register("textToDateTime", variant!(DateTimeProviderModel::TextToDateTime, boxed))
    .register("currentDateTime", variant!(DateTimeProviderModel::CurrentDateTime))
    .register("addDurationToDateTime", variant!(DateTimeProviderModel::AddDuration))
    .literal(|value| value.as_str().map(|s| DateTimeProviderModel::Static(s.to_string())))
});

discriminated!(DateTimeProviderModel, DATE_TIME_PROVIDERS);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationUnit {
  Seconds,
  Minutes,
  Hours,
  Days,
  Weeks,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationModel {
  pub value: IntegerProviderModel,
  pub unit: DurationUnit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DurationProviderModel {
  Duration(DurationModel),
  /// ISO-8601 duration text such as `P3D` or `PT1H30M`.
  TextToDuration(Box<TextProviderModel>),
}

pub static DURATION_PROVIDERS: LazyLock<TypeMap<DurationProviderModel>> = LazyLock::new(|| {
  TypeMap::new("duration provider")
    .register("duration", variant!(DurationProviderModel::Duration))
    .register("textToDuration", variant!(DurationProviderModel::TextToDuration, boxed))
});

discriminated!(DurationProviderModel, DURATION_PROVIDERS);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBetweenModel {
  pub from: DateTimeProviderModel,
  pub to: DateTimeProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDurationModel {
  pub duration: DurationProviderModel,
  /// Defaults to now.
  #[serde(default)]
  pub end: Option<DateTimeProviderModel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeriodProviderModel {
  Between(PeriodBetweenModel),
  LastDuration(LastDurationModel),
}

pub static PERIOD_PROVIDERS: LazyLock<TypeMap<PeriodProviderModel>> = LazyLock::new(|| {
  TypeMap::new("period provider")
    .register("periodBetweenDateTimes", variant!(PeriodProviderModel::Between))
    .register("lastDuration", variant!(PeriodProviderModel::LastDuration))
});

discriminated!(PeriodProviderModel, PERIOD_PROVIDERS);
