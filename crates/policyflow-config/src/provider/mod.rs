//! Provider configuration models, one discriminated enum per category.

mod archive;
mod binary;
mod condition;
mod entity;
mod expression;
mod list;
mod number;
mod object;
mod temporal;
mod text;

pub use archive::{
  ARCHIVE_OPERATIONS, AddArchiveEntryModel, ArchiveEntryModel, ArchiveFileModel,
  ArchiveOperationModel, RenameArchiveEntryModel,
};
pub use binary::{
  BINARY_PROVIDERS, BinaryFileModel, BinaryProviderModel, FILE_PROVIDERS, FileProviderModel,
  TextFileModel,
};
pub use condition::{
  CONDITION_PROVIDERS, ConditionProviderModel, IntegerComparisonModel, NumberComparisonModel,
  ObjectContainsPropertyModel, TextContainsModel, TextEqualityModel,
};
pub use entity::{DynamicEntityModel, ENTITY_PROVIDERS, EntityProviderModel};
pub use expression::{
  EXPRESSION_PROVIDERS, ExpressionModel, ExpressionProviderModel, ExpressionVariableModel,
};
pub use list::{
  FILTER_PROVIDERS, FilterConditionModel, FilterListItemsModel, FilterProviderModel,
  LIST_PROVIDERS, ListProviderModel, MapListItemsModel, RangeModel,
};
pub use number::{
  INTEGER_PROVIDERS, IntegerProviderModel, NUMBER_PROVIDERS, NumberProviderModel,
  decimal_from_value,
};
pub use object::{
  OBJECT_PROVIDERS, ObjectPropertyModel, ObjectProviderModel, PATCH_OPERATIONS, PatchMoveModel,
  PatchObjectModel, PatchOperationModel, PatchPathModel, PatchValueModel,
};
pub use temporal::{
  AddDurationModel, CurrentTimeModel, DATE_PROVIDERS, DATE_TIME_PROVIDERS, DURATION_PROVIDERS,
  DateProviderModel, DateTimeProviderModel, DurationModel, DurationProviderModel, DurationUnit,
  LastDurationModel, PERIOD_PROVIDERS, PeriodBetweenModel, PeriodProviderModel, TIME_PROVIDERS,
  TimeProviderModel,
};
pub use text::{DateToTextModel, TEXT_PROVIDERS, TemplateTextModel, TextProviderModel};

use serde::Deserialize;

/// Body shared by every `objectPathLookup*` provider.
///
/// Accepts either the bare pointer string or an object carrying the pointer
/// and its fallback behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
  from = "PathLookupRepr<T>",
  bound(deserialize = "T: Deserialize<'de>")
)]
pub struct ObjectPathLookupModel<T> {
  pub path: String,
  /// Evaluate the pointer against this object instead of the automation data.
  pub data_object: Option<Box<ObjectProviderModel>>,
  pub value_if_not_found: Option<Box<T>>,
  pub value_if_null: Option<Box<T>>,
  pub raise_error_if_not_found: bool,
  pub raise_error_if_null: bool,
  pub raise_error_if_type_mismatch: bool,
}

impl<T> ObjectPathLookupModel<T> {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      data_object: None,
      value_if_not_found: None,
      value_if_null: None,
      raise_error_if_not_found: true,
      raise_error_if_null: false,
      raise_error_if_type_mismatch: true,
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged, bound(deserialize = "T: Deserialize<'de>"))]
enum PathLookupRepr<T> {
  Path(String),
  Full(PathLookupBody<T>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct PathLookupBody<T> {
  path: String,
  #[serde(default)]
  data_object: Option<Box<ObjectProviderModel>>,
  #[serde(default)]
  value_if_not_found: Option<Box<T>>,
  #[serde(default)]
  value_if_null: Option<Box<T>>,
  #[serde(default)]
  raise_error_if_not_found: Option<bool>,
  #[serde(default)]
  raise_error_if_null: bool,
  #[serde(default)]
  raise_error_if_type_mismatch: Option<bool>,
}

impl<T> From<PathLookupRepr<T>> for ObjectPathLookupModel<T> {
  fn from(repr: PathLookupRepr<T>) -> Self {
    match repr {
      PathLookupRepr::Path(path) => Self::new(path),
      PathLookupRepr::Full(body) => Self {
        // A configured fallback means a missing value is expected.
        raise_error_if_not_found: body
          .raise_error_if_not_found
          .unwrap_or(body.value_if_not_found.is_none()),
        raise_error_if_type_mismatch: body.raise_error_if_type_mismatch.unwrap_or(true),
        path: body.path,
        data_object: body.data_object,
        value_if_not_found: body.value_if_not_found,
        value_if_null: body.value_if_null,
        raise_error_if_null: body.raise_error_if_null,
      },
    }
  }
}

pub(crate) fn default_item_alias() -> String {
  "item".to_string()
}
