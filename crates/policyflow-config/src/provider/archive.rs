use std::sync::LazyLock;

use serde::Deserialize;

use super::{FileProviderModel, TextProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

/// A gzipped tar archive, optionally starting from an existing one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFileModel {
  pub output_file_name: TextProviderModel,
  #[serde(default)]
  pub source_file: Option<Box<FileProviderModel>>,
  #[serde(default)]
  pub operations: Vec<ArchiveOperationModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddArchiveEntryModel {
  pub file: FileProviderModel,
  /// Folder inside the archive; the archive root when omitted.
  #[serde(default)]
  pub folder: Option<TextProviderModel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntryModel {
  pub entry_name: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameArchiveEntryModel {
  pub entry_name: TextProviderModel,
  pub new_entry_name: TextProviderModel,
}

/// One edit applied to the entries of an archive, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveOperationModel {
  Add(AddArchiveEntryModel),
  Remove(ArchiveEntryModel),
  Rename(RenameArchiveEntryModel),
}

pub static ARCHIVE_OPERATIONS: LazyLock<TypeMap<ArchiveOperationModel>> = LazyLock::new(|| {
  TypeMap::new("archive operation")
    .register("addFileToArchive", variant!(ArchiveOperationModel::Add))
    .register("removeFileFromArchive", variant!(ArchiveOperationModel::Remove))
    .register("renameFileInArchive", variant!(ArchiveOperationModel::Rename))
});

discriminated!(ArchiveOperationModel, ARCHIVE_OPERATIONS);
