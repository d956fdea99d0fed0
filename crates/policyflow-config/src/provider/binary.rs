use std::sync::LazyLock;

use serde::Deserialize;

use super::{ArchiveFileModel, TextProviderModel};
use crate::registry::{TypeMap, discriminated, variant};

#[derive(Debug, Clone, PartialEq)]
pub enum BinaryProviderModel {
  /// UTF-8 bytes of the text.
  TextToBinary(Box<TextProviderModel>),
  Base64TextToBinary(Box<TextProviderModel>),
}

pub static BINARY_PROVIDERS: LazyLock<TypeMap<BinaryProviderModel>> = LazyLock::new(|| {
  TypeMap::new("binary provider")
    .register("textToBinary", variant!(BinaryProviderModel::TextToBinary, boxed))
    .register(
      "base64TextToBinary",
      variant!(BinaryProviderModel::Base64TextToBinary, boxed),
    )
});

discriminated!(BinaryProviderModel, BINARY_PROVIDERS);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFileModel {
  pub output_file_name: TextProviderModel,
  pub source_data: TextProviderModel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryFileModel {
  pub output_file_name: TextProviderModel,
  pub source_data: BinaryProviderModel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileProviderModel {
  Text(TextFileModel),
  Binary(BinaryFileModel),
  Archive(ArchiveFileModel),
}

pub static FILE_PROVIDERS: LazyLock<TypeMap<FileProviderModel>> = LazyLock::new(|| {
  TypeMap::new("file provider")
    .register("textFile", variant!(FileProviderModel::Text))
    .register("binaryFile", variant!(FileProviderModel::Binary))
    .register("archiveFile", variant!(FileProviderModel::Archive))
});

discriminated!(FileProviderModel, FILE_PROVIDERS);
