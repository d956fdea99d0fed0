//! Gzipped tar archives built by `archiveFile`.

use std::io::Read;

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use policyflow_config::ConfigError;
use policyflow_config::provider::{ArchiveFileModel, ArchiveOperationModel};

use super::{BoxProvider, Provider, ProviderContext, resolve_optional};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;
use crate::services::FileAttachment;

const PROVIDER: &str = "archiveFile";

pub enum ArchiveOperation {
  Add {
    file: BoxProvider<FileAttachment>,
    folder: Option<BoxProvider<String>>,
  },
  Remove {
    entry_name: BoxProvider<String>,
  },
  Rename {
    entry_name: BoxProvider<String>,
    new_entry_name: BoxProvider<String>,
  },
}

impl Build for ArchiveOperationModel {
  type Output = ArchiveOperation;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Add(model) => ArchiveOperation::Add {
        file: model.file.build(deps)?,
        folder: model.folder.build(deps)?,
      },
      Self::Remove(model) => ArchiveOperation::Remove {
        entry_name: model.entry_name.build(deps)?,
      },
      Self::Rename(model) => ArchiveOperation::Rename {
        entry_name: model.entry_name.build(deps)?,
        new_entry_name: model.new_entry_name.build(deps)?,
      },
    })
  }
}

pub struct ArchiveFile {
  file_name: BoxProvider<String>,
  source: Option<BoxProvider<FileAttachment>>,
  operations: Vec<ArchiveOperation>,
}

impl ArchiveFile {
  pub(crate) fn build(model: &ArchiveFileModel, deps: &Dependencies) -> Result<Self, ConfigError> {
    Ok(Self {
      file_name: model.output_file_name.build(deps)?,
      source: model.source_file.build(deps)?,
      operations: model.operations.build(deps)?,
    })
  }
}

#[async_trait]
impl Provider<FileAttachment> for ArchiveFile {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<FileAttachment>, EngineError> {
    let file_name = self.file_name.require(ctx, "outputFileName").await?;
    let mut entries = match resolve_optional(&self.source, ctx).await? {
      Some(source) => read_entries(&source.content).map_err(|message| {
        EngineError::invalid_value(PROVIDER, format!("'{}': {}", source.file_name, message))
      })?,
      None => IndexMap::new(),
    };

    for operation in &self.operations {
      match operation {
        ArchiveOperation::Add { file, folder } => {
          let file = file.require(ctx, "file").await?;
          let name = match resolve_optional(folder, ctx).await? {
            Some(folder) if !folder.trim_matches('/').is_empty() => {
              format!("{}/{}", folder.trim_matches('/'), file.file_name)
            }
            _ => file.file_name,
          };
          entries.insert(name, file.content);
        }
        ArchiveOperation::Remove { entry_name } => {
          let name = entry_name.require(ctx, "entryName").await?;
          if entries.shift_remove(&name).is_none() {
            return Err(missing_entry(&name));
          }
        }
        ArchiveOperation::Rename {
          entry_name,
          new_entry_name,
        } => {
          let name = entry_name.require(ctx, "entryName").await?;
          let new_name = new_entry_name.require(ctx, "newEntryName").await?;
          let Some(content) = entries.shift_remove(&name) else {
            return Err(missing_entry(&name));
          };
          entries.insert(new_name, content);
        }
      }
    }

    let content = write_entries(&entries)
      .map_err(|e| EngineError::invalid_value(PROVIDER, e.to_string()))?;
    Ok(Some(FileAttachment { file_name, content }))
  }
}

fn missing_entry(name: &str) -> EngineError {
  EngineError::invalid_value(PROVIDER, format!("the archive has no entry '{}'", name))
}

/// Regular files of a `.tar.gz`, in archive order.
fn read_entries(bytes: &[u8]) -> Result<IndexMap<String, Vec<u8>>, String> {
  let mut archive = tar::Archive::new(GzDecoder::new(bytes));
  let mut entries = IndexMap::new();
  for entry in archive.entries().map_err(|e| e.to_string())? {
    let mut entry = entry.map_err(|e| e.to_string())?;
    if !entry.header().entry_type().is_file() {
      continue;
    }
    let name = entry
      .path()
      .map_err(|e| e.to_string())?
      .to_string_lossy()
      .into_owned();
    let mut content = Vec::new();
    entry
      .read_to_end(&mut content)
      .map_err(|e| e.to_string())?;
    entries.insert(name, content);
  }
  Ok(entries)
}

fn write_entries(entries: &IndexMap<String, Vec<u8>>) -> std::io::Result<Vec<u8>> {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  builder.mode(tar::HeaderMode::Deterministic);
  for (name, content) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, name, content.as_slice())?;
  }
  builder.into_inner()?.finish()
}

#[cfg(test)]
mod tests {
  use policyflow_config::provider::FileProviderModel;
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  #[test]
  fn test_entries_keep_their_order() {
    let mut entries = IndexMap::new();
    entries.insert("b.txt".to_string(), b"bee".to_vec());
    entries.insert("docs/a.txt".to_string(), b"ay".to_vec());
    let bytes = write_entries(&entries).unwrap();
    assert_eq!(read_entries(&bytes).unwrap(), entries);
  }

  #[tokio::test]
  async fn test_archive_operations_apply_in_order() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let provider = testing::build::<FileProviderModel>(json!({"archiveFile": {
      "outputFileName": {"concatenatedText": [{"objectPathLookupText": "/context/quote/quoteNumber"}, ".tar.gz"]},
      "operations": [
        {"addFileToArchive": {"file": {"textFile": {"outputFileName": "quote.json", "sourceData": {"jsonText": {"contextEntityObject": "quote"}}}}}},
        {"addFileToArchive": {"file": {"textFile": {"outputFileName": "note.txt", "sourceData": "draft"}}, "folder": "/notes/"}},
        {"addFileToArchive": {"file": {"textFile": {"outputFileName": "tmp.txt", "sourceData": "x"}}}},
        {"renameFileInArchive": {"entryName": "notes/note.txt", "newEntryName": "notes/summary.txt"}},
        {"removeFileFromArchive": {"entryName": "tmp.txt"}}
      ]
    }}));
    let archive = provider.resolve(&ctx).await.unwrap().unwrap();
    assert_eq!(archive.file_name, "Q-0001.tar.gz");

    let entries = read_entries(&archive.content).unwrap();
    let names: Vec<_> = entries.keys().cloned().collect();
    assert_eq!(names, vec!["quote.json", "notes/summary.txt"]);
    assert_eq!(entries["notes/summary.txt"], b"draft");
    let quote: serde_json::Value = serde_json::from_slice(&entries["quote.json"]).unwrap();
    assert_eq!(quote["quoteNumber"], json!("Q-0001"));
  }

  #[tokio::test]
  async fn test_existing_archive_is_edited() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let mut entries = IndexMap::new();
    entries.insert("keep.txt".to_string(), b"kept".to_vec());
    let source = base64::Engine::encode(
      &base64::engine::general_purpose::STANDARD,
      write_entries(&entries).unwrap(),
    );

    let provider = testing::build::<FileProviderModel>(json!({"archiveFile": {
      "outputFileName": "out.tar.gz",
      "sourceFile": {"binaryFile": {"outputFileName": "in.tar.gz", "sourceData": {"base64TextToBinary": source}}},
      "operations": [
        {"addFileToArchive": {"file": {"textFile": {"outputFileName": "new.txt", "sourceData": "new"}}}}
      ]
    }}));
    let archive = provider.resolve(&ctx).await.unwrap().unwrap();
    let names: Vec<_> = read_entries(&archive.content).unwrap().into_keys().collect();
    assert_eq!(names, vec!["keep.txt", "new.txt"]);
  }

  #[tokio::test]
  async fn test_removing_a_missing_entry_fails() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<FileProviderModel>(json!({"archiveFile": {
      "outputFileName": "out.tar.gz",
      "operations": [{"removeFileFromArchive": {"entryName": "nope.txt"}}]
    }}));
    let error = provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap_err()
      .to_error();
    assert_eq!(error.code, "automation.provider.invalid.value");
  }

  #[tokio::test]
  async fn test_corrupt_source_archive_fails() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<FileProviderModel>(json!({"archiveFile": {
      "outputFileName": "out.tar.gz",
      "sourceFile": {"textFile": {"outputFileName": "in.tar.gz", "sourceData": "not an archive"}}
    }}));
    let error = provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap_err()
      .to_error();
    assert_eq!(error.code, "automation.provider.invalid.value");
  }
}
