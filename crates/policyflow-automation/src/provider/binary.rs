use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use policyflow_config::ConfigError;
use policyflow_config::provider::{BinaryProviderModel, FileProviderModel};

use super::archive::ArchiveFile;
use super::{BoxProvider, MapProvider, Provider, ProviderContext};
use crate::build::{Build, Dependencies};
use crate::error::EngineError;
use crate::services::FileAttachment;

impl Build for BinaryProviderModel {
  type Output = BoxProvider<Vec<u8>>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::TextToBinary(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        Ok(text.into_bytes())
      })),
      Self::Base64TextToBinary(text) => Box::new(MapProvider::new(text.build(deps)?, |text: String| {
        STANDARD
          .decode(text.trim())
          .map_err(|e| EngineError::invalid_value("base64TextToBinary", e.to_string()))
      })),
    })
  }
}

/// Produces a named attachment from text or binary content.
pub struct FileProvider {
  file_name: BoxProvider<String>,
  content: BoxProvider<Vec<u8>>,
}

impl Build for FileProviderModel {
  type Output = BoxProvider<FileAttachment>;

  fn build(&self, deps: &Dependencies) -> Result<Self::Output, ConfigError> {
    Ok(match self {
      Self::Text(model) => Box::new(FileProvider {
        file_name: model.output_file_name.build(deps)?,
        content: Box::new(MapProvider::new(model.source_data.build(deps)?, |text: String| {
          Ok(text.into_bytes())
        })),
      }),
      Self::Binary(model) => Box::new(FileProvider {
        file_name: model.output_file_name.build(deps)?,
        content: model.source_data.build(deps)?,
      }),
      Self::Archive(model) => Box::new(ArchiveFile::build(model, deps)?),
    })
  }
}

#[async_trait]
impl Provider<FileAttachment> for FileProvider {
  async fn resolve(&self, ctx: &ProviderContext<'_>) -> Result<Option<FileAttachment>, EngineError> {
    let file_name = self.file_name.require(ctx, "outputFileName").await?;
    let content = self.content.require(ctx, "sourceData").await?;
    Ok(Some(FileAttachment { file_name, content }))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tokio_util::sync::CancellationToken;

  use super::super::testing;
  use super::*;

  #[tokio::test]
  async fn test_files() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let ctx = ProviderContext::new(&data, &cancel);

    let text = testing::build::<FileProviderModel>(json!({"textFile": {
      "outputFileName": {"concatenatedText": [{"objectPathLookupText": "/context/quote/quoteNumber"}, ".txt"]},
      "sourceData": "hello"
    }}));
    let file = text.resolve(&ctx).await.unwrap().unwrap();
    assert_eq!(file.file_name, "Q-0001.txt");
    assert_eq!(file.content, b"hello");

    let binary = testing::build::<FileProviderModel>(json!({"binaryFile": {
      "outputFileName": "a.bin",
      "sourceData": {"base64TextToBinary": "AAEC"}
    }}));
    assert_eq!(
      binary.resolve(&ctx).await.unwrap().unwrap().content,
      vec![0u8, 1, 2]
    );
  }

  #[tokio::test]
  async fn test_invalid_base64() {
    let data = testing::data();
    let cancel = CancellationToken::new();
    let provider = testing::build::<BinaryProviderModel>(json!({"base64TextToBinary": "%%"}));
    let error = provider
      .resolve(&ProviderContext::new(&data, &cancel))
      .await
      .unwrap_err()
      .to_error();
    assert_eq!(error.code, "automation.provider.invalid.value");
  }
}
