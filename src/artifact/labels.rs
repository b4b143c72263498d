// 该文件是 Shouyu （手语） 项目的一部分。
// src/artifact/labels.rs - 标签编码器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::Deserialize;

use crate::artifact::ArtifactError;

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelFile {
  Object { classes: Vec<String> },
  List(Vec<String>),
}

/// 类别下标与手势名称之间的映射
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "LabelFile")]
pub struct LabelEncoder {
  classes: Vec<String>,
}

impl TryFrom<LabelFile> for LabelEncoder {
  type Error = ArtifactError;

  fn try_from(file: LabelFile) -> Result<Self, Self::Error> {
    let classes = match file {
      LabelFile::Object { classes } => classes,
      LabelFile::List(classes) => classes,
    };
    Self::new(classes)
  }
}

impl LabelEncoder {
  pub fn new(classes: Vec<String>) -> Result<Self, ArtifactError> {
    if classes.is_empty() {
      return Err(ArtifactError::EmptyVocabulary);
    }
    Ok(Self { classes })
  }

  pub fn decode(&self, index: usize) -> Option<&str> {
    self.classes.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.classes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.classes.is_empty()
  }

  pub fn classes(&self) -> &[String] {
    &self.classes
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn object_and_list_forms_are_accepted() {
    let object: LabelEncoder = serde_json::from_str(r#"{"classes": ["A", "B", "C"]}"#).unwrap();
    let list: LabelEncoder = serde_json::from_str(r#"["A", "B", "C"]"#).unwrap();
    assert_eq!(object, list);
    assert_eq!(object.decode(1), Some("B"));
    assert_eq!(object.decode(3), None);
    assert_eq!(object.len(), 3);
  }

  #[test]
  fn empty_vocabulary_is_rejected() {
    assert!(serde_json::from_str::<LabelEncoder>("[]").is_err());
    assert!(matches!(
      LabelEncoder::new(Vec::new()),
      Err(ArtifactError::EmptyVocabulary)
    ));
  }
}
