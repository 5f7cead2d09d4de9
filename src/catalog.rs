// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/catalog.rs - 缺陷类别表
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

use std::{path::Path, sync::Arc};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// 训练 PCB 检测模型时使用的类别顺序
pub const PCB_DEFECT_CLASSES: [&str; 8] = [
  "missing_component",
  "wrong_orientation",
  "cold_solder",
  "short_circuit",
  "broken_track",
  "burn_mark",
  "misaligned_component",
  "extra_solder",
];

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("读取类别文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("解析类别文件失败: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("类别表为空")]
  Empty,
}

#[derive(Deserialize)]
struct LabelFile {
  labels: Vec<String>,
}

/// 类别索引到缺陷名称的映射
///
/// 索引必须与模型训练时的类别索引一致。模型只输出整数索引，
/// 因此这张表由调用者提供，而不是从模型文件中读取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
  names: Arc<[String]>,
}

impl Default for ClassCatalog {
  fn default() -> Self {
    Self::pcb_defects()
  }
}

impl ClassCatalog {
  pub fn new<I, S>(names: I) -> Result<Self, CatalogError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Arc<[String]> = names.into_iter().map(Into::<String>::into).collect();
    if names.is_empty() {
      return Err(CatalogError::Empty);
    }
    Ok(Self { names })
  }

  pub fn pcb_defects() -> Self {
    Self {
      names: PCB_DEFECT_CLASSES.iter().map(|s| s.to_string()).collect(),
    }
  }

  /// 从 TOML 文件加载，格式为 `labels = ["a", "b", ...]`
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载类别文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let catalog = Self::from_toml_str(&content)?;
    debug!("类别数量: {}", catalog.len());
    Ok(catalog)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
    let file: LabelFile = toml::from_str(content)?;
    Self::new(file.labels)
  }

  pub fn name(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_catalog_keeps_training_order() {
    let catalog = ClassCatalog::default();
    assert_eq!(catalog.len(), 8);
    assert_eq!(catalog.name(0), Some("missing_component"));
    assert_eq!(catalog.name(2), Some("cold_solder"));
    assert_eq!(catalog.name(7), Some("extra_solder"));
    assert_eq!(catalog.name(8), None);
  }

  #[test]
  fn toml_labels_are_loaded_in_order() {
    let catalog = ClassCatalog::from_toml_str(r#"labels = ["short_circuit", "burn_mark"]"#).unwrap();
    assert_eq!(
      catalog.iter().collect::<Vec<_>>(),
      vec!["short_circuit", "burn_mark"]
    );
  }

  #[test]
  fn empty_catalog_is_rejected() {
    assert!(matches!(
      ClassCatalog::from_toml_str("labels = []"),
      Err(CatalogError::Empty)
    ));
    assert!(matches!(
      ClassCatalog::new(Vec::<String>::new()),
      Err(CatalogError::Empty)
    ));
  }

  #[test]
  fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
      ClassCatalog::from_toml_str("labels = 3"),
      Err(CatalogError::ParseError(_))
    ));
  }

  #[test]
  fn bundled_label_file_matches_builtin_catalog() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("labels/pcb.toml");
    let catalog = ClassCatalog::from_toml_file(path).unwrap();
    assert_eq!(catalog, ClassCatalog::pcb_defects());
  }
}
