// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::DetectionResult,
  output::{Render, draw::Draw},
};

const FALLBACK_STEM: &str = "result";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每张输入图像在目录下保存 `<stem>.png` 标注图和 `<stem>.json` 检测结果
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  /// `folder:///dir`，带 `?always` 时无缺陷的图像也会保存标注图
  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path()).always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    DirectoryRecordOutput {
      directory: directory.into(),
      draw: Draw::default(),
      always: false,
    }
  }

  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn stem(result: &DetectionResult) -> String {
    Path::new(&result.image)
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| FALLBACK_STEM.to_string())
  }
}

impl Render<RgbImage, DetectionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectionResult) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;
    let base = self.directory.join(Self::stem(result));

    let record = base.with_extension("json");
    std::fs::write(&record, serde_json::to_vec_pretty(result)?)?;
    info!("保存检测记录: {}", record.display());

    if self.always || !result.is_empty() {
      let image = base.with_extension("png");
      self.draw.annotate(frame, result).save(&image)?;
      info!("保存标注图像: {}", image.display());
    }

    Ok(())
  }
}
