// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme mismatch: expected '{expected}', found '{found}'")]
  SchemaMismatch { expected: &'static str, found: String },
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 磁盘上的一张待检测图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageSource {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageSource {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    Ok(ImageSource::new(url.path()))
  }
}

impl ImageSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    ImageSource { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 按内容识别格式并解码为 RGB 图像，每次调用都会重新读取文件
  pub fn decode(&self) -> Result<RgbImage, ImageFileInputError> {
    let image = ImageReader::open(&self.path)?
      .with_guessed_format()?
      .decode()?;
    debug!(
      "读取图像 {}: {}x{}",
      self.path.display(),
      image.width(),
      image.height()
    );
    Ok(image.into_rgb8())
  }
}
