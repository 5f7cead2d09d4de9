// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/model.rs - 模型
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

use std::path::Path;

use image::RgbImage;
use tracing::{debug, error, info};

use crate::{catalog::ClassCatalog, detector::DetectError};

pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 在原始图像上推理，返回的边界框位于原图像素坐标系
  fn infer(&self, image: &RgbImage) -> Result<DetectResult, Self::Error>;
}

pub trait LoadModel: Model + Sized {
  fn load(path: &Path) -> Result<Self, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

/// 已加载的模型及其绑定的类别表
///
/// 构造完成后只读，可以通过 `Arc` 在多个线程间共享。
pub struct ModelHandle<M> {
  model: M,
  catalog: ClassCatalog,
}

impl<M: Model> ModelHandle<M> {
  pub fn new(model: M, catalog: ClassCatalog) -> Self {
    ModelHandle { model, catalog }
  }

  /// 检查模型文件存在后，使用 `load` 加载模型
  pub fn open_with<F>(
    model_path: impl AsRef<Path>,
    catalog: ClassCatalog,
    load: F,
  ) -> Result<Self, DetectError>
  where
    F: FnOnce(&Path) -> Result<M, M::Error>,
  {
    let model_path = model_path.as_ref();
    if !model_path.is_file() {
      error!("模型文件不存在: {}", model_path.display());
      return Err(DetectError::ModelNotFound(model_path.to_path_buf()));
    }

    info!("加载模型文件: {}", model_path.display());
    let model = load(model_path).map_err(DetectError::inference)?;
    debug!("模型绑定类别数量: {}", catalog.len());

    Ok(ModelHandle { model, catalog })
  }

  pub fn infer(&self, image: &RgbImage) -> Result<DetectResult, DetectError> {
    self.model.infer(image).map_err(DetectError::inference)
  }

  pub fn catalog(&self) -> &ClassCatalog {
    &self.catalog
  }

  pub fn model(&self) -> &M {
    &self.model
  }
}

impl<M: LoadModel> ModelHandle<M> {
  pub fn open(model_path: impl AsRef<Path>, catalog: ClassCatalog) -> Result<Self, DetectError> {
    Self::open_with(model_path, catalog, M::load)
  }
}

pub mod yolov8;

#[cfg(feature = "rknpu")]
mod rknn;
#[cfg(feature = "rknpu")]
pub use self::rknn::{RknnModelError, RknnYolov8, RknnYolov8Builder};

#[cfg(test)]
pub(crate) mod testing {
  use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use image::RgbImage;
  use thiserror::Error;

  use super::{DetectItem, DetectResult, LoadModel, Model};

  #[derive(Error, Debug)]
  #[error("stub failure")]
  pub struct StubError;

  /// 返回固定检测结果的模型
  #[derive(Default)]
  pub struct StubModel {
    pub items: Vec<DetectItem>,
    pub fail_on_call: Option<usize>,
    pub calls: AtomicUsize,
  }

  impl StubModel {
    pub fn with_items(items: Vec<DetectItem>) -> Self {
      StubModel {
        items,
        ..Default::default()
      }
    }
  }

  impl Model for StubModel {
    type Error = StubError;

    fn infer(&self, _image: &RgbImage) -> Result<DetectResult, Self::Error> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_on_call == Some(call) {
        return Err(StubError);
      }
      Ok(DetectResult::from(self.items.clone()))
    }
  }

  impl LoadModel for StubModel {
    fn load(_path: &Path) -> Result<Self, Self::Error> {
      Ok(StubModel::default())
    }
  }

  pub fn item(class_id: u32, score: f32, bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox,
    }
  }
}
