// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/detector.rs - PCB 缺陷检测器
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
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  catalog::ClassCatalog,
  input::ImageSource,
  model::{DetectItem, LoadModel, Model, ModelHandle},
  report,
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("模型文件不存在: {}", .0.display())]
  ModelNotFound(PathBuf),
  #[error("无法读取图像 {}: {}", .path.display(), .reason)]
  ImageNotFound { path: PathBuf, reason: String },
  #[error("推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("类别索引 {index} 超出类别表范围 (共 {len} 类)")]
  ClassIndexOutOfRange { index: u32, len: usize },
}

impl DetectError {
  pub fn inference<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::Inference(Box::new(err))
  }
}

/// 原图像素坐标系下的边界框
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BoundingBox {
  /// 截断为整数，不调整坐标顺序
  pub fn truncate(bbox: [f32; 4]) -> Self {
    BoundingBox {
      x1: bbox[0] as i32,
      y1: bbox[1] as i32,
      x2: bbox[2] as i32,
      y2: bbox[3] as i32,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectRecord {
  #[serde(rename = "type")]
  pub kind: String,
  pub confidence: f64,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
  pub image: String,
  #[serde(rename = "detected_defects")]
  pub defects: Vec<DefectRecord>,
  pub report: String,
}

impl DetectionResult {
  pub fn len(&self) -> usize {
    self.defects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.defects.is_empty()
  }
}

/// 保留三位小数，限制在 [0, 1]
pub fn round_confidence(score: f32) -> f64 {
  ((score as f64) * 1000.0).round().clamp(0.0, 1000.0) / 1000.0
}

/// PCB 缺陷检测器
pub struct DefectDetector<M> {
  handle: ModelHandle<M>,
}

impl<M: LoadModel> DefectDetector<M> {
  pub fn open(model_path: impl AsRef<Path>, catalog: ClassCatalog) -> Result<Self, DetectError> {
    Ok(DefectDetector::new(ModelHandle::open(model_path, catalog)?))
  }
}

impl<M: Model> DefectDetector<M> {
  pub fn new(handle: ModelHandle<M>) -> Self {
    DefectDetector { handle }
  }

  pub fn handle(&self) -> &ModelHandle<M> {
    &self.handle
  }

  /// 读取图像并检测缺陷
  pub fn detect(&self, image_path: impl AsRef<Path>) -> Result<DetectionResult, DetectError> {
    let image_path = image_path.as_ref();
    let image = ImageSource::new(image_path)
      .decode()
      .map_err(|e| DetectError::ImageNotFound {
        path: image_path.to_path_buf(),
        reason: e.to_string(),
      })?;

    self.detect_image(image_path.to_string_lossy(), &image)
  }

  /// 对已解码的图像检测缺陷
  pub fn detect_image(
    &self,
    identifier: impl Into<String>,
    image: &RgbImage,
  ) -> Result<DetectionResult, DetectError> {
    let identifier = identifier.into();

    let now = std::time::Instant::now();
    let raw = self.handle.infer(image)?;
    info!(
      "{}: 推理完成，耗时: {:.2?}，原始检测数: {}",
      identifier,
      now.elapsed(),
      raw.len()
    );

    let defects = raw
      .iter()
      .map(|item| self.to_record(item))
      .collect::<Result<Vec<_>, _>>()?;
    debug!("缺陷记录: {:?}", defects);

    let report = report::generate_report(&defects);

    Ok(DetectionResult {
      image: identifier,
      defects,
      report,
    })
  }

  fn to_record(&self, item: &DetectItem) -> Result<DefectRecord, DetectError> {
    let catalog = self.handle.catalog();
    let kind = usize::try_from(item.class_id)
      .ok()
      .and_then(|index| catalog.name(index))
      .ok_or_else(|| {
        warn!(
          "类别索引 {} 超出类别表范围，类别表与模型不一致",
          item.class_id
        );
        DetectError::ClassIndexOutOfRange {
          index: item.class_id,
          len: catalog.len(),
        }
      })?;

    if !item.score.is_finite() {
      return Err(DetectError::Inference(
        format!("类别 {} 的置信度无效: {}", kind, item.score).into(),
      ));
    }

    Ok(DefectRecord {
      kind: kind.to_string(),
      confidence: round_confidence(item.score),
      bbox: BoundingBox::truncate(item.bbox),
    })
  }
}
