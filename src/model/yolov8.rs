// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 前后处理
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

use image::{Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::model::{DetectItem, DetectResult};

pub const YOLOV8_INPUT_SIZE: u32 = 640;
pub const YOLOV8_CONF_THRESH: f32 = 0.25;
pub const YOLOV8_IOU_THRESH: f32 = 0.7;
pub const YOLOV8_MAX_DETECTIONS: usize = 300;
const YOLOV8_STRIDES: [u32; 3] = [8, 16, 32];
const YOLOV8_BOX_CHANNELS: usize = 4;
const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

#[derive(Error, Debug, PartialEq)]
pub enum Yolov8DecodeError {
  #[error("输出长度 {len} 不能被锚点数量 {anchors} 整除")]
  ShapeMismatch { len: usize, anchors: usize },
  #[error("输出通道数 {0} 不包含任何类别")]
  NoClasses(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yolov8Params {
  pub input_size: u32,
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
}

impl Default for Yolov8Params {
  fn default() -> Self {
    Yolov8Params {
      input_size: YOLOV8_INPUT_SIZE,
      conf_threshold: YOLOV8_CONF_THRESH,
      iou_threshold: YOLOV8_IOU_THRESH,
      max_detections: YOLOV8_MAX_DETECTIONS,
    }
  }
}

/// 三个检测头的锚点总数
pub fn anchor_count(input_size: u32) -> usize {
  YOLOV8_STRIDES
    .iter()
    .map(|stride| {
      let side = (input_size / stride) as usize;
      side * side
    })
    .sum()
}

/// 等比缩放并居中填充后的几何信息，用于把框映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub width: u32,
  pub height: u32,
}

impl Letterbox {
  pub fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.width as f32, self.height as f32);
    [
      ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h),
      ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h),
    ]
  }
}

pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
  let (width, height) = image.dimensions();
  let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
  let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
  let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
  let left = ((size - new_w) as f32 / 2.0 - 0.1).round().max(0.0);
  let top = ((size - new_h) as f32 / 2.0 - 0.1).round().max(0.0);

  let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
  let mut canvas = RgbImage::from_pixel(size, size, Rgb(LETTERBOX_FILL));
  imageops::overlay(&mut canvas, &resized, left as i64, top as i64);

  debug!(
    "letterbox: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({}, {})",
    width, height, new_w, new_h, scale, left, top
  );

  (
    canvas,
    Letterbox {
      scale,
      pad_x: left,
      pad_y: top,
      width,
      height,
    },
  )
}

/// 解码 `[4 + nc, anchors]` 行主序输出
///
/// 返回的结果按置信度降序排列，边界框已映射回原图坐标。
pub fn decode(
  output: &[f32],
  params: &Yolov8Params,
  geometry: &Letterbox,
) -> Result<DetectResult, Yolov8DecodeError> {
  let anchors = anchor_count(params.input_size);
  if anchors == 0 || output.len() % anchors != 0 {
    return Err(Yolov8DecodeError::ShapeMismatch {
      len: output.len(),
      anchors,
    });
  }
  let channels = output.len() / anchors;
  if channels <= YOLOV8_BOX_CHANNELS {
    return Err(Yolov8DecodeError::NoClasses(channels));
  }
  let num_classes = channels - YOLOV8_BOX_CHANNELS;
  debug!("输出通道数: {}, 类别数: {}", channels, num_classes);

  let at = |c: usize, a: usize| output[c * anchors + a];
  let mut candidates = Vec::new();

  for a in 0..anchors {
    let mut score = f32::MIN;
    let mut class_id = 0usize;
    for c in 0..num_classes {
      let s = at(YOLOV8_BOX_CHANNELS + c, a);
      if s > score {
        score = s;
        class_id = c;
      }
    }

    if score <= params.conf_threshold {
      continue;
    }

    let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
    candidates.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("阈值过滤后候选框数量: {}", candidates.len());

  let items: Vec<DetectItem> = nms(candidates, params.iou_threshold, params.max_detections)
    .into_iter()
    .map(|item| DetectItem {
      bbox: geometry.restore(item.bbox),
      ..item
    })
    .collect();
  debug!("检测到 {} 个目标", items.len());

  Ok(DetectResult::from(items))
}

/// 按类别进行非极大值抑制
fn nms(mut candidates: Vec<DetectItem>, iou_threshold: f32, max_detections: usize) -> Vec<DetectItem> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_detections {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}
