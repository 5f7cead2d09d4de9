// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/output/draw.rs - 缺陷检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::detector::{BoundingBox, DetectionResult};

const PALETTE_SIZE: usize = 8;
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  colors: Vec<Rgb<u8>>,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Draw {
      colors,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 同一种缺陷总是使用同一种颜色
  fn color_of(&self, kind: &str) -> Rgb<u8> {
    let hash = kind
      .bytes()
      .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    self.colors[hash % self.colors.len()]
  }

  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = bbox.x1.clamp(0, w - 1);
    let y_min = bbox.y1.clamp(0, h - 1);
    let x_max = bbox.x2.clamp(0, w - 1);
    let y_max = bbox.y2.clamp(0, h - 1);

    // 坐标顺序异常的框不绘制
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectionResult) {
    for defect in &result.defects {
      self.draw_bbox(image, &defect.bbox, self.color_of(&defect.kind));
    }
  }

  pub fn annotate(&self, image: &RgbImage, result: &DetectionResult) -> RgbImage {
    let mut output = image.clone();
    self.draw_detections(&mut output, result);
    output
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::DefectRecord;

  fn result_with(bbox: BoundingBox) -> DetectionResult {
    DetectionResult {
      image: "board.png".to_string(),
      defects: vec![DefectRecord {
        kind: "burn_mark".to_string(),
        confidence: 0.9,
        bbox,
      }],
      report: String::new(),
    }
  }

  #[test]
  fn box_outline_is_drawn() {
    let draw = Draw::default();
    let image = RgbImage::new(20, 20);
    let result = result_with(BoundingBox {
      x1: 2,
      y1: 3,
      x2: 12,
      y2: 15,
    });
    let output = draw.annotate(&image, &result);
    let color = draw.color_of("burn_mark");

    assert_eq!(output.get_pixel(2, 3), &color);
    assert_eq!(output.get_pixel(12, 15), &color);
    assert_eq!(output.get_pixel(7, 9), &Rgb([0, 0, 0]));
  }

  #[test]
  fn malformed_box_is_skipped() {
    let draw = Draw::default();
    let image = RgbImage::new(20, 20);
    let result = result_with(BoundingBox {
      x1: 12,
      y1: 3,
      x2: 2,
      y2: 15,
    });
    assert_eq!(draw.annotate(&image, &result), image);
  }
}
