// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/model/rknn.rs - RKNN 推理后端
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use image::RgbImage;
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    DetectResult, LoadModel, Model,
    yolov8::{self, Yolov8DecodeError, Yolov8Params},
  },
};

const RKNN_NUM_INPUTS: u32 = 1;
const RKNN_NUM_OUTPUTS: u32 = 1;

#[derive(Error, Debug)]
pub enum RknnModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输出解码错误: {0}")]
  DecodeError(#[from] Yolov8DecodeError),
  #[error("推理上下文已损坏")]
  Poisoned,
}

impl RknnModelError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnModelError::ModelInvalid(msg.to_string(), e)
  }
}

/// 运行在 RKNPU 上的 YOLOv8 检测模型
///
/// RKNN 上下文的输入、执行、取输出是一组有状态的调用，
/// 因此用互斥锁串行化，使模型可以在线程间共享。
pub struct RknnYolov8 {
  context: Mutex<Context>,
  params: Yolov8Params,
}

pub struct RknnYolov8Builder {
  model_path: PathBuf,
  flags: InitFlags,
  params: Yolov8Params,
}

impl FromUrlWithScheme for RknnYolov8Builder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnYolov8Builder {
  type Error = RknnModelError;

  /// `rknn:///path/best.rknn?size=640&conf=0.25&iou=0.7&max_det=300`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut params = Yolov8Params::default();
    for (k, v) in url.query_pairs() {
      let bad = || RknnModelError::ModelPathError(format!("无效参数 {}={}", k, v));
      match k.as_ref() {
        "size" => params.input_size = v.parse().map_err(|_| bad())?,
        "conf" => params.conf_threshold = v.parse().map_err(|_| bad())?,
        "iou" => params.iou_threshold = v.parse().map_err(|_| bad())?,
        "max_det" => params.max_detections = v.parse().map_err(|_| bad())?,
        _ => return Err(bad()),
      }
    }

    Ok(RknnYolov8Builder {
      model_path: PathBuf::from(url.path()),
      flags: InitFlags::default(),
      params,
    })
  }
}

impl RknnYolov8Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    RknnYolov8Builder {
      model_path: model_path.into(),
      flags: InitFlags::default(),
      params: Yolov8Params::default(),
    }
  }

  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn params(mut self, params: Yolov8Params) -> Self {
    self.params = params;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self) -> Result<RknnYolov8, RknnModelError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(RknnModelError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnModelError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnModelError::invalid("无法获取输出数量", e))?;

    if num_inputs != RKNN_NUM_INPUTS || num_outputs != RKNN_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        RKNN_NUM_INPUTS, RKNN_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(RknnModelError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!("模型加载完成");
    Ok(RknnYolov8 {
      context: Mutex::new(context),
      params: self.params,
    })
  }
}

impl Model for RknnYolov8 {
  type Error = RknnModelError;

  fn infer(&self, image: &RgbImage) -> Result<DetectResult, Self::Error> {
    let (input, geometry) = yolov8::letterbox(image, self.params.input_size);

    let context = self.context.lock().map_err(|_| RknnModelError::Poisoned)?;

    debug!("设置模型输入");
    context.set_input(0, input.as_raw(), TensorFormat::NHWC, TensorType::UInt8)?;

    debug!("执行模型推理");
    context.run()?;

    debug!("获取模型输出");
    let output = context.get_outputs()?;
    let tensor = output.get_f32(0)?;

    Ok(yolov8::decode(tensor, &self.params, &geometry)?)
  }
}

impl LoadModel for RknnYolov8 {
  fn load(path: &Path) -> Result<Self, Self::Error> {
    RknnYolov8Builder::new(path).build()
  }
}
