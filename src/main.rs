// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/main.rs - 缺陷检测命令行程序
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

mod args;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{error, info};

use pcb_defect::{
  ClassCatalog, DefectDetector, DetectError, DetectionResult, FromUrl, ModelHandle,
  input::ImageSource,
  model::{RknnYolov8, RknnYolov8Builder},
  output::{OutputWrapper, Render},
};

fn detect_one(
  detector: &DefectDetector<RknnYolov8>,
  output: Option<&OutputWrapper>,
  source: &ImageSource,
) -> Result<DetectionResult> {
  let image = source
    .decode()
    .map_err(|e| DetectError::ImageNotFound {
      path: source.path().to_path_buf(),
      reason: e.to_string(),
    })?;
  let result = detector.detect_image(source.path().to_string_lossy(), &image)?;

  if let Some(output) = output {
    output.render_result(&image, &result)?;
  }

  Ok(result)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型路径: {}", args.model);
  info!("输入图像数量: {}", args.input.len());
  if let Some(output) = &args.output {
    info!("输出路径: {}", output);
  }

  let catalog = match &args.labels {
    Some(path) => ClassCatalog::from_toml_file(path)?,
    None => ClassCatalog::default(),
  };

  let builder = RknnYolov8Builder::from_url(&args.model)?;
  let model_path = builder.model_path().to_path_buf();
  let handle = ModelHandle::open_with(&model_path, catalog, |_| builder.build())?;
  let detector = DefectDetector::new(handle);

  let output = args
    .output
    .as_ref()
    .map(OutputWrapper::from_url)
    .transpose()?;

  let mut failures = 0usize;
  for input in &args.input {
    let source = ImageSource::from_url(input)?;
    match detect_one(&detector, output.as_ref(), &source) {
      Ok(result) if args.json => println!("{}", serde_json::to_string_pretty(&result)?),
      Ok(result) => println!("{}", result.report),
      Err(e) => {
        error!("{}: {:#}", source.path().display(), e);
        failures += 1;
      }
    }
  }

  if failures > 0 {
    bail!("{} 张图像检测失败", failures);
  }

  Ok(())
}
