// 该文件是 PCB Defect （电路板缺陷检测） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// PCB 缺陷检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型路径，可附带参数:
  /// rknn:///path/best.rknn?size=640&conf=0.25&iou=0.7&max_det=300
  #[arg(
    long,
    value_name = "MODEL",
    default_value = "rknn:runs/train/pcb_detector/weights/best.rknn"
  )]
  pub model: Url,

  /// 待检测图像，可重复指定，例如 image:///data/board.jpg
  #[arg(long, value_name = "SOURCE", required = true, num_args = 1..)]
  pub input: Vec<Url>,

  /// 类别表 TOML 文件，缺省时使用内置的 PCB 缺陷类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标注输出:
  /// - image:///out.png 保存标注图像
  /// - folder:///dir 每张图像保存标注图与 JSON 记录
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// 以 JSON 输出检测结果而不是文本报告
  #[arg(long)]
  pub json: bool,
}
