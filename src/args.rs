// 该文件是 Skyscout （天巡） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

use skyscout::{
  avoidance::{DEFAULT_DEPTH_THRESHOLD, DEFAULT_MARGIN_X, DEFAULT_MARGIN_Y},
  geo::DroneType,
};

/// Skyscout 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 目标检测与地理定位
  Object(ObjectArgs),
  /// 深度估计避障
  Depth(DepthArgs),
}

/// 两类引擎共用的参数
#[derive(ClapArgs, Debug)]
pub struct CommonArgs {
  /// 输入来源，例如 folder:///data/frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 模型目录
  #[arg(long, default_value = "./model", value_name = "DIR")]
  pub model_root: PathBuf,

  /// 检测日志文件
  #[arg(long, value_name = "FILE")]
  pub log: Option<PathBuf>,

  /// 保存原始与标注图像
  #[arg(short = 's', long)]
  pub store: bool,

  /// 图像保存目录
  #[arg(long, default_value = "./images", value_name = "DIR")]
  pub images: PathBuf,

  /// 日志中图像地址的前缀
  #[arg(long, value_name = "URL")]
  pub webserver: Option<String>,

  /// 标注文字所用字体，未指定时不绘制文字
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 叠加在检测图像左上角的水印
  #[arg(long, value_name = "FILE")]
  pub watermark: Option<PathBuf>,

  /// 关闭各阶段耗时与帧率统计
  #[arg(long)]
  pub no_timing: bool,

  /// 最大处理帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frames: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct ObjectArgs {
  #[command(flatten)]
  pub common: CommonArgs,

  /// 检测模型名称
  #[arg(short = 'm', long, default_value = "coco", value_name = "NAME")]
  pub model: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(short = 't', long, default_value = "0.85", value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 排除的类别编号，逗号分隔
  #[arg(short = 'x', long, default_value = "", value_name = "IDS")]
  pub exclude: String,

  /// 无人机型号，决定相机视场角
  #[arg(short = 'd', long, default_value_t = DroneType::Anafi, value_name = "TYPE")]
  pub drone: DroneType,
}

#[derive(ClapArgs, Debug)]
pub struct DepthArgs {
  #[command(flatten)]
  pub common: CommonArgs,

  /// MiDaS 模型名称
  #[arg(short = 'm', long, default_value = "DPT_Large", value_name = "NAME")]
  pub model: String,

  /// 障碍物深度阈值 (0 - 255)
  #[arg(short = 't', long, default_value_t = DEFAULT_DEPTH_THRESHOLD, value_name = "THRESHOLD")]
  pub threshold: u8,

  /// 左右两侧裁掉的比例
  #[arg(long, default_value_t = DEFAULT_MARGIN_X, value_name = "RATIO")]
  pub margin_x: f64,

  /// 上下两侧裁掉的比例
  #[arg(long, default_value_t = DEFAULT_MARGIN_Y, value_name = "RATIO")]
  pub margin_y: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn common(argv: &[&str]) -> CommonArgs {
    match Args::try_parse_from(argv).unwrap().command {
      Command::Object(args) => args.common,
      Command::Depth(args) => args.common,
    }
  }

  #[test]
  fn timing_is_reported_by_default() {
    let args = common(&["skyscout", "depth", "--input", "folder:///frames"]);
    assert!(!args.no_timing);
    let args = common(&["skyscout", "object", "--input", "folder:///frames"]);
    assert!(!args.no_timing);
  }

  #[test]
  fn timing_can_be_disabled() {
    let args = common(&["skyscout", "depth", "--input", "folder:///frames", "--no-timing"]);
    assert!(args.no_timing);
  }

  #[test]
  fn depth_defaults() {
    let args = Args::try_parse_from(["skyscout", "depth", "--input", "folder:///frames"]).unwrap();
    let Command::Depth(depth) = args.command else {
      panic!("应当解析为 depth 子命令");
    };
    assert_eq!(depth.model, "DPT_Large");
    assert_eq!(depth.threshold, DEFAULT_DEPTH_THRESHOLD);
  }

  #[test]
  fn font_and_watermark_are_optional_files() {
    let args = common(&["skyscout", "object", "--input", "folder:///frames"]);
    assert!(args.font.is_none());
    assert!(args.watermark.is_none());

    let args = common(&[
      "skyscout",
      "object",
      "--input",
      "folder:///frames",
      "--font",
      "/fonts/a.ttf",
      "--watermark",
      "/marks/w.png",
    ]);
    assert_eq!(args.font, Some(PathBuf::from("/fonts/a.ttf")));
    assert_eq!(args.watermark, Some(PathBuf::from("/marks/w.png")));
  }
}
