/// 视频输入系统 (Video Input System)
///
/// 独立工作线程,负责视频文件解码
/// - VideoSource: 打开视频 + 读取流信息 + 启动解码线程 / 读取首帧
/// - DecodeFilter: YUV420P → RGBA, 有界通道发送
pub mod decode_filter;
pub mod decoder;

pub use decode_filter::DecodeFilter;
pub use decoder::{VideoInfo, VideoSource};
