//! 日志初始化
//!
//! 引擎本身只通过 `tracing` 发出结构化日志；由二进制或测试入口决定
//! 是否安装订阅者。过滤级别通过 `CLEF_ENGINE_LOG` 环境变量控制。

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 安装全局 tracing 订阅者（幂等，重复调用为空操作）
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("CLEF_ENGINE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("clef_engine=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
