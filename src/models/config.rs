//! 引擎配置
//!
//! 配置来源按优先级叠加：内置默认值 < 可选的 `clef-engine.toml` <
//! `CLEF_ENGINE_*` 环境变量。所有字段都有默认值，零配置即可运行。

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// 目录展开时接受的扩展名
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".clef", ".json", ".txt"];

/// 引擎配置
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EngineConfig {
    /// 目录展开时保留的文件扩展名（带点）；显式传入的文件不做检查
    pub allowed_extensions: Vec<String>,
    /// 变更通知通道容量
    pub change_bus_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            change_bus_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// 从配置文件与环境变量加载；缺失的来源按默认值处理
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("clef-engine").required(false))
            .add_source(config::Environment::with_prefix("CLEF_ENGINE").try_parsing(true))
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let mut loaded: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        if loaded.change_bus_capacity == 0 {
            return Err(EngineError::Config(
                "change_bus_capacity must be greater than zero".to_string(),
            ));
        }
        // 允许省略点号书写扩展名
        for ext in &mut loaded.allowed_extensions {
            if !ext.starts_with('.') {
                ext.insert(0, '.');
            }
        }
        Ok(loaded)
    }
}
