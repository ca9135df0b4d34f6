//! 动画运行时配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 实例在创建时拷贝一份配置，之后修改全局配置不会影响已有实例。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationConfig {
    // ========== 时钟 ==========
    /// 动画帧率，默认 30（VMD 标准）
    pub frame_rate: u32,

    // ========== 插值 ==========
    /// 贝塞尔缓动的修正步数，默认 12
    pub bezier_iterations: u32,

    // ========== IK ==========
    /// IK 收敛判定阈值，默认 0.0005
    pub ik_epsilon: f32,
    /// 膝盖类关节的名称模式（名称包含任一模式即使用固定铰链轴）
    pub knee_patterns: Vec<String>,
    /// 膝盖铰链轴（骨骼本地坐标），默认 X 轴
    pub hinge_axis: Vec3,

    // ========== 层级 ==========
    /// 矩阵合成的起点骨骼名称，默认 "センター"
    pub root_bone_name: String,

    // ========== 调试 ==========
    /// 是否输出每帧 IK 调试日志，默认 false
    pub debug_log: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            bezier_iterations: 12,
            ik_epsilon: 0.0005,
            knee_patterns: vec!["ひざ".to_string(), "knee".to_string()],
            hinge_axis: Vec3::X,
            root_bone_name: "センター".to_string(),
            debug_log: false,
        }
    }
}

impl AnimationConfig {
    /// 名称是否匹配膝盖模式
    pub fn is_knee_name(&self, name: &str) -> bool {
        self.knee_patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && name.contains(pattern.as_str()))
    }
}

/// 全局配置实例
static ANIMATION_CONFIG: Lazy<RwLock<AnimationConfig>> =
    Lazy::new(|| RwLock::new(AnimationConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> AnimationConfig {
    ANIMATION_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: AnimationConfig) {
    *ANIMATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *ANIMATION_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = AnimationConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimationConfig::default();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.bezier_iterations, 12);
        assert_eq!(config.root_bone_name, "センター");
        assert!((config.ik_epsilon - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_global_config() {
        set_config(AnimationConfig {
            debug_log: true,
            ..AnimationConfig::default()
        });
        assert!(get_config().debug_log);
        reset_config();
        assert_eq!(get_config(), AnimationConfig::default());
    }

    #[test]
    fn test_knee_name() {
        let config = AnimationConfig::default();
        assert!(config.is_knee_name("左ひざ"));
        assert!(config.is_knee_name("left_knee"));
        assert!(!config.is_knee_name("左足"));
    }
}
