//! 骨骼关键帧

use glam::{Quat, Vec2, Vec3};

use super::bezier_curve::BezierCurve;

/// 骨骼关键帧
///
/// 插值控制点属于“区间终点”：从上一帧过渡到本帧时使用本帧的 p1/p2。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame {
    /// 帧索引
    pub frame_no: u32,
    /// 旋转（单位四元数）
    pub rotation: Quat,
    /// 相对初始位置的平移
    pub translation: Vec3,
    /// 贝塞尔控制点1
    pub p1: Vec2,
    /// 贝塞尔控制点2
    pub p2: Vec2,
}

impl KeyFrame {
    pub fn new(frame_no: u32, rotation: Quat, translation: Vec3, curve: BezierCurve) -> Self {
        Self {
            frame_no,
            rotation,
            translation,
            p1: curve.c0,
            p2: curve.c1,
        }
    }

    /// 线性插值的关键帧
    pub fn linear(frame_no: u32, rotation: Quat, translation: Vec3) -> Self {
        Self::new(frame_no, rotation, translation, BezierCurve::LINEAR)
    }

    /// 从解码器的原始数据创建
    ///
    /// 四元数按 (x, y, z, w) 排列，会被归一化；长度为 0 或非有限值时
    /// 视为单位旋转。
    pub fn from_raw(
        frame_no: u32,
        rotation: [f32; 4],
        translation: [f32; 3],
        bezier: [u8; 4],
    ) -> Self {
        let q = Quat::from_array(rotation);
        let length = q.length();
        let rotation = if length.is_finite() && length > f32::EPSILON {
            q / length
        } else {
            log::debug!("[Motion] 帧 {} 的四元数无效，使用单位旋转", frame_no);
            Quat::IDENTITY
        };

        Self::new(
            frame_no,
            rotation,
            Vec3::from_array(translation),
            BezierCurve::from_parameters(bezier),
        )
    }

    #[inline]
    pub fn curve(&self) -> BezierCurve {
        BezierCurve::new(self.p1, self.p2)
    }
}
