//! 贝塞尔缓动
//!
//! 用于 VMD 关键帧之间的非线性插值。曲线两端固定为 (0,0) 与 (1,1)，
//! 只由两个控制点决定。

use glam::Vec2;

/// 求解参数 t 时的收敛阈值
const EASE_EPSILON: f32 = 0.0005;

/// 曲线 trait
pub trait Curve {
    fn value(&self, v: f32) -> f32;
}

/// 计算缓动值
///
/// 先求曲线上 x 坐标等于 `x` 的参数 t，再返回该点的 y 坐标。
/// t 的修正步固定为 `t -= f(t) / 2`，与 VMD 播放器的结果保持一致。
/// 控制点落在对角线上时曲线为直线，直接返回 `x`。
pub fn ease(x: f32, p1: Vec2, p2: Vec2, iterations: u32) -> f32 {
    if p1.x == p1.y && p2.x == p2.y {
        return x;
    }

    let k0 = 1.0 + 3.0 * p1.x - 3.0 * p2.x;
    let k1 = 3.0 * p2.x - 6.0 * p1.x;
    let k2 = 3.0 * p1.x;

    let mut t = x;
    for _ in 0..iterations {
        let ft = k0 * t * t * t + k1 * t * t + k2 * t - x;
        if ft.abs() <= EASE_EPSILON {
            break;
        }
        t -= ft / 2.0;
    }

    let r = 1.0 - t;
    t * t * t + 3.0 * t * t * r * p2.y + 3.0 * t * r * r * p1.y
}

/// 三次贝塞尔曲线
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierCurve {
    /// 控制点1
    pub c0: Vec2,
    /// 控制点2
    pub c1: Vec2,
}

impl BezierCurve {
    /// 直线（VMD 默认插值参数 20,20,107,107）
    pub const LINEAR: Self = Self {
        c0: Vec2::new(20.0 / 127.0, 20.0 / 127.0),
        c1: Vec2::new(107.0 / 127.0, 107.0 / 127.0),
    };

    /// 创建新的贝塞尔曲线
    ///
    /// 控制点应归一化到 0-1 范围
    pub fn new(c0: Vec2, c1: Vec2) -> Self {
        Self { c0, c1 }
    }

    /// 从 VMD 参数创建贝塞尔曲线
    ///
    /// VMD 使用 [0, 127] 范围的控制点参数，顺序为 x1, y1, x2, y2
    pub fn from_parameters(parameters: [u8; 4]) -> Self {
        let c0 = Vec2::new(parameters[0] as f32 / 127.0, parameters[1] as f32 / 127.0);
        let c1 = Vec2::new(parameters[2] as f32 / 127.0, parameters[3] as f32 / 127.0);
        Self::new(c0, c1)
    }

    /// 导出为 VMD 参数格式
    pub fn to_parameters(&self) -> [u8; 4] {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 127.0).round() as u8;
        [
            quantize(self.c0.x),
            quantize(self.c0.y),
            quantize(self.c1.x),
            quantize(self.c1.y),
        ]
    }

    #[inline]
    pub fn is_linear(&self) -> bool {
        self.c0.x == self.c0.y && self.c1.x == self.c1.y
    }

    /// 指定修正步数计算缓动值
    #[inline]
    pub fn ease(&self, x: f32, iterations: u32) -> f32 {
        ease(x, self.c0, self.c1, iterations)
    }
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl Curve for BezierCurve {
    /// 使用默认的 12 步修正
    fn value(&self, v: f32) -> f32 {
        self.ease(v, 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let curves = [
            (Vec2::new(0.42, 0.0), Vec2::new(1.0, 1.0)),
            (Vec2::new(0.0, 0.0), Vec2::new(0.58, 1.0)),
            (Vec2::new(0.1, 0.9), Vec2::new(0.9, 0.1)),
        ];
        for (p1, p2) in curves {
            for n in [1, 4, 12] {
                assert_eq!(ease(0.0, p1, p2, n), 0.0);
                assert!((ease(1.0, p1, p2, n) - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_linear_curve() {
        // 控制点在对角线上时结果与输入完全相同
        let p1 = Vec2::new(0.25, 0.25);
        let p2 = Vec2::new(0.75, 0.75);
        for i in 0..=20 {
            let x = i as f32 / 20.0;
            assert_eq!(ease(x, p1, p2, 12), x);
        }
        assert!(BezierCurve::LINEAR.is_linear());
        assert_eq!(BezierCurve::LINEAR.value(0.3), 0.3);
    }

    #[test]
    fn test_ease_in_curve() {
        let curve = BezierCurve::new(Vec2::new(0.42, 0.0), Vec2::new(1.0, 1.0));
        // Ease-in 在开始时较慢
        assert!(curve.value(0.25) < 0.25);
        let mid = curve.value(0.5);
        assert!(mid > 0.0 && mid < 0.5);
    }

    #[test]
    fn test_zero_iterations_uses_initial_guess() {
        // t = x 直接代入 y(t)
        let p1 = Vec2::new(0.5, 0.0);
        let p2 = Vec2::new(0.5, 1.0);
        let x = 0.5f32;
        let r = 1.0 - x;
        let expected = x * x * x + 3.0 * x * x * r * p2.y + 3.0 * x * r * r * p1.y;
        assert!((ease(x, p1, p2, 0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_parameters() {
        let curve = BezierCurve::from_parameters([20, 20, 107, 107]);
        assert_eq!(curve, BezierCurve::LINEAR);
        assert_eq!(curve.to_parameters(), [20, 20, 107, 107]);

        let curve = BezierCurve::from_parameters([127, 0, 0, 127]);
        assert_eq!(curve.c0, Vec2::new(1.0, 0.0));
        assert_eq!(curve.c1, Vec2::new(0.0, 1.0));
    }
}
