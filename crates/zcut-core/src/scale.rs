//! 比例换算
//!
//! 画布帧（Canvas Frame）描述产品的真实尺寸（英寸）与编辑画布当前的像素尺寸，
//! 两者之比即比例系数（像素/英寸）。比例系数每次都从当前尺寸重新计算，不做缓存，
//! 这样画布缩放后不会沿用过期的值。

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// 计算比例系数（每单位真实长度对应的像素数）
pub fn calculate_scale(real_world_width: f64, pixel_width: f64) -> CoreResult<f64> {
    check_dimension("real_world_width", real_world_width)?;
    check_dimension("pixel_width", pixel_width)?;
    Ok(pixel_width / real_world_width)
}

/// 像素 → 真实单位
pub fn to_real(pixels: f64, scale: f64) -> CoreResult<f64> {
    check_scale(scale)?;
    Ok(pixels / scale)
}

/// 真实单位 → 像素
pub fn to_pixels(real: f64, scale: f64) -> CoreResult<f64> {
    check_scale(scale)?;
    Ok(real * scale)
}

fn check_dimension(name: &'static str, value: f64) -> CoreResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidDimension { name, value })
    }
}

fn check_scale(scale: f64) -> CoreResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidScale(scale))
    }
}

/// 画布帧
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasFrame {
    /// 真实宽度（英寸）
    pub real_width: f64,
    /// 真实高度（英寸）
    pub real_height: f64,
    /// 画布像素宽度
    pub pixel_width: f64,
    /// 画布像素高度
    pub pixel_height: f64,
}

impl CanvasFrame {
    pub fn new(real_width: f64, real_height: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            real_width,
            real_height,
            pixel_width,
            pixel_height,
        }
    }

    /// 检查四个尺寸均为正数
    pub fn validate(&self) -> CoreResult<()> {
        check_dimension("real_width", self.real_width)?;
        check_dimension("real_height", self.real_height)?;
        check_dimension("pixel_width", self.pixel_width)?;
        check_dimension("pixel_height", self.pixel_height)?;
        Ok(())
    }

    /// 当前比例系数（像素/英寸）
    pub fn scale(&self) -> CoreResult<f64> {
        calculate_scale(self.real_width, self.pixel_width)
    }

    /// 画布尺寸变化（窗口缩放等）
    pub fn resize(&mut self, pixel_width: f64, pixel_height: f64) {
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;
    }

    pub fn to_real(&self, pixels: f64) -> CoreResult<f64> {
        to_real(pixels, self.scale()?)
    }

    pub fn to_pixels(&self, real: f64) -> CoreResult<f64> {
        to_pixels(real, self.scale()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_scale() {
        assert_eq!(calculate_scale(24.0, 1200.0).unwrap(), 50.0);
        assert_eq!(calculate_scale(46.0, 920.0).unwrap(), 20.0);
    }

    #[test]
    fn test_non_positive_dimensions() {
        for (w, p) in [(0.0, 100.0), (-1.0, 100.0), (10.0, 0.0), (10.0, -5.0), (f64::NAN, 1.0)] {
            assert!(matches!(
                calculate_scale(w, p),
                Err(CoreError::InvalidDimension { .. })
            ));
        }
    }

    #[test]
    fn test_roundtrip() {
        for scale in [0.37, 1.0, 50.0, 96.0, 1234.5] {
            for x in [0.0, 0.001, 1.5, 12.0, 9876.54321, -3.25] {
                let back = to_real(to_pixels(x, scale).unwrap(), scale).unwrap();
                assert!((back - x).abs() <= 1e-9 * x.abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_invalid_scale() {
        assert_eq!(to_real(10.0, 0.0), Err(CoreError::InvalidScale(0.0)));
        assert_eq!(to_pixels(10.0, -2.0), Err(CoreError::InvalidScale(-2.0)));
    }

    #[test]
    fn test_scale_follows_resize() {
        let mut frame = CanvasFrame::new(24.0, 18.0, 1200.0, 900.0);
        assert_eq!(frame.scale().unwrap(), 50.0);
        frame.resize(600.0, 450.0);
        assert_eq!(frame.scale().unwrap(), 25.0);
        assert_eq!(frame.to_real(300.0).unwrap(), 12.0);
    }

    #[test]
    fn test_validate_frame() {
        assert!(CanvasFrame::new(24.0, 18.0, 1200.0, 900.0).validate().is_ok());
        assert!(CanvasFrame::new(24.0, 0.0, 1200.0, 900.0).validate().is_err());
        assert!(CanvasFrame::new(24.0, 18.0, 1200.0, -1.0).validate().is_err());
    }
}
