//! 基于边缘密度的绘图页检测
//!
//! 边缘滤波标记的像素数超过阈值的页面判定为绘图页。
//! 滤波器按顺序尝试，第一个得出计数的决定结果。

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::sobel_gradients;
use slicer_core::{DrawingClassifier, RenderedPage};
use std::panic::{self, AssertUnwindSafe};

/// 边缘像素数超过该值即判定为绘图页
pub const DEFAULT_EDGE_THRESHOLD: u64 = 1000;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Sobel 梯度幅值达到该值的像素计为边缘
const SOBEL_CUTOFF: u16 = 150;

#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("image {width}x{height} is too small for {strategy}")]
    TooSmall {
        strategy: &'static str,
        width: u32,
        height: u32,
    },
    #[error("{strategy} panicked")]
    Panicked { strategy: &'static str },
}

/// 边缘像素计数策略
pub trait EdgeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn count_edges(&self, image: &GrayImage) -> Result<u64, EdgeError>;
}

/// Canny 检测，滞后阈值 50/150
#[derive(Debug, Clone, Copy, Default)]
pub struct CannyEdges;

impl EdgeStrategy for CannyEdges {
    fn name(&self) -> &'static str {
        "canny"
    }

    fn count_edges(&self, image: &GrayImage) -> Result<u64, EdgeError> {
        let (width, height) = image.dimensions();
        if width < 3 || height < 3 {
            return Err(EdgeError::TooSmall {
                strategy: self.name(),
                width,
                height,
            });
        }

        let edges = canny(image, CANNY_LOW, CANNY_HIGH);
        Ok(edges.pixels().filter(|p| p.0[0] > 0).count() as u64)
    }
}

/// 以固定阈值截断的 Sobel 梯度幅值。比 Canny 粗糙，但适用于任何非空图像
#[derive(Debug, Clone, Copy, Default)]
pub struct SobelEdges;

impl EdgeStrategy for SobelEdges {
    fn name(&self) -> &'static str {
        "sobel"
    }

    fn count_edges(&self, image: &GrayImage) -> Result<u64, EdgeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EdgeError::TooSmall {
                strategy: self.name(),
                width,
                height,
            });
        }

        let gradients = sobel_gradients(image);
        Ok(gradients.pixels().filter(|p| p.0[0] >= SOBEL_CUTOFF).count() as u64)
    }
}

/// 比较边缘像素数与阈值来分类页面
pub struct EdgeDensityClassifier {
    strategies: Vec<Box<dyn EdgeStrategy>>,
    threshold: u64,
}

impl EdgeDensityClassifier {
    /// 先 Canny，失败时回退到 Sobel
    pub fn new(threshold: u64) -> Self {
        let strategies: Vec<Box<dyn EdgeStrategy>> =
            vec![Box::new(CannyEdges), Box::new(SobelEdges)];
        Self::with_strategies(strategies, threshold)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn EdgeStrategy>>, threshold: u64) -> Self {
        Self {
            strategies,
            threshold,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// 第一个成功策略的名称和边缘像素数
    pub fn edge_count(&self, image: &GrayImage) -> Option<(&'static str, u64)> {
        for strategy in &self.strategies {
            let name = strategy.name();
            let result = panic::catch_unwind(AssertUnwindSafe(|| strategy.count_edges(image)))
                .unwrap_or(Err(EdgeError::Panicked { strategy: name }));

            match result {
                Ok(count) => return Some((name, count)),
                Err(e) => log::warn!("[Drawing] {}, 尝试下一个策略", e),
            }
        }
        None
    }

    pub fn is_drawing_image(&self, image: &GrayImage) -> bool {
        match self.edge_count(image) {
            Some((_, count)) => count > self.threshold,
            None => {
                log::warn!("[Drawing] 所有边缘策略均失败, 按文字页处理");
                false
            }
        }
    }
}

impl Default for EdgeDensityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_THRESHOLD)
    }
}

impl DrawingClassifier for EdgeDensityClassifier {
    fn is_drawing(&self, page: &RenderedPage) -> bool {
        let gray = page.image().to_luma8();
        let drawing = self.is_drawing_image(&gray);
        if drawing {
            log::debug!(
                "[Drawing] 第 {} 页 ({}) 判定为绘图页",
                page.page().index + 1,
                page.page().source
            );
        }
        drawing
    }
}
