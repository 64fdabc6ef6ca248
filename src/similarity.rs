//! 特征向量相似度计算

use crate::error::{Error, Result};

/// 计算两个向量的余弦相似度
///
/// 两个向量长度必须一致，否则返回 [`Error::DimensionMismatch`]。
/// 任意一个向量的模为 0 时结果为 0，包括两个零向量相比较的情况。
/// 返回值不做截断，浮点误差可能使其略微超出 `[-1, 1]`。
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { expected: a.len(), actual: b.len() });
    }

    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0. || norm_b == 0. {
        return Ok(0.);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// 将相似度保留两位小数，采用四舍五入（远离零方向）
pub fn round_score(score: f64) -> f64 {
    (score * 100.).round() / 100.
}
