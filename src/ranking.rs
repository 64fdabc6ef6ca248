//! 相似图片排序
//!
//! 对所有图片做精确的线性扫描，复杂度为 O(N·D)。

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use log::{debug, error};

use crate::error::{Error, Result};
use crate::metrics;
use crate::model::{ImageRecord, SimilarityResult};
use crate::similarity::{cosine_similarity, round_score};
use crate::store::{HistoryLedger, ImageStore};

/// 未指定时返回的结果数量
pub const DEFAULT_LIMIT: usize = 10;
/// 默认允许的最大结果数量
pub const MAX_LIMIT: usize = 1000;
/// `--max-limit` 可配置的上限
pub const MAX_LIMIT_CEILING: usize = 1_000_000;

/// 将请求的结果数量限制在 `1..=max_limit` 范围内
pub fn clamp_limit(limit: Option<usize>, max_limit: usize) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max_limit.max(1))
}

/// 带分数的候选图片
///
/// 排序规则：分数高的在前，分数相同时 ID 小的在前
struct Ranked {
    score: f64,
    image: Arc<ImageRecord>,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score).then(self.image.id.cmp(&other.image.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// 相似图片搜索引擎
#[derive(Clone)]
pub struct Ranker {
    images: Arc<dyn ImageStore>,
    history: Arc<dyn HistoryLedger>,
    max_limit: usize,
}

impl Ranker {
    pub fn new(images: Arc<dyn ImageStore>, history: Arc<dyn HistoryLedger>) -> Self {
        Self { images, history, max_limit: MAX_LIMIT }
    }

    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// 搜索与指定图片最相似的图片，并记录一条搜索历史
    ///
    /// 搜索在独立的任务中执行，调用方中途放弃等待时，搜索仍会完成并写入历史。
    pub async fn find_similar(
        &self,
        source_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        let limit = clamp_limit(limit, self.max_limit);
        let this = self.clone();
        tokio::spawn(async move { this.search(source_id, limit).await }).await?
    }

    async fn search(&self, source_id: i64, limit: usize) -> Result<Vec<SimilarityResult>> {
        let start = Instant::now();
        let source = self.images.get(source_id).await?.ok_or(Error::NotFound(source_id))?;

        // 堆的大小随候选数量增长，不按 limit 预分配
        let mut heap = BinaryHeap::new();
        let mut scanned = 0usize;
        let mut candidates = self.images.get_all();
        while let Some(image) = candidates.try_next().await? {
            // 只按 ID 排除源图片，特征向量相同的其他图片仍然参与排序
            if image.id == source.id {
                continue;
            }
            let score = cosine_similarity(&source.feature_vector, &image.feature_vector)
                .inspect_err(|e| error!("图片 {} 与图片 {} 无法比较: {e}", source.id, image.id))?;
            scanned += 1;

            heap.push(Ranked { score, image });
            if heap.len() > limit {
                // 堆顶是当前排名最靠后的候选
                heap.pop();
            }
        }
        drop(candidates);

        let results = heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| SimilarityResult::new(&ranked.image, round_score(ranked.score)))
            .collect::<Vec<_>>();

        self.history.append(source_id, results.len() as u32).await?;

        let elapsed = start.elapsed();
        metrics::observe_search(elapsed.as_secs_f64(), results.len());
        debug!(
            "搜索图片 {source_id}: 扫描 {scanned} 张，返回 {} 张，耗时 {:.2}ms",
            results.len(),
            elapsed.as_secs_f64() * 1000.
        );

        Ok(results)
    }
}
