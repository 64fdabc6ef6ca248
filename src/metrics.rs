use std::sync::LazyLock;
use std::time::Duration;

use log::error;
use prometheus::*;
use tokio::task::spawn_blocking;

static METRIC_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imsim_search_duration",
        "duration of the similarity search in seconds",
        exponential_buckets(0.001, 2., 14).unwrap()
    )
    .unwrap()
});

static METRIC_SEARCH_RESULT_COUNT: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imsim_search_result_count",
        "number of images returned by the similarity search",
        vec![0., 1., 5., 10., 20., 50., 100., 500., 1000.]
    )
    .unwrap()
});

static METRIC_INGEST_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("imsim_ingest_count", "count of the ingested images").unwrap()
});

static METRIC_REJECT_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imsim_reject_count",
        "count of the rejected uploads",
        &["reason"]
    )
    .unwrap()
});

/// 记录一次相似图片搜索
pub fn observe_search(duration: f64, result_count: usize) {
    METRIC_SEARCH_DURATION.observe(duration);
    METRIC_SEARCH_RESULT_COUNT.observe(result_count as f64);
}

pub fn inc_ingest() {
    METRIC_INGEST_COUNT.inc();
}

/// 记录一次被拒绝的上传
pub fn inc_reject(reason: &str) {
    METRIC_REJECT_COUNT.with_label_values(&[reason]).inc();
}

/// Pushgateway 推送配置
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    pub instance: String,
    /// (username, password)
    pub auth: Option<(String, String)>,
    pub interval: Duration,
}

/// 在后台定期推送所有指标
pub fn spawn_push(config: PushConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let metric_families = prometheus::gather();
            let PushConfig { url, instance, auth, .. } = config.clone();
            let r = spawn_blocking(move || {
                prometheus::push_metrics(
                    "imsim",
                    labels! {
                        "instance".to_string() => instance,
                    },
                    &url,
                    metric_families,
                    auth.map(|(username, password)| BasicAuthentication { username, password }),
                )
            })
            .await;
            match r {
                Ok(Err(e)) => error!("推送指标失败: {e}"),
                Err(e) => error!("推送任务异常结束: {e}"),
                Ok(Ok(())) => {}
            }
            tokio::time::sleep(config.interval).await;
        }
    })
}
