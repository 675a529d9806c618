//! 可观测性模块
//!
//! 提供 Prometheus 推理指标与结构化日志初始化。

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{AppError, Result};

// ===== Inference Metrics =====

/// 推理与模型缓存指标
#[derive(Clone)]
pub struct InferenceMetrics {
    registry: Registry,
    requests: IntCounterVec,
    failures: IntCounterVec,
    latency: HistogramVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    model_loads: IntCounter,
    evictions: IntCounter,
    resident_models: IntGauge,
}

impl InferenceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("inference_requests_total", "Total inference requests"),
            &["operation"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new("inference_failures_total", "Total failed inference requests"),
            &["operation"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "inference_duration_seconds",
                "Inference latency in seconds, model load included",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["operation"],
        )?;
        let cache_hits = IntCounter::new("model_cache_hits_total", "Model cache hits")?;
        let cache_misses = IntCounter::new("model_cache_misses_total", "Model cache misses")?;
        let model_loads = IntCounter::new("model_loads_total", "Successful native model loads")?;
        let evictions = IntCounter::new("model_evictions_total", "Models evicted from cache")?;
        let resident_models = IntGauge::new("models_resident", "Models resident in memory")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(model_loads.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(resident_models.clone()))?;

        Ok(Self {
            registry,
            requests,
            failures,
            latency,
            cache_hits,
            cache_misses,
            model_loads,
            evictions,
            resident_models,
        })
    }

    /// 记录一次推理请求
    pub fn record_request(&self, operation: &str, duration: Duration, success: bool) {
        self.requests.with_label_values(&[operation]).inc();
        self.latency
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
        if !success {
            self.failures.with_label_values(&[operation]).inc();
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_load(&self) {
        self.model_loads.inc();
    }

    pub fn record_eviction(&self) {
        self.evictions.inc();
    }

    pub fn set_resident(&self, count: usize) {
        self.resident_models.set(count as i64);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.get()
    }

    pub fn model_loads(&self) -> u64 {
        self.model_loads.get()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.get()
    }

    pub fn requests(&self, operation: &str) -> u64 {
        self.requests.with_label_values(&[operation]).get()
    }

    pub fn failures(&self, operation: &str) -> u64 {
        self.failures.with_label_values(&[operation]).get()
    }

    /// 生成 Prometheus 文本格式指标
    pub fn gather(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for InferenceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceMetrics")
            .field("cache_hits", &self.cache_hits.get())
            .field("model_loads", &self.model_loads.get())
            .field("evictions", &self.evictions.get())
            .field("resident_models", &self.resident_models.get())
            .finish()
    }
}

// ===== Structured Logging =====

/// 初始化结构化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了 `log_dir` 时按天滚动写文件，
/// 返回的 guard 需要在进程生命周期内持有。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.file_prefix));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.structured {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };
    result.map_err(|e| AppError::Config(format!("tracing subscriber: {}", e)))?;

    Ok(guard)
}
