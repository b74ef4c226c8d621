//! 批量测量
//!
//! 按输入顺序逐对测量，默认遇到第一个失败即中止（fail-fast），不产生部分结果。
//! 可选文件级并行：结果按原始索引排序后再按同样的规则汇总，报告索引最小的失败。

use crate::core::{AudioSource, MeasurementResult, Measurer};
use crate::engine::ScoringEngine;
use crate::error::{BatchError, BatchRunError, ErrorCategory};
use crate::tools::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};
use crate::tools::formatter::write_results_csv;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// 一对输入：(参考, 受损)
pub type SourcePair = (AudioSource, AudioSource);

/// 单对失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FailurePolicy {
    /// 第一个失败即中止整个批次
    #[default]
    FailFast,
    /// 失败对以给定分数占位并记录到 `BatchOutcome::failures`
    ///
    /// 引擎不可用仍然中止批次。
    Placeholder(f64),
}

/// 占位模式下记录的单对失败
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    pub pair_index: usize,
    pub reference: Option<String>,
    pub degraded: Option<String>,
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&BatchError> for PairFailure {
    fn from(err: &BatchError) -> Self {
        Self {
            pair_index: err.pair_index,
            reference: err.reference.clone(),
            degraded: err.degraded.clone(),
            category: ErrorCategory::from_error(err.kind()),
            message: err.kind().to_string(),
        }
    }
}

/// MOS-LQO统计摘要
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// 批处理结果（与输入一一对应，保持输入顺序）
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<MeasurementResult>,
    /// 仅占位模式下非空
    pub failures: Vec<PairFailure>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// 真实测量结果的MOS-LQO统计（排除占位结果）
    pub fn summary(&self) -> Option<MosSummary> {
        let failed: HashSet<usize> = self.failures.iter().map(|f| f.pair_index).collect();
        let scores: Vec<f64> = self
            .results
            .iter()
            .enumerate()
            .filter(|(index, _)| !failed.contains(index))
            .map(|(_, r)| r.moslqo)
            .collect();

        if scores.is_empty() {
            return None;
        }

        let count = scores.len();
        Some(MosSummary {
            count,
            mean: scores.iter().sum::<f64>() / count as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// 批量测量执行器
pub struct BatchRunner<E: ScoringEngine> {
    measurer: Measurer<E>,
    policy: FailurePolicy,
    parallelism: usize,
}

impl<E: ScoringEngine> BatchRunner<E> {
    /// 创建串行、fail-fast的执行器
    pub fn new(measurer: Measurer<E>) -> Self {
        Self {
            measurer,
            policy: FailurePolicy::FailFast,
            parallelism: MIN_PARALLEL_DEGREE,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置文件级并发度（限制在 1..=16）
    pub fn with_parallelism(mut self, degree: usize) -> Self {
        self.parallelism = degree.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE);
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn measurer(&self) -> &Measurer<E> {
        &self.measurer
    }

    /// 执行批量测量
    ///
    /// # 错误
    ///
    /// 返回的 `BatchError` 记录中止位置；fail-fast下已成功的结果全部丢弃。
    pub fn run(&self, pairs: Vec<SourcePair>) -> Result<BatchOutcome, BatchError> {
        let total = pairs.len();
        info!(
            total,
            parallelism = self.parallelism,
            policy = ?self.policy,
            "Starting batch measurement"
        );

        if self.parallelism > 1 && total > 1 {
            match self.run_parallel(pairs) {
                Ok(outcome) => return outcome,
                Err(pairs) => {
                    warn!("并行处理不可用，回退到串行模式 / parallel pool unavailable, running serially");
                    return self.collect(self.measure_serial(pairs));
                }
            }
        }

        self.collect(self.measure_serial(pairs))
    }

    /// 执行批量测量并写出CSV
    pub fn run_to_csv<P: AsRef<Path>>(
        &self,
        pairs: Vec<SourcePair>,
        path: P,
    ) -> Result<BatchOutcome, BatchRunError> {
        let outcome = self.run(pairs)?;
        write_results_csv(path.as_ref(), &outcome.results).map_err(BatchRunError::Output)?;
        Ok(outcome)
    }

    fn measure_pair(
        &self,
        pair_index: usize,
        reference: AudioSource,
        degraded: AudioSource,
    ) -> Result<MeasurementResult, BatchError> {
        let reference_locator = reference.locator();
        let degraded_locator = degraded.locator();
        debug!(pair_index, reference = ?reference_locator, "Measuring pair");

        self.measurer
            .measure(reference, degraded)
            .map_err(|source| BatchError {
                pair_index,
                reference: reference_locator,
                degraded: degraded_locator,
                source,
            })
    }

    /// 串行：惰性迭代，fail-fast时后续对不会被测量
    fn measure_serial(
        &self,
        pairs: Vec<SourcePair>,
    ) -> impl Iterator<Item = Result<MeasurementResult, BatchError>> + '_ {
        pairs
            .into_iter()
            .enumerate()
            .map(|(index, (reference, degraded))| self.measure_pair(index, reference, degraded))
    }

    /// 并行：专用rayon线程池，结果按原始索引排序
    ///
    /// 线程池创建失败时原样交还输入。
    #[allow(clippy::type_complexity)]
    fn run_parallel(
        &self,
        pairs: Vec<SourcePair>,
    ) -> Result<Result<BatchOutcome, BatchError>, Vec<SourcePair>> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("visqol-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "线程池创建失败 / failed to build thread pool");
                return Err(pairs);
            }
        };

        let mut measured: Vec<(usize, Result<MeasurementResult, BatchError>)> =
            pool.install(|| {
                pairs
                    .into_par_iter()
                    .enumerate()
                    .map(|(index, (reference, degraded))| {
                        (index, self.measure_pair(index, reference, degraded))
                    })
                    .collect()
            });

        // 按原始顺序排序（保证输出顺序与fail-fast的失败位置）
        measured.sort_by_key(|(index, _)| *index);

        Ok(self.collect(measured.into_iter().map(|(_, result)| result)))
    }

    /// 按策略汇总逐对结果
    fn collect(
        &self,
        measured: impl Iterator<Item = Result<MeasurementResult, BatchError>>,
    ) -> Result<BatchOutcome, BatchError> {
        let mut outcome = BatchOutcome::default();

        for item in measured {
            match (item, self.policy) {
                (Ok(result), _) => outcome.results.push(result),
                (Err(err), FailurePolicy::FailFast) => return Err(err),
                (Err(err), FailurePolicy::Placeholder(_)) if err.kind().is_fatal() => {
                    return Err(err);
                }
                (Err(err), FailurePolicy::Placeholder(score)) => {
                    warn!(
                        pair_index = err.pair_index,
                        score,
                        error = %err.kind(),
                        "Substituting placeholder score"
                    );
                    outcome.results.push(MeasurementResult::placeholder(
                        score,
                        err.reference.clone(),
                        err.degraded.clone(),
                    ));
                    outcome.failures.push(PairFailure::from(&err));
                }
            }
        }

        info!(
            measured = outcome.results.len() - outcome.failures.len(),
            failed = outcome.failures.len(),
            "Batch measurement finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfigCache, EngineOptions, Mode, SimilarityResult};
    use crate::error::{MeasureError, MeasureResult};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 分数 = 参考首样本；受损首样本为负时测量失败
    #[derive(Default)]
    struct FirstSampleEngine {
        measured: AtomicUsize,
    }

    impl ScoringEngine for FirstSampleEngine {
        type Handle = ();

        fn configure(&self, _options: &EngineOptions) -> MeasureResult<()> {
            Ok(())
        }

        fn measure(
            &self,
            _handle: &mut (),
            reference: &[f64],
            degraded: &[f64],
        ) -> MeasureResult<SimilarityResult> {
            self.measured.fetch_add(1, Ordering::SeqCst);
            if degraded[0] < 0.0 {
                return Err(MeasureError::MeasurementFailure("negative".into()));
            }
            Ok(SimilarityResult {
                moslqo: reference[0],
                vnsim: 0.9,
                fvnsim: Vec::new(),
                center_freq_bands: Vec::new(),
            })
        }
    }

    fn runner() -> BatchRunner<FirstSampleEngine> {
        let cache = Arc::new(EngineConfigCache::new(FirstSampleEngine::default(), "/m"));
        BatchRunner::new(Measurer::new(cache, Mode::Audio))
    }

    fn pair(score: f64, degraded: f64) -> SourcePair {
        (vec![score; 4].into(), vec![degraded; 4].into())
    }

    fn measured_count(runner: &BatchRunner<FirstSampleEngine>) -> usize {
        runner
            .measurer()
            .cache()
            .engine()
            .measured
            .load(Ordering::SeqCst)
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let runner = runner();
        let err = runner
            .run(vec![pair(4.0, 0.1), pair(3.0, -1.0), pair(2.0, 0.1)])
            .unwrap_err();

        assert_eq!(err.pair_index, 1);
        assert!(matches!(err.kind(), MeasureError::MeasurementFailure(_)));
        // 第三对不会被测量
        assert_eq!(measured_count(&runner), 2);
    }

    #[test]
    fn test_placeholder_policy_records_failures() {
        let runner = runner().with_policy(FailurePolicy::Placeholder(1.0));
        let outcome = runner
            .run(vec![pair(4.0, 0.1), pair(3.0, -1.0), pair(2.0, 0.1)])
            .unwrap();

        let scores: Vec<f64> = outcome.results.iter().map(|r| r.moslqo).collect();
        assert_eq!(scores, vec![4.0, 1.0, 2.0]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].pair_index, 1);
        assert_eq!(outcome.failures[0].category, ErrorCategory::Engine);

        let summary = outcome.summary().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 4.0);
    }

    #[test]
    fn test_parallel_preserves_order_and_lowest_failure() {
        let runner = runner().with_parallelism(4);
        let pairs: Vec<SourcePair> = (1..=12).map(|i| pair(i as f64, 0.1)).collect();
        let outcome = runner.run(pairs).unwrap();
        let scores: Vec<f64> = outcome.results.iter().map(|r| r.moslqo).collect();
        assert_eq!(scores, (1..=12).map(|i| i as f64).collect::<Vec<_>>());

        let pairs: Vec<SourcePair> = (0..12)
            .map(|i| pair(1.0, if i == 3 || i == 9 { -1.0 } else { 0.1 }))
            .collect();
        assert_eq!(runner.run(pairs).unwrap_err().pair_index, 3);
    }

    #[test]
    fn test_parallelism_is_clamped() {
        assert_eq!(runner().with_parallelism(0).parallelism(), 1);
        assert_eq!(runner().with_parallelism(64).parallelism(), 16);
    }

    #[test]
    fn test_empty_batch() {
        let outcome = runner().run(Vec::new()).unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.summary().is_none());
    }
}
