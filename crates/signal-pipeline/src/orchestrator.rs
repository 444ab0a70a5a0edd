//! 파이프라인 오케스트레이터.
//!
//! 하나의 [`AnalysisRun`]을 고정된 단계 순서대로 실행합니다.
//!
//! # 실행 흐름
//!
//! 1. 전제 조건 확인 (설정 비어 있음, 알 수 없는 실행, QUEUED 아님 → `Precondition`, 기록 없음)
//! 2. QUEUED → RUNNING 원자적 점유 (외부 호출 전, 이미 점유됨 → `Precondition`)
//! 3. 시장 데이터 1회 조회 (실패 → FAILED, `DataFetch`)
//! 4. 단계 순차 실행
//!    - 성공: 단계 기록, 컨텍스트에 추가, 비용 누적
//!    - 모델 실패: 단계 기록 + `model_failures` 진단 기록, 모델 실패 표시, MODEL_FAILURE로 즉시 중단
//!    - 일시적 실패: 단계 기록 후 다음 단계 계속 (컨텍스트에는 추가하지 않음)
//! 5. SUCCEEDED 기록
//!
//! 단계 외부(저장 등)에서 발생한 에러는 실행을 FAILED로 기록한 뒤 호출자에게 반환합니다.

use signal_core::{
    AnalysisRun, AnalysisStep, Clock, ModelFailureRecord, PipelineConfig, PipelineSettings,
    RunStatus, StepConfig, SystemClock,
};
use signal_data::{DataError, MarketDataCache};
use signal_llm::ModelCaller;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::analyzer::StepKind;
use crate::classify::{classify_failure, FailureClass};
use crate::context::{PipelineContext, StepResult};
use crate::error::{PipelineError, PipelineResult, StepError};
use crate::health::ModelHealthRegistry;
use crate::repository::RunRepository;
use crate::telemetry::RunTelemetry;

/// 기본 단계 타임아웃.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(180);

enum StepsOutcome {
    Completed,
    /// 모델 실패로 중단
    Halted,
}

/// 파이프라인 오케스트레이터.
///
/// 여러 실행을 동시에 처리할 수 있도록 `&self`만 사용합니다.
/// 컨텍스트는 실행마다 새로 만들어지며 공유되지 않습니다.
pub struct PipelineOrchestrator {
    cache: Arc<MarketDataCache>,
    caller: Arc<dyn ModelCaller>,
    repository: Arc<dyn RunRepository>,
    health: Arc<ModelHealthRegistry>,
    clock: Arc<dyn Clock>,
    steps: Vec<StepKind>,
    step_timeout: Duration,
    data_ttl: Option<Duration>,
}

impl PipelineOrchestrator {
    pub fn new(
        cache: Arc<MarketDataCache>,
        caller: Arc<dyn ModelCaller>,
        repository: Arc<dyn RunRepository>,
        health: Arc<ModelHealthRegistry>,
    ) -> Self {
        Self {
            cache,
            caller,
            repository,
            health,
            clock: Arc::new(SystemClock),
            steps: StepKind::DAYSTART.to_vec(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            data_ttl: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 실행할 단계 순서를 지정합니다.
    pub fn with_steps(mut self, steps: Vec<StepKind>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// 시장 데이터 TTL (기본: 캐시 기본 TTL).
    pub fn with_data_ttl(mut self, ttl: Duration) -> Self {
        self.data_ttl = Some(ttl);
        self
    }

    pub fn with_settings(self, settings: &PipelineSettings) -> Self {
        self.with_step_timeout(Duration::from_secs(settings.step_timeout_secs))
    }

    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    pub fn health(&self) -> &Arc<ModelHealthRegistry> {
        &self.health
    }

    /// 실행을 끝까지 진행하고 종료 상태의 실행을 반환합니다.
    pub async fn run(&self, run: AnalysisRun, config: &PipelineConfig) -> PipelineResult<AnalysisRun> {
        self.run_with_telemetry(run, config)
            .await
            .map(|(run, _)| run)
    }

    /// [`run`](Self::run)과 같지만 실행 통계를 함께 반환합니다.
    #[instrument(
        name = "analysis_run",
        skip_all,
        fields(run_id = %run.id, instrument = %run.instrument, timeframe = %run.timeframe)
    )]
    pub async fn run_with_telemetry(
        &self,
        mut run: AnalysisRun,
        config: &PipelineConfig,
    ) -> PipelineResult<(AnalysisRun, RunTelemetry)> {
        self.check_preconditions(&run, config).await?;

        let started = Instant::now();
        let mut telemetry = RunTelemetry::new(run.id);

        match self.claim(&mut run).await {
            Ok(()) => {}
            // 다른 호출자가 이미 실행 중이므로 상태를 건드리지 않음
            Err(e @ PipelineError::Precondition(_)) => return Err(e),
            Err(e) => {
                self.fail_run(&mut run, &e).await;
                return Err(e);
            }
        }
        info!(steps = self.steps.len(), "분석 실행 시작");

        let market_data = match self.fetch_market_data(&run).await {
            Ok(data) => data,
            Err(e) => {
                let err = PipelineError::DataFetch(e);
                self.fail_run(&mut run, &err).await;
                return Err(err);
            }
        };

        let mut ctx = PipelineContext::new(run.instrument.clone(), run.timeframe, market_data)
            .with_plan(&self.steps);

        let final_status = match self
            .execute_steps(&mut run, &mut ctx, config, &mut telemetry)
            .await
        {
            Ok(StepsOutcome::Completed) => RunStatus::Succeeded,
            Ok(StepsOutcome::Halted) => RunStatus::ModelFailure,
            Err(e) => {
                self.fail_run(&mut run, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = self.persist_transition(&mut run, final_status).await {
            self.fail_run(&mut run, &e).await;
            return Err(e);
        }

        telemetry.status = run.status;
        telemetry.elapsed = started.elapsed();
        telemetry.log_summary();

        Ok((run, telemetry))
    }

    async fn check_preconditions(&self, run: &AnalysisRun, config: &PipelineConfig) -> PipelineResult<()> {
        if config.is_empty() {
            return Err(PipelineError::Precondition(
                "파이프라인 설정에 단계가 없습니다".to_string(),
            ));
        }
        config
            .validate()
            .map_err(|e| PipelineError::Precondition(e.to_string()))?;

        if run.status != RunStatus::Queued {
            return Err(PipelineError::Precondition(format!(
                "실행 {}은(는) QUEUED 상태가 아닙니다: {}",
                run.id, run.status
            )));
        }

        match self.repository.get_run(run.id).await? {
            Some(stored) if stored.status == RunStatus::Queued => {}
            Some(stored) => {
                return Err(PipelineError::Precondition(format!(
                    "실행 {}은(는) 이미 {} 상태입니다",
                    run.id, stored.status
                )));
            }
            None => {
                return Err(PipelineError::Precondition(format!(
                    "알 수 없는 실행: {}",
                    run.id
                )));
            }
        }

        for name in config.step_names() {
            if !self.steps.iter().any(|k| k.name() == name) {
                warn!(step = %name, "실행 단계에 없는 설정 무시");
            }
        }

        Ok(())
    }

    async fn fetch_market_data(
        &self,
        run: &AnalysisRun,
    ) -> Result<Arc<signal_core::NormalizedMarketData>, DataError> {
        let ttl = self.data_ttl.unwrap_or_else(|| self.cache.default_ttl());
        let data = self
            .cache
            .get_or_fetch(&run.instrument, run.timeframe, ttl)
            .await?;
        debug!(candles = data.len(), source = data.source(), "시장 데이터 준비");
        Ok(data)
    }

    async fn execute_steps(
        &self,
        run: &mut AnalysisRun,
        ctx: &mut PipelineContext,
        config: &PipelineConfig,
        telemetry: &mut RunTelemetry,
    ) -> PipelineResult<StepsOutcome> {
        let mut failures: Vec<ModelFailureRecord> = Vec::new();

        for kind in &self.steps {
            let step_name = kind.name();
            let step_config = config.step(step_name);
            let model = kind.resolve_model(step_config);

            if self.health.is_failing(&model) {
                warn!(step = step_name, model = %model, "실패 표시된 모델로 단계 실행");
            }

            let span = info_span!("step", step = step_name, model = %model);
            let outcome = self
                .execute_step(*kind, ctx, step_config)
                .instrument(span)
                .await;
            let now = self.clock.now();

            let err = match outcome {
                Ok(result) => {
                    let record = AnalysisStep::success(
                        run.id,
                        step_name,
                        result.input.clone(),
                        result.output.clone(),
                        result.model.clone(),
                        result.tokens_used,
                        result.cost_estimate,
                        now,
                    );
                    self.repository.append_step(&record).await?;

                    run.cost_est_total += result.cost_estimate;
                    telemetry.record_success(result.tokens_used, result.cost_estimate);
                    info!(
                        step = step_name,
                        tokens = result.tokens_used,
                        cost = result.cost_estimate,
                        "단계 완료"
                    );
                    ctx.insert(step_name, result);
                    continue;
                }
                Err(err) => err,
            };

            let message = err.to_string();
            let kind_name = err.kind_name();
            let class = classify_failure(&message, kind_name);

            let record = AnalysisStep::failure(
                run.id,
                step_name,
                serde_json::json!({ "error": message, "kind": kind_name }),
                kind_name,
                message.clone(),
                Some(model.clone()),
                class.is_model(),
                now,
            );
            self.repository.append_step(&record).await?;
            telemetry.record_failure(class.is_model());

            match class {
                FailureClass::Model => {
                    error!(step = step_name, model = %model, error = %message, "모델 실패, 실행 중단");

                    failures.push(ModelFailureRecord {
                        step_name: step_name.to_string(),
                        model: Some(model.clone()),
                        kind: kind_name.to_string(),
                        message: message.clone(),
                        occurred_at: now,
                    });
                    let diagnostic = AnalysisStep::model_failures(run.id, failures.clone(), now);
                    self.repository.append_step(&diagnostic).await?;

                    self.health.mark_failed(&model, &message, now);
                    return Ok(StepsOutcome::Halted);
                }
                FailureClass::Transient => {
                    warn!(step = step_name, kind = kind_name, error = %message, "단계 실패, 다음 단계 계속");
                }
            }
        }

        Ok(StepsOutcome::Completed)
    }

    async fn execute_step(
        &self,
        kind: StepKind,
        ctx: &PipelineContext,
        config: Option<&StepConfig>,
    ) -> Result<StepResult, StepError> {
        match tokio::time::timeout(
            self.step_timeout,
            kind.analyze(ctx, self.caller.as_ref(), config),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(self.step_timeout.as_secs())),
        }
    }

    /// QUEUED → RUNNING을 원자적으로 기록합니다.
    ///
    /// 저장된 실행이 이미 QUEUED가 아니면 `Precondition`을 반환합니다.
    async fn claim(&self, run: &mut AnalysisRun) -> PipelineResult<()> {
        let mut claimed = run.clone();
        claimed.transition_to(RunStatus::Running, self.clock.now())?;
        if !self.repository.claim_run(&claimed).await? {
            return Err(PipelineError::Precondition(format!(
                "실행 {}은(는) 이미 다른 호출자가 시작했습니다",
                run.id
            )));
        }
        *run = claimed;
        Ok(())
    }

    /// 상태 전이를 기록합니다. 기록에 성공한 경우에만 `run`에 반영됩니다.
    async fn persist_transition(&self, run: &mut AnalysisRun, next: RunStatus) -> PipelineResult<()> {
        let mut updated = run.clone();
        updated.transition_to(next, self.clock.now())?;
        self.repository.update_run(&updated).await?;
        *run = updated;
        Ok(())
    }

    /// 실행을 FAILED로 기록합니다 (최선 노력).
    async fn fail_run(&self, run: &mut AnalysisRun, cause: &PipelineError) {
        if !run.is_terminal() {
            if let Err(e) = run.transition_to(RunStatus::Failed, self.clock.now()) {
                warn!(run_id = %run.id, error = %e, "FAILED 전이 불가");
            }
        }
        if let Err(e) = self.repository.update_run(run).await {
            error!(run_id = %run.id, error = %e, "FAILED 상태 기록 실패");
        }
        error!(
            run_id = %run.id,
            status = %run.status,
            error = %cause,
            "분석 실행 실패"
        );
    }
}
