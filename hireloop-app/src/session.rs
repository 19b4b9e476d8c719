use anyhow::{Context, Result};
use hireloop_config::RunConfig;
use hireloop_drivers::EasyApplyDriver;
use hireloop_engine::{
    AnswerProvider, HistoryStore, LlmAnswerProvider, NoAnswerProvider, RunOrchestrator,
    RunReport, TokioPacer,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything a run needs, built from the loaded configuration.
pub struct Session {
    config: Arc<RunConfig>,
    driver: Arc<EasyApplyDriver>,
    provider: Arc<dyn AnswerProvider>,
    history: HistoryStore,
}

impl Session {
    pub async fn build(config: RunConfig) -> Result<Self> {
        let history = HistoryStore::open(&config.storage.database_path).await?;
        info!(
            path = %config.storage.database_path.display(),
            jobs = history.len(),
            "session.history_opened"
        );

        let provider = answer_provider(&config).await;
        let driver = EasyApplyDriver::connect(&config.browser, &config.search)
            .await
            .context("failed to start the browser session")?;

        Ok(Self {
            config: Arc::new(config),
            driver: Arc::new(driver),
            provider,
            history,
        })
    }

    /// Run until a stop condition or ctrl-c, then close the browser.
    pub async fn run(self) -> Result<RunReport> {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("session.interrupted");
                on_signal.cancel();
            }
        });

        let mut orchestrator = RunOrchestrator::new(
            self.config.clone(),
            self.driver.clone(),
            self.provider,
            Arc::new(TokioPacer),
            self.history,
            cancel,
        )
        .await?;
        let report = orchestrator.run().await;
        drop(orchestrator);

        match Arc::try_unwrap(self.driver) {
            Ok(driver) => {
                if let Err(err) = driver.close().await {
                    warn!(error = %err, "session.browser_close_failed");
                }
            }
            Err(_) => warn!("session.browser_still_shared"),
        }
        report
    }
}

/// The model-backed provider when one is configured and reachable.
async fn answer_provider(config: &RunConfig) -> Arc<dyn AnswerProvider> {
    let Some(llm) = &config.llm else {
        return Arc::new(NoAnswerProvider);
    };
    match hireloop_llm::connect(llm).await {
        Ok(client) => {
            info!(model = client.model_name(), "session.llm_ready");
            Arc::new(LlmAnswerProvider::new(client))
        }
        Err(err) => {
            warn!(error = %err, "session.llm_unavailable");
            Arc::new(NoAnswerProvider)
        }
    }
}
