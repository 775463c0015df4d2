use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name().to_string();
        let started = Instant::now();
        tracing::info!("🚀 Starting {} pipeline", name);
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting...");
        let extracted = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Transforming...");
        let transformed = self.pipeline.transform(extracted).await?;
        self.monitor.log_stats("Transform");

        tracing::info!("📤 Loading...");
        let output = self.pipeline.load(transformed).await?;
        self.monitor.log_stats("Load");

        tracing::info!("✅ {} pipeline finished in {:?}", name, started.elapsed());
        self.monitor.log_final_stats();

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingPipeline {
        calls: Mutex<Vec<&'static str>>,
        fail_transform: bool,
    }

    #[async_trait]
    impl Pipeline for RecordingPipeline {
        type Extracted = Vec<u32>;
        type Transformed = u32;

        fn name(&self) -> &str {
            "recording"
        }

        async fn extract(&self) -> Result<Vec<u32>> {
            self.calls.lock().unwrap().push("extract");
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<u32>) -> Result<u32> {
            self.calls.lock().unwrap().push("transform");
            if self.fail_transform {
                return Err(crate::utils::error::PipelineError::processing("boom"));
            }
            Ok(data.iter().sum())
        }

        async fn load(&self, result: u32) -> Result<String> {
            self.calls.lock().unwrap().push("load");
            Ok(format!("sum={}", result))
        }
    }

    #[tokio::test]
    async fn test_engine_runs_phases_in_order() {
        let engine = EtlEngine::new(RecordingPipeline {
            calls: Mutex::new(vec![]),
            fail_transform: false,
        });

        assert_eq!(engine.run().await.unwrap(), "sum=6");
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[tokio::test]
    async fn test_engine_stops_on_failure() {
        let engine = EtlEngine::new(RecordingPipeline {
            calls: Mutex::new(vec![]),
            fail_transform: true,
        });

        assert!(engine.run().await.is_err());
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
