use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::RecoverySection;
use crate::stream::{
    PlanOptions, PlanResolver, PlaybackState, StreamError, StreamPlan, TimelineReporter,
    TimelineUpdate,
};

use super::{on_event, AdaptiveState, RecoveryDecision, ReplanRequest, TelemetryEvent};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("adaptive ladder exhausted at {cap_kbps} kbps")]
    Exhausted { cap_kbps: u32 },
    #[error("replacement plan resolution failed: {0}")]
    Stream(#[from] StreamError),
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Seam to the playback surface. The position is the player's absolute
/// time, which already includes the plan's start offset.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    async fn pause(&self);
    async fn position_s(&self) -> f64;
    async fn apply(&self, plan: StreamPlan);
}

/// Owns one playback attempt: consumes telemetry, runs the ladder, and
/// swaps plans through the resolver.
///
/// Dropping the event sender ends the loop; aborting the task carrying
/// `run` cancels any in-flight resolution. Both paths release the server
/// session best-effort without blocking teardown.
pub struct RecoverySupervisor {
    resolver: Arc<PlanResolver>,
    handle: Arc<dyn PlaybackHandle>,
    reporter: Option<Arc<dyn TimelineReporter>>,
    config: RecoverySection,
    state: AdaptiveState,
    item_id: String,
    session_id: String,
    duration_s: f64,
    events: mpsc::Receiver<TelemetryEvent>,
}

impl RecoverySupervisor {
    pub fn new(
        resolver: Arc<PlanResolver>,
        handle: Arc<dyn PlaybackHandle>,
        reporter: Option<Arc<dyn TimelineReporter>>,
        config: RecoverySection,
        plan: &StreamPlan,
        item_id: impl Into<String>,
        duration_s: f64,
    ) -> (Self, mpsc::Sender<TelemetryEvent>) {
        let (sender, events) = mpsc::channel(32);
        let supervisor = Self {
            resolver,
            handle,
            reporter,
            state: AdaptiveState::for_plan(plan, &config, Utc::now()),
            config,
            item_id: item_id.into(),
            session_id: plan.session_id.clone(),
            duration_s,
            events,
        };
        (supervisor, sender)
    }

    /// Consume telemetry until the sender is dropped (playback ended) or
    /// the ladder exhausts. Progress is reported on the configured
    /// interval, best-effort.
    pub async fn run(mut self) -> RecoveryResult<()> {
        let mut progress =
            tokio::time::interval(StdDuration::from_secs(self.config.timeline_interval_seconds));
        progress.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Err(fatal) = self.handle_event(event).await {
                            self.report(PlaybackState::Stopped).await;
                            return Err(fatal);
                        }
                    }
                    None => {
                        self.report(PlaybackState::Stopped).await;
                        return Ok(());
                    }
                },
                _ = progress.tick() => {
                    self.report(PlaybackState::Playing).await;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: TelemetryEvent) -> RecoveryResult<()> {
        match on_event(&mut self.state, &event, Utc::now(), &self.config) {
            RecoveryDecision::NoAction => Ok(()),
            RecoveryDecision::Exhausted => Err(RecoveryError::Exhausted {
                cap_kbps: self.state.bitrate_cap_kbps,
            }),
            RecoveryDecision::Replan(request) => self.execute_replan(request).await,
        }
    }

    async fn execute_replan(&mut self, request: ReplanRequest) -> RecoveryResult<()> {
        self.handle.pause().await;
        // The player reports absolute time, so the new plan starts from it
        // directly; adding the original offset again would double-count.
        let position = self.handle.position_s().await;
        let options = PlanOptions {
            prefer_passthrough: false,
            force_remux: false,
            force_transcode: request.force_transcode,
            max_bitrate_kbps: Some(request.bitrate_cap_kbps),
            fresh_session: true,
        };
        let plan = self
            .resolver
            .resolve_plan(&self.item_id, position, &options)
            .await?;
        info!(
            target: "recovery",
            item = %self.item_id,
            position_s = position,
            cap = request.bitrate_cap_kbps,
            forced = request.force_transcode,
            "re-anchoring playback on replacement plan"
        );
        self.session_id = plan.session_id.clone();
        self.state.reset_attempt(&plan, Utc::now());
        self.handle.apply(plan).await;
        Ok(())
    }

    async fn report(&self, state: PlaybackState) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        let position = self.handle.position_s().await;
        let update = TimelineUpdate {
            session_id: self.session_id.clone(),
            item_id: self.item_id.clone(),
            offset_s: position,
            state,
            duration_s: self.duration_s,
        };
        reporter.report(&update).await;
        if state == PlaybackState::Stopped {
            warn!(
                target: "recovery",
                session = %update.session_id,
                "playback attempt closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use tokio::sync::Mutex;
    use url::Url;

    use crate::config::StreamSection;
    use crate::stream::{
        AuthToken, MetadataClient, SessionContext, SessionProvider, StreamResult,
        TechnicalMetadata,
    };

    use super::*;

    struct StaticSession;

    #[async_trait]
    impl SessionProvider for StaticSession {
        async fn current(&self) -> StreamResult<SessionContext> {
            Ok(SessionContext {
                endpoints: vec![Url::parse("https://primary.example/").unwrap()],
                tokens: vec![AuthToken::server("srv")],
                device_id: "device-1".into(),
            })
        }
    }

    struct StaticMetadata;

    #[async_trait]
    impl MetadataClient for StaticMetadata {
        async fn fetch_technical(
            &self,
            _endpoint: &Url,
            _token: &AuthToken,
            _item_id: &str,
        ) -> StreamResult<TechnicalMetadata> {
            Ok(TechnicalMetadata {
                video_codec: "mpeg2video".into(),
                audio_codecs: vec!["aac".into()],
                container: "mkv".into(),
                part_path: Some("/library/parts/1/file.mkv".into()),
                bitrate_kbps: Some(10_000),
            })
        }
    }

    #[derive(Default)]
    struct RecordingHandle {
        paused: StdMutex<u32>,
        applied: Mutex<Vec<StreamPlan>>,
        position: StdMutex<f64>,
    }

    #[async_trait]
    impl PlaybackHandle for RecordingHandle {
        async fn pause(&self) {
            *self.paused.lock().unwrap() += 1;
        }

        async fn position_s(&self) -> f64 {
            *self.position.lock().unwrap()
        }

        async fn apply(&self, plan: StreamPlan) {
            self.applied.lock().await.push(plan);
        }
    }

    fn resolver() -> Arc<PlanResolver> {
        Arc::new(PlanResolver::new(
            Arc::new(StaticSession),
            Arc::new(StaticMetadata),
            StreamSection::default(),
        ))
    }

    async fn initial_plan(resolver: &PlanResolver) -> StreamPlan {
        resolver
            .resolve_plan("42", 30.0, &PlanOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stall_replans_from_absolute_position_with_fresh_session() {
        let resolver = resolver();
        let plan = initial_plan(&resolver).await;
        let handle = Arc::new(RecordingHandle::default());
        *handle.position.lock().unwrap() = 95.5;

        let (mut supervisor, _sender) = RecoverySupervisor::new(
            resolver,
            handle.clone(),
            None,
            RecoverySection::default(),
            &plan,
            "42",
            1800.0,
        );
        supervisor.handle_event(TelemetryEvent::Stall).await.unwrap();

        assert_eq!(*handle.paused.lock().unwrap(), 1);
        let applied = handle.applied.lock().await;
        assert_eq!(applied.len(), 1);
        let replacement = &applied[0];
        assert!((replacement.start_offset_s - 95.5).abs() < f64::EPSILON);
        assert!(replacement.session_id.starts_with("device-1-42-"));
        assert_eq!(
            replacement.negotiation.bitrate_cap_kbps,
            Some(4800),
            "first downshift lands at 60% of the 8000 default"
        );
    }

    #[tokio::test]
    async fn exhaustion_surfaces_as_fatal_error() {
        let resolver = resolver();
        let plan = initial_plan(&resolver).await;
        let handle = Arc::new(RecordingHandle::default());
        let (mut supervisor, _sender) = RecoverySupervisor::new(
            resolver,
            handle,
            None,
            RecoverySection::default(),
            &plan,
            "42",
            1800.0,
        );
        supervisor.state.forced_transcode = true;
        supervisor.state.bitrate_cap_kbps = RecoverySection::default().floor_kbps;

        let outcome = supervisor.handle_event(TelemetryEvent::Stall).await;
        assert!(matches!(
            outcome,
            Err(RecoveryError::Exhausted { cap_kbps }) if cap_kbps == 800
        ));
    }

    #[tokio::test]
    async fn dropping_the_sender_ends_the_loop_cleanly() {
        let resolver = resolver();
        let plan = initial_plan(&resolver).await;
        let handle = Arc::new(RecordingHandle::default());
        let (supervisor, sender) = RecoverySupervisor::new(
            resolver,
            handle,
            None,
            RecoverySection::default(),
            &plan,
            "42",
            1800.0,
        );
        let task = tokio::spawn(supervisor.run());
        drop(sender);
        let outcome = task.await.unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn run_loop_processes_events_from_the_channel() {
        let resolver = resolver();
        let plan = initial_plan(&resolver).await;
        let handle = Arc::new(RecordingHandle::default());
        let (supervisor, sender) = RecoverySupervisor::new(
            resolver,
            handle.clone(),
            None,
            RecoverySection::default(),
            &plan,
            "42",
            1800.0,
        );
        let task = tokio::spawn(supervisor.run());
        sender.send(TelemetryEvent::Stall).await.unwrap();
        // Give the loop a moment to process, then end playback.
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        drop(sender);
        task.await.unwrap().unwrap();
        assert_eq!(handle.applied.lock().await.len(), 1);
    }
}
