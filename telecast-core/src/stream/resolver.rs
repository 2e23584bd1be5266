use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::StreamSection;

use super::codec::assess_compatibility;
use super::error::{StreamError, StreamResult};
use super::models::{
    AuthToken, DeliveryMode, Negotiation, PlanOptions, SessionContext, StreamPlan,
    TechnicalMetadata,
};
use super::session::{MetadataClient, SessionProvider};

/// Turns (item, offset, intent) into a concrete playable plan, walking
/// endpoint and token candidates until one works.
///
/// Fallback order: on an auth rejection the next token is tried against
/// the same endpoint; on any other failure the next endpoint is tried with
/// the full token order. The first endpoint that produces a plan is
/// promoted to primary for the rest of the session.
pub struct PlanResolver {
    session: Arc<dyn SessionProvider>,
    metadata: Arc<dyn MetadataClient>,
    config: StreamSection,
    preferred_endpoint: Mutex<Option<Url>>,
}

impl PlanResolver {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        metadata: Arc<dyn MetadataClient>,
        config: StreamSection,
    ) -> Self {
        Self {
            session,
            metadata,
            config,
            preferred_endpoint: Mutex::new(None),
        }
    }

    pub async fn resolve_plan(
        &self,
        item_id: &str,
        start_offset_s: f64,
        options: &PlanOptions,
    ) -> StreamResult<StreamPlan> {
        let context = self.session.current().await?;
        if context.endpoints.is_empty() || context.tokens.is_empty() {
            return Err(StreamError::NoCandidates);
        }
        let endpoints = self.ordered_endpoints(&context).await;

        let mut last_error: Option<StreamError> = None;
        'endpoints: for endpoint in &endpoints {
            for token in &context.tokens {
                match self
                    .metadata
                    .fetch_technical(endpoint, token, item_id)
                    .await
                {
                    Ok(meta) => {
                        let plan = self.build_plan(
                            endpoint,
                            token,
                            &context,
                            item_id,
                            start_offset_s,
                            options,
                            &meta,
                        )?;
                        self.promote(endpoint).await;
                        info!(
                            target: "stream.resolver",
                            item = item_id,
                            mode = %plan.mode,
                            endpoint = %endpoint,
                            reason = %plan.reason,
                            "stream plan resolved"
                        );
                        return Ok(plan);
                    }
                    Err(err) if err.is_unauthorized() => {
                        debug!(
                            target: "stream.resolver",
                            endpoint = %endpoint,
                            token = ?token.class,
                            "token rejected, rotating"
                        );
                        last_error = Some(err);
                        // Next token, same endpoint.
                    }
                    Err(err) => {
                        warn!(
                            target: "stream.resolver",
                            endpoint = %endpoint,
                            error = %err,
                            "endpoint failed, trying next"
                        );
                        last_error = Some(err);
                        continue 'endpoints;
                    }
                }
            }
        }
        Err(last_error.unwrap_or(StreamError::NoCandidates))
    }

    async fn ordered_endpoints(&self, context: &SessionContext) -> Vec<Url> {
        let preferred = self.preferred_endpoint.lock().await.clone();
        let mut endpoints = context.endpoints.clone();
        if let Some(preferred) = preferred {
            if let Some(position) = endpoints.iter().position(|url| *url == preferred) {
                let promoted = endpoints.remove(position);
                endpoints.insert(0, promoted);
            }
        }
        endpoints
    }

    async fn promote(&self, endpoint: &Url) {
        let mut preferred = self.preferred_endpoint.lock().await;
        if preferred.as_ref() != Some(endpoint) {
            debug!(target: "stream.resolver", endpoint = %endpoint, "endpoint promoted to primary");
            *preferred = Some(endpoint.clone());
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_plan(
        &self,
        endpoint: &Url,
        token: &AuthToken,
        context: &SessionContext,
        item_id: &str,
        start_offset_s: f64,
        options: &PlanOptions,
        meta: &TechnicalMetadata,
    ) -> StreamResult<StreamPlan> {
        let verdict = assess_compatibility(meta, &self.config);
        let session_id = session_identifier(&context.device_id, item_id, options.fresh_session);

        let passthrough = options.prefer_passthrough
            && !options.force_transcode
            && !options.force_remux
            && verdict.passthrough_eligible();
        if passthrough {
            let part = meta
                .part_path
                .as_deref()
                .ok_or_else(|| StreamError::MissingPart(item_id.to_string()))?;
            let mut url = endpoint.join(part)?;
            url.query_pairs_mut()
                .append_pair("token", &token.secret);
            return Ok(StreamPlan {
                mode: DeliveryMode::DirectPlay,
                url,
                start_offset_s,
                reason: verdict.reason,
                token_class: token.class,
                endpoint: endpoint.clone(),
                options: options.clone(),
                negotiation: Negotiation {
                    direct_play: true,
                    direct_stream: false,
                    bitrate_cap_kbps: None,
                },
                session_id,
            });
        }

        // Adaptive delivery: stream copy when a remux was requested and the
        // container tolerates it, otherwise a real transcode with a capped
        // bitrate and target codecs.
        let stream_copy =
            options.force_remux && verdict.container_ok && !options.force_transcode;
        let mut url = endpoint.join(&self.config.transcode_path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("path", &format!("/library/metadata/{item_id}"));
            query.append_pair("session", &session_id);
            query.append_pair("offset", &format!("{start_offset_s:.3}"));
            query.append_pair("protocol", "hls");
            query.append_pair("token", &token.secret);
            if stream_copy {
                query.append_pair("directStream", "1");
            } else {
                query.append_pair("directStream", "0");
                query.append_pair("videoCodec", &self.config.transcode_video_codec);
                query.append_pair("audioCodec", &self.config.transcode_audio_codec);
            }
        }
        let bitrate_cap = if stream_copy {
            None
        } else {
            let cap = options
                .max_bitrate_kbps
                .unwrap_or(self.config.default_bitrate_kbps);
            url.query_pairs_mut()
                .append_pair("maxVideoBitrate", &cap.to_string());
            Some(cap)
        };

        let reason = if stream_copy {
            format!("stream copy: {}", verdict.reason)
        } else if options.force_transcode {
            "forced transcode after playback degradation".to_string()
        } else {
            format!("transcode: {}", verdict.reason)
        };

        Ok(StreamPlan {
            mode: DeliveryMode::AdaptiveStream,
            url,
            start_offset_s,
            reason,
            token_class: token.class,
            endpoint: endpoint.clone(),
            options: options.clone(),
            negotiation: Negotiation {
                direct_play: false,
                direct_stream: stream_copy,
                bitrate_cap_kbps: bitrate_cap,
            },
            session_id,
        })
    }
}

/// Session identifier scoped to device and item. The timestamp suffix
/// forces the server to spin up a brand-new transcoder session when
/// recovering from a wedged one.
fn session_identifier(device_id: &str, item_id: &str, fresh: bool) -> String {
    if fresh {
        format!("{device_id}-{item_id}-{}", Utc::now().timestamp())
    } else {
        format!("{device_id}-{item_id}")
    }
}
