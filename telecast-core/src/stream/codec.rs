use crate::config::StreamSection;

use super::models::TechnicalMetadata;

/// Outcome of the passthrough compatibility check for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecVerdict {
    pub video_ok: bool,
    pub audio_ok: bool,
    pub container_ok: bool,
    pub reason: String,
}

impl CodecVerdict {
    /// Passthrough requires compatible video, at least one compatible
    /// audio track, and a container not on the unreliable list.
    pub fn passthrough_eligible(&self) -> bool {
        self.video_ok && self.audio_ok && self.container_ok
    }
}

pub fn assess_compatibility(meta: &TechnicalMetadata, config: &StreamSection) -> CodecVerdict {
    let video_codec = meta.video_codec.to_lowercase();
    let video_ok = config
        .video_passthrough_codecs
        .iter()
        .any(|codec| codec.eq_ignore_ascii_case(&video_codec));
    let audio_ok = meta.audio_codecs.iter().any(|track| {
        config
            .audio_passthrough_codecs
            .iter()
            .any(|codec| codec.eq_ignore_ascii_case(track))
    });
    let container_ok = !meta
        .container
        .eq_ignore_ascii_case(&config.unreliable_container);

    let reason = if !container_ok {
        format!("container {} unreliable for passthrough", meta.container)
    } else if !video_ok {
        format!("video codec {} outside passthrough allow-list", video_codec)
    } else if !audio_ok {
        "no audio track in passthrough allow-list".to_string()
    } else {
        "codecs compatible with passthrough".to_string()
    };

    CodecVerdict {
        video_ok,
        audio_ok,
        container_ok,
        reason,
    }
}
