// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Audio-graph probe
//!
//! Plays a near-silent tone through an analyser and reads back the output
//! node's properties. The graph is built once and kept for later passes.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::Probe;
use crate::detection::{DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::{AudioBackend, AudioGraph, AudioOutputInfo};

const HIGH_SAMPLE_RATE: f32 = 44100.0;
const LOW_LATENCY_SECS: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.8;

pub struct AudioContextProbe {
    audio: Option<Arc<dyn AudioBackend>>,
    timeout: Duration,
    settle: Duration,
    gain: f32,
    graph: Mutex<Option<Box<dyn AudioGraph>>>,
}

impl AudioContextProbe {
    pub fn new(
        audio: Option<Arc<dyn AudioBackend>>,
        timeout: Duration,
        settle: Duration,
        gain: f32,
    ) -> Self {
        Self {
            audio,
            timeout,
            settle,
            gain,
            graph: Mutex::new(None),
        }
    }
}

/// Silences the graph when dropped, including on a timed-out pass
struct ProbeTone<'a>(&'a mut Box<dyn AudioGraph>);

impl Drop for ProbeTone<'_> {
    fn drop(&mut self) {
        self.0.stop_probe_tone();
    }
}

pub fn score_output(info: &AudioOutputInfo, signal_present: bool) -> f64 {
    let mut confidence: f64 = 0.0;
    if info.sample_rate >= HIGH_SAMPLE_RATE {
        confidence += 0.2;
    }
    if info.max_channel_count >= 2 {
        confidence += 0.2;
    }
    if info.output_latency.map_or(false, |l| l < LOW_LATENCY_SECS) {
        confidence += 0.1;
    }
    if signal_present {
        confidence += 0.2;
    }
    confidence.min(MAX_CONFIDENCE)
}

#[async_trait]
impl Probe for AudioContextProbe {
    fn name(&self) -> &'static str {
        "audio-context-probe"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let audio = self
            .audio
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("audio graph"))?;

        let mut slot = self.graph.lock().await;
        if slot.as_ref().map_or(true, |g| g.is_closed()) {
            debug!("Building audio probe graph");
            *slot = Some(audio.create_graph().await?);
        }
        let Some(graph) = slot.as_mut() else {
            return Err(DetectionError::unavailable("audio graph"));
        };

        let info = graph.output_info();
        graph.start_probe_tone(self.gain)?;
        let mut tone = ProbeTone(graph);
        tokio::time::sleep(self.settle).await;
        let bins = tone.0.frequency_data();
        drop(tone);

        let signal_present = bins.iter().any(|&b| b > 0);
        let confidence = score_output(&info, signal_present);
        let device_type = if confidence > 0.8 {
            DeviceType::Wired
        } else {
            DeviceType::None
        };

        Ok(DeviceStatus::new(confidence > 0.6, device_type, "Audio Output", confidence)
            .with_metadata("sampleRate", info.sample_rate)
            .with_metadata("channels", info.max_channel_count)
            .with_metadata("signalPresent", signal_present))
    }
}
