// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Signal probes
//!
//! Each probe turns one platform signal into a scored [`DeviceStatus`](crate::detection::DeviceStatus).
//! The web chain runs most-authoritative first:
//!
//! | # | Probe | Timeout |
//! |---|-------|---------|
//! | 1 | enumerate-devices | 5000ms |
//! | 2 | bluetooth-availability | 3000ms |
//! | 3 | audio-context-probe | 5000ms |
//! | 4 | media-query-heuristics | 1000ms |
//! | 5 | navigator-properties | 500ms |

mod traits;
mod keywords;
mod enumerate;
mod bluetooth;
mod audio_context;
mod media_query;
mod navigator;
mod native_route;

pub use traits::Probe;
pub use keywords::{score_label, LabelScore, LABEL_KEYWORDS};
pub use enumerate::{score_device, EnumerateDevicesProbe};
pub use bluetooth::BluetoothProbe;
pub use audio_context::{score_output, AudioContextProbe};
pub use media_query::{is_mobile_user_agent, MediaQueryProbe, MEDIA_QUERIES};
pub use navigator::{score_environment, NavigatorProbe};
pub use native_route::NativeRouteProbe;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::platform::{Platform, PlatformKind};

/// Probe chain for the platform, in execution order
pub fn build_probe_chain(platform: &Platform, config: &ProbeConfig) -> Vec<Arc<dyn Probe>> {
    let ms = Duration::from_millis;
    let mut chain: Vec<Arc<dyn Probe>> = Vec::new();

    match platform.kind {
        PlatformKind::Web => {
            chain.push(Arc::new(EnumerateDevicesProbe::new(
                platform.media_devices.clone(),
                ms(config.enumerate_timeout_ms),
            )));
            chain.push(Arc::new(BluetoothProbe::new(
                platform.bluetooth.clone(),
                ms(config.bluetooth_timeout_ms),
            )));
            chain.push(Arc::new(AudioContextProbe::new(
                platform.audio.clone(),
                ms(config.audio_context_timeout_ms),
                ms(config.audio_settle_ms),
                config.probe_gain,
            )));
            chain.push(Arc::new(MediaQueryProbe::new(
                platform.environment.clone(),
                ms(config.media_query_timeout_ms),
            )));
            chain.push(Arc::new(NavigatorProbe::new(
                platform.environment.clone(),
                ms(config.navigator_timeout_ms),
            )));
        }
        PlatformKind::Native => {
            chain.push(Arc::new(NativeRouteProbe::new(
                platform.audio_route.clone(),
                ms(config.enumerate_timeout_ms),
            )));
        }
        PlatformKind::Unsupported => {}
    }

    chain
}
