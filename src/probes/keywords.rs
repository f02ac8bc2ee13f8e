// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Device-label keyword scoring
//!
//! A label scores as its strongest positive keyword plus every negative
//! keyword it contains, so "HDMI Display Audio" goes well below zero while
//! "Sony Bluetooth Headphones" saturates. Callers clamp the final value.

use crate::detection::DeviceType;

/// (keyword, score, type hint). `DeviceType::None` means "no hint".
pub const LABEL_KEYWORDS: &[(&str, f64, DeviceType)] = &[
    ("airpods", 0.98, DeviceType::Bluetooth),
    ("beats", 0.95, DeviceType::Bluetooth),
    ("bose", 0.92, DeviceType::Bluetooth),
    ("headphone", 0.9, DeviceType::Wired),
    ("headset", 0.9, DeviceType::Wired),
    ("earbud", 0.88, DeviceType::Bluetooth),
    ("earphone", 0.88, DeviceType::Wired),
    ("buds", 0.85, DeviceType::Bluetooth),
    ("jabra", 0.85, DeviceType::Bluetooth),
    ("sennheiser", 0.85, DeviceType::None),
    ("sony", 0.8, DeviceType::None),
    ("plantronics", 0.8, DeviceType::None),
    ("bluetooth", 0.85, DeviceType::Bluetooth),
    ("a2dp", 0.85, DeviceType::Bluetooth),
    ("hands-free", 0.75, DeviceType::Bluetooth),
    ("wireless", 0.8, DeviceType::Bluetooth),
    ("headphone jack", 0.9, DeviceType::Wired),
    ("line out", 0.5, DeviceType::Wired),
    ("usb audio", 0.5, DeviceType::Wired),
    ("external", 0.4, DeviceType::None),
    ("speaker", -0.5, DeviceType::None),
    ("built-in", -0.6, DeviceType::None),
    ("internal", -0.6, DeviceType::None),
    ("display", -0.5, DeviceType::None),
    ("monitor", -0.4, DeviceType::None),
    ("hdmi", -1.0, DeviceType::None),
    ("displayport", -1.0, DeviceType::None),
];

/// Keyword evaluation of a single label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelScore {
    /// Unclamped; may be negative
    pub score: f64,
    pub device_type: DeviceType,
    pub matched: usize,
}

pub fn score_label(label: &str) -> LabelScore {
    let lower = label.to_lowercase();

    let mut best_positive: Option<(f64, DeviceType)> = None;
    let mut penalty = 0.0;
    let mut bluetooth_hint = false;
    let mut matched = 0;

    for &(keyword, score, hint) in LABEL_KEYWORDS {
        if !lower.contains(keyword) {
            continue;
        }
        matched += 1;
        if hint == DeviceType::Bluetooth {
            bluetooth_hint = true;
        }
        if score < 0.0 {
            penalty += score;
        } else if best_positive.map_or(true, |(best, _)| score > best) {
            best_positive = Some((score, hint));
        }
    }

    let device_type = match best_positive {
        None => DeviceType::None,
        Some(_) if bluetooth_hint => DeviceType::Bluetooth,
        // A brand or generic match without a transport hint is most often a cable
        Some((_, DeviceType::None)) => DeviceType::Wired,
        Some((_, hint)) => hint,
    };

    LabelScore {
        score: best_positive.map_or(0.0, |(s, _)| s) + penalty,
        device_type,
        matched,
    }
}
