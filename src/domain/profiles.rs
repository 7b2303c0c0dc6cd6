//! Device Profile Registry
//!
//! Maps advertised BLE local names to controller families and each family to
//! its notification packet layout.
//!
//! # Packet layouts
//!
//! ```text
//! IIDX / SDVX (5 bytes)
//! [0] : turntable (IIDX) / VOL-L (SDVX), unsigned, wraps 255 <-> 0
//! [1] : unused (IIDX) / VOL-R (SDVX)
//! [2] : buttons, low byte   (IIDX 1-7, SDVX BT-A..D, FX-L, FX-R)
//! [3] : buttons, high byte  (IIDX E1/E2, SDVX Start)
//! [4] : frame counter, unsigned, wraps
//!
//! pop'n / GITADORA (6 bytes)
//! [0] : buttons, low byte
//! [1] : buttons, high byte
//! [2] : axis X
//! [3] : axis Y
//! [4] : axis Z
//! [5] : frame counter
//! ```

use crate::domain::models::DeviceType;
use serde::{Deserialize, Serialize};

pub const IIDX_DEVICE_NAME: &str = "IIDX Entry model";
pub const SDVX_DEVICE_NAME: &str = "SDVX Entry Model";
pub const POPN_DEVICE_NAME: &str = "POPN Entry Model";
pub const GITADORA_DEVICE_NAME: &str = "GITADORA Entry Model";

/// Byte positions of each field within one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    pub packet_length: usize,
    pub axis_x: usize,
    pub axis_y: usize,
    pub axis_z: Option<usize>,
    pub buttons_low: usize,
    pub buttons_high: usize,
    pub frame_counter: usize,
}

const ROTARY_LAYOUT: PacketLayout = PacketLayout {
    packet_length: 5,
    axis_x: 0,
    axis_y: 1,
    axis_z: None,
    buttons_low: 2,
    buttons_high: 3,
    frame_counter: 4,
};

const PAD_LAYOUT: PacketLayout = PacketLayout {
    packet_length: 6,
    axis_x: 2,
    axis_y: 3,
    axis_z: Some(4),
    buttons_low: 0,
    buttons_high: 1,
    frame_counter: 5,
};

/// Packet layout of a device type. `Unknown` has none.
pub fn layout_for(device_type: DeviceType) -> Option<PacketLayout> {
    match device_type {
        DeviceType::Iidx | DeviceType::Sdvx => Some(ROTARY_LAYOUT),
        DeviceType::PopN | DeviceType::GitadoraGuitar => Some(PAD_LAYOUT),
        DeviceType::Unknown => None,
    }
}

/// Advertised local names accepted for each controller family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNames {
    #[serde(default = "default_iidx")]
    pub iidx: String,
    #[serde(default = "default_sdvx")]
    pub sdvx: String,
    #[serde(default = "default_popn")]
    pub popn: String,
    #[serde(default = "default_gitadora")]
    pub gitadora: String,
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self {
            iidx: default_iidx(),
            sdvx: default_sdvx(),
            popn: default_popn(),
            gitadora: default_gitadora(),
        }
    }
}

impl DeviceNames {
    /// All names paired with the family they identify.
    pub fn entries(&self) -> [(&str, DeviceType); 4] {
        [
            (self.iidx.as_str(), DeviceType::Iidx),
            (self.sdvx.as_str(), DeviceType::Sdvx),
            (self.popn.as_str(), DeviceType::PopN),
            (self.gitadora.as_str(), DeviceType::GitadoraGuitar),
        ]
    }
}

fn default_iidx() -> String {
    IIDX_DEVICE_NAME.to_string()
}
fn default_sdvx() -> String {
    SDVX_DEVICE_NAME.to_string()
}
fn default_popn() -> String {
    POPN_DEVICE_NAME.to_string()
}
fn default_gitadora() -> String {
    GITADORA_DEVICE_NAME.to_string()
}

/// Classifies advertisements by exact local-name match.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    names: DeviceNames,
}

impl DeviceRegistry {
    pub fn new(names: DeviceNames) -> Self {
        Self { names }
    }

    /// Exact, case-sensitive match. Anything else is `Unknown`.
    pub fn classify(&self, advertised_name: &str) -> DeviceType {
        self.names
            .entries()
            .into_iter()
            .find(|(name, _)| *name == advertised_name)
            .map(|(_, device_type)| device_type)
            .unwrap_or(DeviceType::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_names() {
        let registry = DeviceRegistry::default();
        assert_eq!(registry.classify("IIDX Entry model"), DeviceType::Iidx);
        assert_eq!(registry.classify("SDVX Entry Model"), DeviceType::Sdvx);
        assert_eq!(registry.classify(POPN_DEVICE_NAME), DeviceType::PopN);
        assert_eq!(
            registry.classify(GITADORA_DEVICE_NAME),
            DeviceType::GitadoraGuitar
        );
    }

    #[test]
    fn test_classify_is_exact() {
        let registry = DeviceRegistry::default();
        assert_eq!(registry.classify("IIDX Entry Model"), DeviceType::Unknown);
        assert_eq!(registry.classify("SDVX Entry Model "), DeviceType::Unknown);
        assert_eq!(registry.classify(""), DeviceType::Unknown);
    }

    #[test]
    fn test_classify_custom_names() {
        let registry = DeviceRegistry::new(DeviceNames {
            sdvx: "My Knobs".to_string(),
            ..DeviceNames::default()
        });
        assert_eq!(registry.classify("My Knobs"), DeviceType::Sdvx);
        assert_eq!(registry.classify(SDVX_DEVICE_NAME), DeviceType::Unknown);
    }

    #[test]
    fn test_layouts() {
        assert_eq!(layout_for(DeviceType::Iidx).map(|l| l.packet_length), Some(5));
        assert_eq!(layout_for(DeviceType::Sdvx).map(|l| l.packet_length), Some(5));
        assert_eq!(layout_for(DeviceType::PopN).map(|l| l.packet_length), Some(6));
        assert_eq!(
            layout_for(DeviceType::GitadoraGuitar).map(|l| l.packet_length),
            Some(6)
        );
        assert!(layout_for(DeviceType::Unknown).is_none());
    }

    #[test]
    fn test_layout_offsets_fit_packet() {
        for layout in [ROTARY_LAYOUT, PAD_LAYOUT] {
            let offsets = [
                Some(layout.axis_x),
                Some(layout.axis_y),
                layout.axis_z,
                Some(layout.buttons_low),
                Some(layout.buttons_high),
                Some(layout.frame_counter),
            ];
            for offset in offsets.into_iter().flatten() {
                assert!(offset < layout.packet_length);
            }
        }
    }
}
