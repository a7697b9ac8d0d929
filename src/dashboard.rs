use serde::{Deserialize, Serialize};

/// Player id (PLID) of the car a telemetry sample belongs to.
pub type VehicleId = u8;

/// Dashboard light bitmask as reported in the OutGauge `ShowLights` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DashLights(u32);

impl DashLights {
    pub const SHIFT: u32 = 0x0001;
    pub const FULL_BEAM: u32 = 0x0002;
    pub const HANDBRAKE: u32 = 0x0004;
    pub const PIT_SPEED: u32 = 0x0008;
    pub const TC: u32 = 0x0010;
    pub const SIGNAL_L: u32 = 0x0020;
    pub const SIGNAL_R: u32 = 0x0040;
    pub const SIGNAL_ANY: u32 = 0x0080;
    pub const OIL_WARN: u32 = 0x0100;
    pub const BATTERY: u32 = 0x0200;
    pub const ABS: u32 = 0x0400;

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_set(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub const fn left(self) -> bool {
        self.is_set(Self::SIGNAL_L)
    }

    pub const fn right(self) -> bool {
        self.is_set(Self::SIGNAL_R)
    }

    /// Both indicator lamps lit: hazards, or both blinkers mid-switch.
    pub const fn both(self) -> bool {
        self.left() && self.right()
    }
}

impl From<u32> for DashLights {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// One telemetry sample for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub vehicle: VehicleId,
    pub lights: DashLights,
}

impl TelemetrySample {
    pub const fn new(vehicle: VehicleId, lights: u32) -> Self {
        Self {
            vehicle,
            lights: DashLights::new(lights),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_bits() {
        let left = DashLights::new(DashLights::SIGNAL_L | DashLights::HANDBRAKE);
        assert!(left.left());
        assert!(!left.right());
        assert!(!left.both());

        let hazards = DashLights::new(DashLights::SIGNAL_L | DashLights::SIGNAL_R);
        assert!(hazards.both());
    }

    #[test]
    fn test_unrelated_bits_are_not_indicators() {
        let lights = DashLights::new(DashLights::SIGNAL_ANY | DashLights::FULL_BEAM);
        assert!(!lights.left());
        assert!(!lights.right());
    }
}
