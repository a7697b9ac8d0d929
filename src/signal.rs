use serde::{Deserialize, Serialize};

/// Light object identifier, as used in the OCO `Identifier` byte.
pub type LightId = u8;

pub const LIGHT_RED: u8 = 0x01;
pub const LIGHT_AMBER: u8 = 0x02;
pub const LIGHT_GREEN: u8 = 0x08;

/// Abstract signal color, independent of how the simulator encodes bulbs.
///
/// The transitioning variants are the warning phases: `StopTransitioning`
/// is amber alone (about to stop), `GoTransitioning` is red plus amber
/// (about to go).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalColor {
    #[serde(alias = "OFF__", alias = "OFF______")]
    Off,
    #[default]
    #[serde(alias = "STOP_", alias = "STOP_____")]
    Stop,
    #[serde(alias = "GO___", alias = "GO_______")]
    Go,
    #[serde(alias = "STOP*", alias = "STOP_WAIT")]
    StopTransitioning,
    #[serde(alias = "GO*", alias = "GO*__", alias = "GO_WAIT", alias = "GO_WAIT__")]
    GoTransitioning,
}

/// Bulb bitmask sent to the simulator. Bits combine independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LightBits(u8);

impl LightBits {
    pub const OFF: Self = Self(0);
    pub const RED: Self = Self(LIGHT_RED);
    pub const AMBER: Self = Self(LIGHT_AMBER);
    pub const GREEN: Self = Self(LIGHT_GREEN);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for LightBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Maps a logical color to the simulator's bulb bits.
pub const fn encode(color: LogicalColor) -> LightBits {
    match color {
        LogicalColor::Off => LightBits::OFF,
        LogicalColor::Stop => LightBits::RED,
        LogicalColor::Go => LightBits::GREEN,
        LogicalColor::StopTransitioning => LightBits::AMBER,
        LogicalColor::GoTransitioning => LightBits::RED.union(LightBits::AMBER),
    }
}

impl LogicalColor {
    pub const fn bits(self) -> LightBits {
        encode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_steady_colors() {
        assert_eq!(encode(LogicalColor::Off).raw(), 0);
        assert_eq!(encode(LogicalColor::Stop).raw(), LIGHT_RED);
        assert_eq!(encode(LogicalColor::Go).raw(), LIGHT_GREEN);
    }

    #[test]
    fn test_encode_transitioning_colors() {
        // pre-stop is amber alone, pre-go is red + amber
        let pre_stop = encode(LogicalColor::StopTransitioning);
        assert!(pre_stop.contains(LightBits::AMBER));
        assert!(!pre_stop.contains(LightBits::RED));
        assert!(!pre_stop.contains(LightBits::GREEN));

        let pre_go = encode(LogicalColor::GoTransitioning);
        assert_eq!(pre_go, LightBits::RED | LightBits::AMBER);
        assert!(!pre_go.contains(LightBits::GREEN));
    }

    #[test]
    fn test_default_color_is_stop() {
        assert_eq!(LogicalColor::default(), LogicalColor::Stop);
    }

    #[test]
    fn test_color_names_and_aliases() {
        let canonical: Vec<LogicalColor> =
            serde_json::from_str(r#"["OFF","STOP","GO","STOP_TRANSITIONING","GO_TRANSITIONING"]"#).unwrap();
        let padded: Vec<LogicalColor> =
            serde_json::from_str(r#"["OFF__","STOP_","GO___","STOP*","GO*__"]"#).unwrap();
        let wide: Vec<LogicalColor> =
            serde_json::from_str(r#"["OFF______","STOP_____","GO_______","STOP_WAIT","GO_WAIT__"]"#).unwrap();

        assert_eq!(canonical, padded);
        assert_eq!(canonical, wide);
        assert_eq!(canonical[3], LogicalColor::StopTransitioning);
    }

    #[test]
    fn test_unknown_color_rejected() {
        assert!(serde_json::from_str::<LogicalColor>(r#""PURPLE""#).is_err());
    }
}
