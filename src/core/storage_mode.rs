use std::fmt::{Display, Formatter};

use enumset::{EnumSet, EnumSetType, enum_set};

/// Bit positions of the storage mode register.
#[derive(Debug, EnumSetType)]
#[enumset(repr = "u32")]
pub enum Flag {
    SelfUse = 0,
    TimeOfUse = 1,
    OffGrid = 2,
    BatteryReserve = 4,
    GridCharging = 5,
    FeedInPriority = 6,
    PeakShaving = 11,
}

/// At most one of these is set at a time.
const EXCLUSIVE_MODES: EnumSet<Flag> =
    enum_set!(Flag::SelfUse | Flag::FeedInPriority | Flag::OffGrid | Flag::PeakShaving);

/// The mutually exclusive part of the storage mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Mode {
    SelfUse,
    FeedInPriority,
    OffGrid,
    PeakShaving,
}

impl Mode {
    const fn flag(self) -> Flag {
        match self {
            Self::SelfUse => Flag::SelfUse,
            Self::FeedInPriority => Flag::FeedInPriority,
            Self::OffGrid => Flag::OffGrid,
            Self::PeakShaving => Flag::PeakShaving,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfUse => write!(f, "Self-use"),
            Self::FeedInPriority => write!(f, "Feed-in priority"),
            Self::OffGrid => write!(f, "Off-grid"),
            Self::PeakShaving => write!(f, "Peak shaving"),
        }
    }
}

/// Storage mode register: a mode selector plus independent toggles.
///
/// Bits this type does not know about are carried through untouched.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StorageMode(u32);

impl StorageMode {
    /// Parse the raw register value, `None` if it is not an integer.
    pub fn decode(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Self)
    }

    #[must_use]
    pub fn encode(&self) -> String {
        self.0.to_string()
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Known flags which are currently set.
    #[must_use]
    pub fn flags(self) -> EnumSet<Flag> {
        EnumSet::from_repr_truncated(self.0)
    }

    #[must_use]
    pub fn contains(self, flag: Flag) -> bool {
        self.flags().contains(flag)
    }

    /// The selected mode, `None` if none or several of the exclusive bits are set.
    #[must_use]
    pub fn mode(self) -> Option<Mode> {
        let modes = self.flags() & EXCLUSIVE_MODES;
        [Mode::SelfUse, Mode::FeedInPriority, Mode::OffGrid, Mode::PeakShaving]
            .into_iter()
            .find(|mode| modes == EnumSet::only(mode.flag()))
    }

    /// Select the mode, clearing the other exclusive bits.
    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        self.0 = (self.0 & !EXCLUSIVE_MODES.as_repr()) | EnumSet::only(mode.flag()).as_repr();
        self
    }

    fn set(&mut self, flag: Flag, is_enabled: bool) -> &mut Self {
        let bit = EnumSet::only(flag).as_repr();
        if is_enabled {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
        self
    }

    #[must_use]
    pub fn is_self_use(self) -> bool {
        self.contains(Flag::SelfUse)
    }

    #[must_use]
    pub fn is_feed_in_priority(self) -> bool {
        self.contains(Flag::FeedInPriority)
    }

    #[must_use]
    pub fn is_off_grid(self) -> bool {
        self.contains(Flag::OffGrid)
    }

    #[must_use]
    pub fn is_peak_shaving(self) -> bool {
        self.contains(Flag::PeakShaving)
    }

    #[must_use]
    pub fn is_battery_reserve_enabled(self) -> bool {
        self.contains(Flag::BatteryReserve)
    }

    #[must_use]
    pub fn is_grid_charging_allowed(self) -> bool {
        self.contains(Flag::GridCharging)
    }

    #[must_use]
    pub fn is_time_of_use_enabled(self) -> bool {
        self.contains(Flag::TimeOfUse)
    }

    pub fn set_self_use(&mut self) -> &mut Self {
        self.set_mode(Mode::SelfUse)
    }

    pub fn set_feed_in_priority(&mut self) -> &mut Self {
        self.set_mode(Mode::FeedInPriority)
    }

    pub fn set_off_grid(&mut self) -> &mut Self {
        self.set_mode(Mode::OffGrid)
    }

    pub fn set_peak_shaving(&mut self) -> &mut Self {
        self.set_mode(Mode::PeakShaving)
    }

    pub fn set_battery_reserve(&mut self, is_enabled: bool) -> &mut Self {
        self.set(Flag::BatteryReserve, is_enabled)
    }

    pub fn enable_battery_reserve(&mut self) -> &mut Self {
        self.set_battery_reserve(true)
    }

    pub fn disable_battery_reserve(&mut self) -> &mut Self {
        self.set_battery_reserve(false)
    }

    pub fn set_grid_charging(&mut self, is_allowed: bool) -> &mut Self {
        self.set(Flag::GridCharging, is_allowed)
    }

    pub fn enable_grid_charging(&mut self) -> &mut Self {
        self.set_grid_charging(true)
    }

    pub fn disable_grid_charging(&mut self) -> &mut Self {
        self.set_grid_charging(false)
    }

    pub fn set_time_of_use(&mut self, is_enabled: bool) -> &mut Self {
        self.set(Flag::TimeOfUse, is_enabled)
    }

    pub fn enable_time_of_use(&mut self) -> &mut Self {
        self.set_time_of_use(true)
    }

    pub fn disable_time_of_use(&mut self) -> &mut Self {
        self.set_time_of_use(false)
    }
}

impl Display for StorageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
