use std::fmt::{Display, Formatter};

use itertools::Itertools;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid slot number {0}, must be between 1 and {max}", max = Slot::COUNT)]
    InvalidSlot(usize),

    #[error("invalid time range `{0}`, expected `HH:MM-HH:MM`")]
    InvalidTimeRange(String),
}

/// 1-based charge/discharge slot number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub struct Slot(usize);

impl Slot {
    pub const COUNT: usize = 3;

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=Self::COUNT).map(Self)
    }

    /// Index of the slot's first field for the given stride.
    const fn offset(self, stride: usize) -> usize {
        (self.0 - 1) * stride
    }
}

impl TryFrom<usize> for Slot {
    type Error = Error;

    fn try_from(number: usize) -> Result<Self, Self::Error> {
        if (1..=Self::COUNT).contains(&number) { Ok(Self(number)) } else { Err(Error::InvalidSlot(number)) }
    }
}

/// Combined charge/discharge settings register, three slots in one comma-separated string.
///
/// The variant is picked once from the field count, and every field is kept as the
/// original text so that encoding reproduces untouched fields byte for byte.
#[must_use]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChargeDischargeSettings {
    /// 18 fields per register, 6 per slot: charge current, discharge current, charge start,
    /// charge end, discharge start, discharge end.
    SplitTimes(Box<[String; 18]>),

    /// 12 fields per register, 4 per slot: charge current, discharge current, charge range,
    /// discharge range, where a range is already `HH:MM-HH:MM`.
    CombinedTimes(Box<[String; 12]>),
}

impl ChargeDischargeSettings {
    const SPLIT_STRIDE: usize = 6;
    const COMBINED_STRIDE: usize = 4;

    /// Parse the raw register value, `None` for an unrecognized field count.
    pub fn decode(raw: &str) -> Option<Self> {
        let fields = raw.split(',').map(str::to_owned).collect_vec();
        match fields.len() {
            18 => fields.try_into().ok().map(|fields| Self::SplitTimes(Box::new(fields))),
            12 => fields.try_into().ok().map(|fields| Self::CombinedTimes(Box::new(fields))),
            _ => None,
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        self.fields().join(",")
    }

    fn fields(&self) -> &[String] {
        match self {
            Self::SplitTimes(fields) => fields.as_slice(),
            Self::CombinedTimes(fields) => fields.as_slice(),
        }
    }

    fn fields_mut(&mut self) -> &mut [String] {
        match self {
            Self::SplitTimes(fields) => fields.as_mut_slice(),
            Self::CombinedTimes(fields) => fields.as_mut_slice(),
        }
    }

    const fn stride(&self) -> usize {
        match self {
            Self::SplitTimes(_) => Self::SPLIT_STRIDE,
            Self::CombinedTimes(_) => Self::COMBINED_STRIDE,
        }
    }

    fn field(&self, slot: Slot, index: usize) -> &str {
        &self.fields()[slot.offset(self.stride()) + index]
    }

    fn set_field(&mut self, slot: Slot, index: usize, value: String) {
        let offset = slot.offset(self.stride());
        self.fields_mut()[offset + index] = value;
    }

    fn current(&self, slot: Slot, index: usize) -> Option<f64> {
        self.field(slot, index).trim().parse().ok()
    }

    #[must_use]
    pub fn charge_current(&self, slot: Slot) -> Option<f64> {
        self.current(slot, 0)
    }

    #[must_use]
    pub fn discharge_current(&self, slot: Slot) -> Option<f64> {
        self.current(slot, 1)
    }

    /// Whole amperes keep one decimal place, the way the inverter app writes them.
    fn format_current(current: f64) -> String {
        if current.fract() == 0.0 { format!("{current:.1}") } else { current.to_string() }
    }

    pub fn set_charge_current(&mut self, slot: Slot, current: f64) {
        self.set_field(slot, 0, Self::format_current(current));
    }

    pub fn set_discharge_current(&mut self, slot: Slot, current: f64) {
        self.set_field(slot, 1, Self::format_current(current));
    }

    /// `index` is the position of the range among the slot's time fields: 0 for charge, 1 for discharge.
    fn time_range(&self, slot: Slot, index: usize) -> Option<String> {
        match self {
            Self::SplitTimes(_) => {
                let start = self.field(slot, 2 + 2 * index);
                let end = self.field(slot, 3 + 2 * index);
                (!start.is_empty() || !end.is_empty()).then(|| format!("{start}-{end}"))
            }
            Self::CombinedTimes(_) => {
                let range = self.field(slot, 2 + index);
                (!range.is_empty()).then(|| range.to_owned())
            }
        }
    }

    fn set_time_range(&mut self, slot: Slot, index: usize, range: &str) -> Result<(), Error> {
        match self {
            Self::SplitTimes(_) => {
                let (start, end) =
                    range.split_once('-').ok_or_else(|| Error::InvalidTimeRange(range.to_owned()))?;
                self.set_field(slot, 2 + 2 * index, start.to_owned());
                self.set_field(slot, 3 + 2 * index, end.to_owned());
            }
            Self::CombinedTimes(_) => {
                self.set_field(slot, 2 + index, range.to_owned());
            }
        }
        Ok(())
    }

    /// Charge window as `HH:MM-HH:MM`.
    #[must_use]
    pub fn charge_time_slot(&self, slot: Slot) -> Option<String> {
        self.time_range(slot, 0)
    }

    /// Discharge window as `HH:MM-HH:MM`.
    #[must_use]
    pub fn discharge_time_slot(&self, slot: Slot) -> Option<String> {
        self.time_range(slot, 1)
    }

    /// Store the charge window. The range format is not validated here, see [`crate::core::time_range::TimeRange`].
    pub fn set_charge_time_slot(&mut self, slot: Slot, range: &str) -> Result<(), Error> {
        self.set_time_range(slot, 0, range)
    }

    /// Store the discharge window. The range format is not validated here, see [`crate::core::time_range::TimeRange`].
    pub fn set_discharge_time_slot(&mut self, slot: Slot, range: &str) -> Result<(), Error> {
        self.set_time_range(slot, 1, range)
    }
}

impl Display for ChargeDischargeSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}
