use itertools::Itertools;

use crate::{
    api::solis::{Api, ApiError, InverterDetails},
    core::cid::Cid,
    prelude::*,
};

/// Charge/discharge scheduling mode, only read from hybrid inverters.
pub const CHARGE_DISCHARGE_MODE: Cid = Cid(6798);

/// [`CHARGE_DISCHARGE_MODE`] value which enables the six-slot "TOU v2" scheduling.
pub const TOU_V2_ENABLED: &str = "43605";

/// Identity of one inverter as reported by the detail endpoint.
#[must_use]
#[derive(Clone, Debug)]
pub struct InverterInfo {
    pub serial_number: String,
    pub details: InverterDetails,

    /// Raw [`CHARGE_DISCHARGE_MODE`] value, `None` for string inverters.
    pub tou_v2_mode: Option<String>,
}

impl InverterInfo {
    #[instrument(skip_all, fields(serial_number = serial_number))]
    pub async fn fetch(api: &Api, serial_number: &str) -> Result<Self, ApiError> {
        info!("fetching…");
        let details = api.inverter_details(serial_number, api.retry_policy()).await?;
        let mut info = Self { serial_number: serial_number.to_owned(), details, tou_v2_mode: None };
        if !info.is_string_inverter() {
            info.tou_v2_mode = Some(api.read(serial_number, CHARGE_DISCHARGE_MODE, api.retry_policy()).await?);
        }
        info!(
            model = ?info.details.model,
            machine = ?info.details.machine,
            is_string_inverter = info.is_string_inverter(),
            is_tou_v2_enabled = info.is_tou_v2_enabled(),
            "fetched",
        );
        Ok(info)
    }

    #[must_use]
    pub fn is_string_inverter(&self) -> bool {
        self.details.energy_storage_control.as_deref() == Some("0")
    }

    #[must_use]
    pub fn is_tou_v2_enabled(&self) -> bool {
        self.tou_v2_mode.as_deref() == Some(TOU_V2_ENABLED)
    }
}

/// Momentary on/off commands: writing the value to the CID triggers the action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OnOff {
    pub on_cid: Cid,
    pub off_cid: Cid,
    pub on_value: &'static str,
    pub off_value: &'static str,
}

impl OnOff {
    const fn new(on_cid: i32, off_cid: i32) -> Self {
        Self { on_cid: Cid(on_cid), off_cid: Cid(off_cid), on_value: "190", off_value: "222" }
    }
}

/// Registers of one TOU v2 slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlotCids {
    pub switch: Cid,
    pub time: Cid,
    pub current: Cid,
    pub soc: Cid,
}

impl SlotCids {
    const fn new(switch: i32, time: i32, current: i32, soc: i32) -> Self {
        Self { switch: Cid(switch), time: Cid(time), current: Cid(current), soc: Cid(soc) }
    }

    const fn cids(self) -> [Cid; 4] {
        [self.switch, self.time, self.current, self.soc]
    }
}

pub const CHARGE_SLOTS: [SlotCids; 6] = [
    SlotCids::new(5916, 5946, 5948, 5928),
    SlotCids::new(5917, 5949, 5951, 5929),
    SlotCids::new(5918, 5952, 5954, 5930),
    SlotCids::new(5919, 5955, 5957, 5931),
    SlotCids::new(5920, 5958, 5960, 5932),
    SlotCids::new(5921, 5961, 5963, 5933),
];

pub const DISCHARGE_SLOTS: [SlotCids; 6] = [
    SlotCids::new(5922, 5964, 5967, 5965),
    SlotCids::new(5923, 5968, 5971, 5969),
    SlotCids::new(5924, 5972, 5975, 5973),
    SlotCids::new(5925, 5976, 5979, 5977),
    SlotCids::new(5926, 5980, 5983, 5981),
    SlotCids::new(5927, 5987, 5986, 5984),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargeDischarge {
    /// One combined CSV register, see [`crate::core::charge_discharge::ChargeDischargeSettings`].
    Settings(Cid),

    /// Six charge and six discharge slots, each in its own registers.
    Slots { charge: [SlotCids; 6], discharge: [SlotCids; 6] },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BatteryCids {
    pub reserve_soc: Cid,
    pub over_discharge_soc: Cid,
    pub force_charge_soc: Cid,
    pub recovery_soc: Cid,
    pub max_charge_soc: Cid,
    pub max_charge_current: Cid,
    pub max_discharge_current: Cid,
}

impl Default for BatteryCids {
    fn default() -> Self {
        Self {
            reserve_soc: Cid(157),
            over_discharge_soc: Cid(158),
            force_charge_soc: Cid(160),
            recovery_soc: Cid(7229),
            max_charge_soc: Cid(7963),
            max_charge_current: Cid(7224),
            max_discharge_current: Cid(7226),
        }
    }
}

/// Register map of one inverter.
#[must_use]
#[derive(Clone, Debug)]
pub struct Inverter {
    pub info: InverterInfo,
    pub on_off: OnOff,
    pub time: Cid,
    pub power_limit: Option<Cid>,
    pub storage_mode: Option<Cid>,
    pub charge_discharge: Option<ChargeDischarge>,
    pub max_export_power: Option<Cid>,
    pub battery: Option<BatteryCids>,
}

impl Inverter {
    pub const CHARGE_DISCHARGE_SETTINGS: Cid = Cid(103);

    pub fn new(info: InverterInfo) -> Self {
        if info.is_string_inverter() { Self::string(info) } else { Self::hybrid(info) }
    }

    fn string(info: InverterInfo) -> Self {
        Self {
            info,
            on_off: OnOff::new(48, 53),
            time: Cid(18),
            power_limit: Some(Cid(15)),
            storage_mode: None,
            charge_discharge: None,
            max_export_power: None,
            battery: None,
        }
    }

    fn hybrid(info: InverterInfo) -> Self {
        let charge_discharge = if info.is_tou_v2_enabled() {
            ChargeDischarge::Slots { charge: CHARGE_SLOTS, discharge: DISCHARGE_SLOTS }
        } else {
            ChargeDischarge::Settings(Self::CHARGE_DISCHARGE_SETTINGS)
        };
        Self {
            info,
            on_off: OnOff::new(52, 54),
            time: Cid(56),
            power_limit: None,
            storage_mode: Some(Cid(636)),
            charge_discharge: Some(charge_discharge),
            max_export_power: Some(Cid(499)),
            battery: Some(BatteryCids::default()),
        }
    }

    /// Every register in the snapshot, sorted and without duplicates.
    #[must_use]
    pub fn all_cids(&self) -> Vec<Cid> {
        let mut cids = vec![self.on_off.on_cid, self.on_off.off_cid, self.time];
        cids.extend(self.power_limit);
        cids.extend(self.storage_mode);
        match self.charge_discharge {
            Some(ChargeDischarge::Settings(cid)) => cids.push(cid),
            Some(ChargeDischarge::Slots { charge, discharge }) => {
                cids.extend(charge.iter().chain(&discharge).flat_map(|slot| slot.cids()));
            }
            None => {}
        }
        cids.extend(self.max_export_power);
        if let Some(battery) = self.battery {
            cids.extend([
                battery.reserve_soc,
                battery.over_discharge_soc,
                battery.force_charge_soc,
                battery.recovery_soc,
                battery.max_charge_soc,
                battery.max_charge_current,
                battery.max_discharge_current,
            ]);
        }
        cids.into_iter().sorted().dedup().collect()
    }

    /// Registers read one by one rather than in the batch.
    #[must_use]
    pub fn read_cids(&self) -> Vec<Cid> {
        match self.charge_discharge {
            Some(ChargeDischarge::Settings(cid)) => vec![cid],
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn read_batch_cids(&self) -> Vec<Cid> {
        let read_cids = self.read_cids();
        self.all_cids().into_iter().filter(|cid| !read_cids.contains(cid)).collect()
    }
}
