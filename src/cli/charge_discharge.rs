use clap::Parser;
use solis_control::{
    coordinator::CoordinatorSettings,
    core::{
        charge_discharge::{ChargeDischargeSettings, Slot},
        inverter::ChargeDischarge,
        time_range::TimeRange,
    },
    prelude::*,
};

use crate::{cli::InverterArgs, tables::build_charge_discharge_table};

#[derive(Parser)]
pub struct ChargeDischargeArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    /// Slot number, starting from 1. Required for any change.
    #[clap(long)]
    slot: Option<usize>,

    #[clap(long)]
    charge_current: Option<f64>,

    #[clap(long)]
    discharge_current: Option<f64>,

    /// For example, `02:00-05:30`.
    #[clap(long)]
    charge_time: Option<TimeRange>,

    /// For example, `17:00-21:00`.
    #[clap(long)]
    discharge_time: Option<TimeRange>,
}

impl ChargeDischargeArgs {
    const fn has_changes(&self) -> bool {
        self.charge_current.is_some()
            || self.discharge_current.is_some()
            || self.charge_time.is_some()
            || self.discharge_time.is_some()
    }

    pub async fn run(self) -> Result {
        let session = self.inverter.connect(CoordinatorSettings::default()).await?;
        let Some(ChargeDischarge::Settings(cid)) = session.inverter.charge_discharge else {
            bail!("the inverter has no combined charge/discharge settings register");
        };

        let old_value = session.coordinator.read(cid).await?;
        let Some(mut settings) = ChargeDischargeSettings::decode(&old_value) else {
            bail!("unrecognized charge/discharge settings `{old_value}`");
        };

        if self.has_changes() {
            let slot = Slot::try_from(self.slot.context("`--slot` is required to change anything")?)?;
            if let Some(current) = self.charge_current {
                settings.set_charge_current(slot, current);
            }
            if let Some(current) = self.discharge_current {
                settings.set_discharge_current(slot, current);
            }
            if let Some(range) = self.charge_time {
                settings.set_charge_time_slot(slot, &range.to_string())?;
            }
            if let Some(range) = self.discharge_time {
                settings.set_discharge_time_slot(slot, &range.to_string())?;
            }
            let new_value = settings.encode();
            if new_value == old_value {
                info!("nothing to change");
            } else {
                info!(%slot, %new_value, "changing…");
                session.coordinator.control(cid, &new_value, Some(&old_value)).await?;
            }
        }

        println!("{}", build_charge_discharge_table(&settings));
        Ok(())
    }
}
