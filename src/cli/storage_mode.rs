use clap::Parser;
use solis_control::{
    coordinator::CoordinatorSettings,
    core::storage_mode::{Mode, StorageMode},
    prelude::*,
};

use crate::{cli::InverterArgs, tables::build_storage_mode_table};

#[derive(Parser)]
pub struct StorageModeArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(long, value_enum)]
    mode: Option<Mode>,

    #[clap(long)]
    battery_reserve: Option<bool>,

    #[clap(long)]
    grid_charging: Option<bool>,

    #[clap(long)]
    time_of_use: Option<bool>,
}

impl StorageModeArgs {
    pub async fn run(self) -> Result {
        let session = self.inverter.connect(CoordinatorSettings::default()).await?;
        let Some(cid) = session.inverter.storage_mode else {
            bail!("the inverter has no storage mode register");
        };

        let old_value = session.coordinator.read(cid).await?;
        let Some(old_mode) = StorageMode::decode(&old_value) else {
            bail!("unexpected storage mode value `{old_value}`");
        };
        let mut new_mode = old_mode;
        if let Some(mode) = self.mode {
            new_mode.set_mode(mode);
        }
        if let Some(is_enabled) = self.battery_reserve {
            new_mode.set_battery_reserve(is_enabled);
        }
        if let Some(is_allowed) = self.grid_charging {
            new_mode.set_grid_charging(is_allowed);
        }
        if let Some(is_enabled) = self.time_of_use {
            new_mode.set_time_of_use(is_enabled);
        }

        if new_mode == old_mode {
            info!("nothing to change");
        } else {
            info!(%old_mode, %new_mode, "changing…");
            session.coordinator.control(cid, &new_mode.encode(), Some(&old_value)).await?;
        }
        println!("{}", build_storage_mode_table(new_mode));
        Ok(())
    }
}
