use clap::Parser;
use solis_control::{core::cid::Cid, prelude::*};

use crate::{cli::InverterArgs, tables::build_snapshot_table};

#[derive(Parser)]
pub struct ReadArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    /// Registers to read, more than one are read in a single batch.
    #[clap(required = true, num_args = 1..)]
    cids: Vec<Cid>,
}

impl ReadArgs {
    pub async fn run(self) -> Result {
        let coordinator = self.inverter.coordinator(self.cids.clone())?;
        if let [cid] = self.cids.as_slice() {
            let value = coordinator.read(*cid).await?;
            info!(%cid, %value, "gotcha");
            println!("{value}");
        } else {
            let snapshot = coordinator.update_data().await?;
            println!("{}", build_snapshot_table(&snapshot));
        }
        Ok(())
    }
}

#[derive(Parser)]
pub struct WriteArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    cid: Cid,

    value: String,

    /// Previous value hint, by default the current value is read first.
    #[clap(long)]
    old_value: Option<String>,

    /// Do not read the value back, only refresh afterwards. For momentary commands like on/off.
    #[clap(long)]
    no_check: bool,
}

impl WriteArgs {
    pub async fn run(self) -> Result {
        let coordinator = self.inverter.coordinator(vec![self.cid])?;
        let old_value = match self.old_value {
            Some(old_value) => old_value,
            None => coordinator.read(self.cid).await.context("failed to read the current value")?,
        };
        info!(cid = %self.cid, %old_value, value = %self.value, "writing…");
        if self.no_check {
            coordinator.control_no_check(self.cid, &self.value, Some(&old_value)).await?;
            ensure!(!coordinator.is_stale(), "written, but failed to refresh the register");
            println!("{}", build_snapshot_table(&coordinator.snapshot()));
        } else {
            coordinator.control(self.cid, &self.value, Some(&old_value)).await?;
            info!("verified");
        }
        Ok(())
    }
}
