use clap::Parser;
use solis_control::{coordinator::CoordinatorSettings, prelude::*};

use crate::{cli::InverterArgs, tables::build_snapshot_table};

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(long, env = "SOLIS_POLLING_INTERVAL", default_value = "5min")]
    interval: humantime::Duration,
}

impl WatchArgs {
    pub async fn run(self) -> Result {
        let settings = CoordinatorSettings::builder().update_interval(self.interval.into()).build();
        let session = self.inverter.connect(settings).await?;
        let mut receiver = session.coordinator.subscribe();
        info!(interval = %self.interval, n_registers = session.inverter.all_cids().len(), "watching…");

        let printer = async {
            while receiver.changed().await.is_ok() {
                let snapshot = receiver.borrow_and_update().clone();
                if session.coordinator.is_stale() {
                    warn!("the snapshot is stale");
                }
                println!("{}", build_snapshot_table(&snapshot));
            }
        };
        tokio::join!(session.coordinator.run(), printer);
        Ok(())
    }
}
