mod charge_discharge;
mod inverters;
mod registers;
mod storage_mode;
mod watch;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use solis_control::{
    api::solis::{Api, Credentials, DEFAULT_BASE_URL},
    coordinator::{Coordinator, CoordinatorSettings},
    core::{
        cid::Cid,
        inverter::{Inverter, InverterInfo},
    },
    prelude::*,
};

use self::{
    charge_discharge::ChargeDischargeArgs,
    inverters::{DetailsArgs, ListArgs, ValidateArgs},
    registers::{ReadArgs, WriteArgs},
    storage_mode::StorageModeArgs,
    watch::WatchArgs,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub async fn run(self) -> Result {
        match self.command {
            Command::List(args) => args.run().await,
            Command::Validate(args) => args.run().await,
            Command::Details(args) => args.run().await,
            Command::Read(args) => args.run().await,
            Command::Write(args) => args.run().await,
            Command::StorageMode(args) => args.run().await,
            Command::ChargeDischarge(args) => args.run().await,
            Command::Watch(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the inverters of the account.
    List(ListArgs),

    /// Check the API credentials without retrying.
    Validate(ValidateArgs),

    /// Show the inverter details and its register map.
    Details(DetailsArgs),

    /// Read raw register values.
    Read(ReadArgs),

    /// Write a raw register value.
    Write(WriteArgs),

    /// Show or change the storage mode.
    StorageMode(StorageModeArgs),

    /// Show or change a charge/discharge slot.
    ChargeDischarge(ChargeDischargeArgs),

    /// Poll the registers and print every new snapshot.
    Watch(WatchArgs),
}

#[derive(Parser)]
pub struct ApiArgs {
    #[clap(long = "api-key", env = "SOLIS_API_KEY")]
    api_key: String,

    #[clap(long = "api-secret", env = "SOLIS_API_SECRET", hide_env_values = true)]
    api_secret: String,

    #[clap(long = "base-url", env = "SOLIS_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Timeout of a single request, including the wait for a free request slot.
    #[clap(long, env = "SOLIS_REQUEST_TIMEOUT", default_value = "30s")]
    request_timeout: humantime::Duration,

    /// Maximum number of requests in flight.
    #[clap(long, env = "SOLIS_CONCURRENT_REQUESTS", default_value = "2")]
    concurrent_requests: usize,
}

impl ApiArgs {
    pub fn new_client(&self) -> Result<Api> {
        Api::builder()
            .credentials(Credentials::new(&self.api_key, &self.api_secret))
            .base_url(&self.base_url)
            .timeout(self.request_timeout.into())
            .concurrent_requests(self.concurrent_requests)
            .build()
    }
}

#[derive(Parser)]
pub struct InverterArgs {
    #[clap(flatten)]
    api: ApiArgs,

    #[clap(long, alias = "serial", env = "SOLIS_INVERTER_SN")]
    serial_number: String,
}

/// Register map and coordinator of one inverter.
pub struct Session {
    pub inverter: Inverter,
    pub coordinator: Coordinator,
}

impl InverterArgs {
    /// Fetch the inverter identity and set up its coordinator.
    pub async fn connect(&self, settings: CoordinatorSettings) -> Result<Session> {
        let api = Arc::new(self.api.new_client()?);
        let info = InverterInfo::fetch(&api, &self.serial_number)
            .await
            .context("failed to fetch the inverter details")?;
        let inverter = Inverter::new(info);
        let coordinator = Coordinator::builder()
            .registers(api)
            .serial_number(&self.serial_number)
            .batch_cids(inverter.read_batch_cids())
            .read_cids(inverter.read_cids())
            .settings(settings)
            .build();
        Ok(Session { inverter, coordinator })
    }

    /// Coordinator over exactly the given registers, without fetching the inverter details.
    pub fn coordinator(&self, batch_cids: Vec<Cid>) -> Result<Coordinator> {
        Ok(Coordinator::builder()
            .registers(Arc::new(self.api.new_client()?))
            .serial_number(&self.serial_number)
            .batch_cids(batch_cids)
            .build())
    }
}
