use clap::Parser;
use solis_control::{coordinator::CoordinatorSettings, prelude::*, retry::RetryPolicy};

use crate::{
    cli::{ApiArgs, InverterArgs},
    tables::{build_inverter_list_table, build_inverter_table},
};

#[derive(Parser)]
pub struct ListArgs {
    #[clap(flatten)]
    api: ApiArgs,
}

impl ListArgs {
    pub async fn run(self) -> Result {
        let api = self.api.new_client()?;
        let records = api.inverter_list(api.retry_policy()).await.context("failed to list the inverters")?;
        info!(n_inverters = records.len(), "gotcha");
        println!("{}", build_inverter_list_table(&records));
        Ok(())
    }
}

#[derive(Parser)]
pub struct ValidateArgs {
    #[clap(flatten)]
    api: ApiArgs,
}

impl ValidateArgs {
    pub async fn run(self) -> Result {
        let records = self
            .api
            .new_client()?
            .inverter_list(&RetryPolicy::none())
            .await
            .context("the credentials are rejected or the API is unreachable")?;
        info!(n_inverters = records.len(), "the credentials are valid");
        Ok(())
    }
}

#[derive(Parser)]
pub struct DetailsArgs {
    #[clap(flatten)]
    inverter: InverterArgs,
}

impl DetailsArgs {
    pub async fn run(self) -> Result {
        let session = self.inverter.connect(CoordinatorSettings::default()).await?;
        println!("{}", build_inverter_table(&session.inverter));
        Ok(())
    }
}
