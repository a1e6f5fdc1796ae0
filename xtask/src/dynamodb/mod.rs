//! Orders table infrastructure management commands.

mod client;
mod config;
mod deploy;
mod error;
mod planning;
mod seed;

pub use error::{DynamodbError, Result};

use dialoguer::Confirm;
use orderstore::storage::dynamodb::DynamoTableStore;
use orderstore::{TableClient, TableSchema};

use crate::prelude::*;

/// Orders table infrastructure management commands.
#[derive(Debug, clap::Parser)]
pub struct DynamodbCommand {
    #[command(subcommand)]
    pub action: DynamodbAction,
}

/// Available actions.
#[derive(Debug, clap::Subcommand)]
pub enum DynamodbAction {
    /// Deploy or destroy the orders table infrastructure.
    Deploy(DeployCommand),

    /// Seed the orders table with demo records.
    Seed(SeedCommand),
}

/// Deploy or update the orders table.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Deploy or destroy the orders table infrastructure.

By default, this command creates or updates the orders table with its
key schema (customer_id, order_id) and the status-index GSI.

The command shows a plan of changes before applying and asks for
confirmation.

Environment variables:
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials")]
pub struct DeployCommand {
    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,

    /// Destroy the table instead of creating/updating.
    #[arg(long)]
    pub destroy: bool,

    /// Table name to use.
    #[arg(long, default_value = "orders")]
    pub table_name: String,
}

/// Seed the orders table with demo records.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Generate and insert demo orders into the table.

Creates deterministic records (cus-01/ord-1 and so on) with a spread of
statuses and attributes, inserted through the orderstore client so the
seeding exercises the same code path applications use.")]
pub struct SeedCommand {
    /// Number of customer partitions to create.
    #[arg(long, default_value = "5")]
    pub customers: u32,

    /// Number of orders per customer.
    #[arg(long, default_value = "4")]
    pub orders_per_customer: u32,

    /// Table name to use.
    #[arg(long, default_value = "orders")]
    pub table_name: String,

    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,
}

/// Main entry point for the dynamodb command.
pub async fn run(command: DynamodbCommand, global: crate::Global) -> Result<()> {
    match command.action {
        DynamodbAction::Deploy(deploy_cmd) => run_deploy(deploy_cmd, &global).await,
        DynamodbAction::Seed(seed_cmd) => run_seed(seed_cmd, &global).await,
    }
}

async fn run_deploy(cmd: DeployCommand, global: &crate::Global) -> Result<()> {
    let aws_config = client::AwsConfig::default();

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), aws_config.target_display());
        aprintln!();
    }

    let dynamo_client = client::create_client(&aws_config).await?;
    let current_state = client::get_table_state(&dynamo_client, &cmd.table_name).await?;

    if cmd.destroy {
        let plan = planning::calculate_destroy_plan(current_state.as_ref(), &cmd.table_name);

        if !global.is_silent() {
            aprintln!("{}", p_y("Destroy Plan:"));
            for line in planning::format_destroy_plan(&plan) {
                aprintln!("  {}", p_r(&line));
            }
            aprintln!();
        }

        if matches!(plan, planning::DestroyPlan::AlreadyGone { .. }) {
            if !global.is_silent() {
                aprintln!("{}", p_g("Nothing to destroy."));
            }
            return Ok(());
        }

        if !cmd.force {
            let confirmed = Confirm::new()
                .with_prompt("Are you sure you want to delete this table? ALL DATA WILL BE LOST")
                .default(false)
                .interact()
                .map_err(|e| DynamodbError::Prompt(e.to_string()))?;

            if !confirmed {
                return Err(DynamodbError::UserCancelled);
            }
        }

        if !global.is_silent() {
            aprintln!("{}", p_b("Deleting table..."));
        }

        deploy::execute_destroy_plan(&dynamo_client, &plan).await?;

        if !global.is_silent() {
            aprintln!("{}", p_g("Table destroyed successfully."));
        }
    } else {
        let table_config = config::orders_table_config().with_table_name(&cmd.table_name);
        let plan = planning::calculate_deploy_plan(current_state.as_ref(), &table_config);

        if !global.is_silent() {
            aprintln!("{}", p_c("Deploy Plan:"));
            for line in planning::format_deploy_plan(&plan) {
                if line.starts_with('+') {
                    aprintln!("  {}", p_g(&line));
                } else if line.starts_with('-') {
                    aprintln!("  {}", p_r(&line));
                } else if line.starts_with('~') {
                    aprintln!("  {}", p_y(&line));
                } else {
                    aprintln!("  {}", line);
                }
            }
            aprintln!();
        }

        if matches!(plan, planning::DeployPlan::NoChanges { .. }) {
            if !global.is_silent() {
                aprintln!("{}", p_g("Infrastructure is up to date."));
            }
            return Ok(());
        }

        if !cmd.force {
            let confirmed = Confirm::new()
                .with_prompt("Apply these changes?")
                .default(true)
                .interact()
                .map_err(|e| DynamodbError::Prompt(e.to_string()))?;

            if !confirmed {
                return Err(DynamodbError::UserCancelled);
            }
        }

        if !global.is_silent() {
            aprintln!("{}", p_b("Applying changes..."));
        }

        deploy::execute_deploy_plan(&dynamo_client, &plan).await?;

        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure deployed successfully."));
        }
    }

    Ok(())
}

async fn run_seed(cmd: SeedCommand, global: &crate::Global) -> Result<()> {
    let aws_config = client::AwsConfig::default();

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), aws_config.target_display());
        aprintln!("{} {}", p_b("Table:"), cmd.table_name);
        aprintln!(
            "{} {} customers x {} orders",
            p_b("Records:"),
            cmd.customers,
            cmd.orders_per_customer
        );
        aprintln!();
    }

    let dynamo_client = client::create_client(&aws_config).await?;

    // Verify the table exists before generating anything.
    let table_state = client::get_table_state(&dynamo_client, &cmd.table_name).await?;
    if table_state.is_none() {
        return Err(DynamodbError::TableNotFound {
            table_name: cmd.table_name,
        });
    }

    let orders = seed::generate_demo_orders(cmd.customers, cmd.orders_per_customer);

    if !global.is_silent() {
        aprintln!("{}", p_c("Orders to create:"));
        for order in orders.iter().take(5) {
            aprintln!(
                "  {}/{} ({})",
                order.customer_id,
                order.order_id,
                order.status.as_deref().unwrap_or("-")
            );
        }
        if orders.len() > 5 {
            aprintln!("  ... and {} more", orders.len() - 5);
        }
        aprintln!();
    }

    if !cmd.force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Insert {} orders?", orders.len()))
            .default(true)
            .interact()
            .map_err(|e| DynamodbError::Prompt(e.to_string()))?;

        if !confirmed {
            return Err(DynamodbError::UserCancelled);
        }
    }

    let store = DynamoTableStore::new(
        dynamo_client,
        TableSchema::orders().with_table_name(&cmd.table_name),
    );
    let table_client = TableClient::new(store);
    let inserted = seed::seed_orders(&table_client, &orders).await?;

    if !global.is_silent() {
        aprintln!("{} {} orders inserted.", p_g("Success:"), inserted);
    }

    Ok(())
}
