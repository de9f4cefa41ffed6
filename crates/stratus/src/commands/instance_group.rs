use crate::client::{CreateParams, InstanceGroupClient, ListQuery};
use crate::output;
use clap::Args;
use colored::Colorize;

const LIST_COLUMNS: &[&str] = &[
    "id",
    "name",
    "service_type",
    "parent_id",
    "zone_id",
    "sched_strategy",
    "granularity",
];

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Service type
    #[arg(long)]
    pub service_type: Option<String>,
    /// Parent ID
    #[arg(long)]
    pub parent_id: Option<String>,
    /// Zone ID
    #[arg(long)]
    pub zone_id: Option<String>,
    /// Page size
    #[arg(long, default_value = "20")]
    pub limit: u32,
    /// Page offset
    #[arg(long)]
    pub offset: Option<u32>,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// ID or name of the instance group
    pub id: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the instance group
    pub name: String,
    /// Zone ID
    pub zone_id: String,
    /// Service type
    #[arg(long)]
    pub service_type: Option<String>,
    /// Parent ID
    #[arg(long)]
    pub parent_id: Option<String>,
    /// Scheduler strategy
    #[arg(long)]
    pub sched_strategy: Option<String>,
    /// Maximum number of guests of this group on one host
    #[arg(long)]
    pub granularity: Option<u32>,
}

pub async fn handle_list(client: &InstanceGroupClient, args: ListArgs) -> anyhow::Result<()> {
    let query = ListQuery {
        service_type: args.service_type,
        parent_id: args.parent_id,
        zone_id: args.zone_id,
        limit: Some(args.limit),
        offset: args.offset,
    };
    let result = client.list(&query).await?;
    output::print_list(&result.items, result.total, LIST_COLUMNS);
    Ok(())
}

pub async fn handle_show(client: &InstanceGroupClient, args: IdArgs) -> anyhow::Result<()> {
    let group = client.show(&args.id).await?;
    output::print_object(&group);
    Ok(())
}

pub async fn handle_create(client: &InstanceGroupClient, args: CreateArgs) -> anyhow::Result<()> {
    let params = CreateParams {
        name: args.name,
        zone_id: args.zone_id,
        service_type: args.service_type,
        parent_id: args.parent_id,
        sched_strategy: args.sched_strategy,
        granularity: args.granularity,
    };
    let group = client.create(&params).await?;
    println!("{}", format!("Created instance group {}", params.name).green());
    output::print_object(&group);
    Ok(())
}

pub async fn handle_delete(client: &InstanceGroupClient, args: IdArgs) -> anyhow::Result<()> {
    let group = client.delete(&args.id).await?;
    println!("{}", format!("Deleted instance group {}", args.id).yellow());
    output::print_object(&group);
    Ok(())
}
