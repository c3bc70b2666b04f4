use anyhow::Result;
use clap::Parser;
use lopri::alg::{DowngradeConfig, DowngradeSelector, DowngradeSelectorType};
use lopri::*;
use xxhash_rust::xxh64::xxh64;

/// Feed a one-off demand snapshot through a downgrade selector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Fraction of aggregate demand to place on LOPRI
    #[arg(short = 'f', long)]
    #[arg(value_parser = clap::value_parser!(f64))]
    lopri_frac:     f64,

    /// Selector algorithm
    #[arg(value_enum, short, long, default_value = "knapsack-solver")]
    selector:       DowngradeSelectorType,

    /// Volume signal to drive the selection
    #[arg(value_enum, long, default_value = "usage")]
    volume:         FVSource,

    /// Emit verbose selection logs
    #[arg(short, long, default_value_t = false)]
    debug:          bool,

    /// Per-child usage in bps
    #[arg(required = true)]
    usages:         Vec<i64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "downgrade=info,lopri=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Args::parse();
    set_debug_qos_selection(cli.debug);

    // Child ids are hashes of the child index, so they spread over the
    // ring the way real host ids would.
    let mut info = AggInfo::default();
    for (i, &usage) in cli.usages.iter().enumerate() {
        let child_id = xxh64(&(i as u64).to_le_bytes(), 0);
        info.parent.ewma_usage_bps += usage;
        info.parent.predicted_demand_bps += usage;
        info.children.push(FlowInfo {
            flow: FlowKey {
                host_id: child_id,
                ..Default::default()
            },
            ewma_usage_bps: usage,
            predicted_demand_bps: usage,
            ..Default::default()
        });
    }

    let mut config = DowngradeConfig::new(cli.selector);
    config.fv_source = cli.volume;
    let mut selector = DowngradeSelector::new(config);
    let lopri = selector.pick_lopri_children(&info, cli.lopri_frac);
    println!("{}", format_bitmap(&lopri));

    Ok(())
}
