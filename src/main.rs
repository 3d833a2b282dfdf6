//! valkey-topology-probe - query cluster topology from seed nodes
//!
//! Sends CLUSTER NODES to every seed (and, unless disabled, to every node the
//! seeds announce) and prints what each node reported within the budget.

use anyhow::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use valkey_topology_probe::cluster::{
    ClusterNode, ClusterNodesDecoder, Interrupt, NodeAddress, NodeReport, RawReply,
    ThreadDispatcher, TopologyFanout, TopologyViews,
};
use valkey_topology_probe::config::{CliArgs, OutputFormat, ProbeConfig};

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn latency_ms(views: &TopologyViews<RawReply>, node: &NodeAddress) -> Option<f64> {
    views
        .batch
        .request_for(node)
        .and_then(|r| r.latency())
        .map(|d| d.as_secs_f64() * 1000.0)
}

fn print_text(views: &TopologyViews<RawReply>) {
    for (node, report) in views.decode_with(&ClusterNodesDecoder) {
        let latency = latency_ms(views, &node)
            .map(|ms| format!("{:.2}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        match report {
            NodeReport::Report(nodes) => {
                let primaries = nodes.iter().filter(|n| n.is_primary()).count();
                let slots: usize = nodes.iter().map(ClusterNode::slot_count).sum();
                println!(
                    "{:<24} ok       {:>10}  nodes={} primaries={} slots={}",
                    node.to_string(),
                    latency,
                    nodes.len(),
                    primaries,
                    slots
                );
            }
            NodeReport::Failed(e) => {
                println!("{:<24} failed   {:>10}  {}", node.to_string(), latency, e)
            }
            NodeReport::NoData => println!("{:<24} no-reply {:>10}", node.to_string(), latency),
        }
    }
    println!(
        "{} of {} nodes replied, waited {:.2}ms",
        views.reported(),
        views.batch.len(),
        views.elapsed.as_secs_f64() * 1000.0
    );
}

fn print_json(views: &TopologyViews<RawReply>) -> Result<()> {
    let nodes: Vec<serde_json::Value> = views
        .decode_with(&ClusterNodesDecoder)
        .into_iter()
        .map(|(node, report)| {
            let latency = latency_ms(views, &node);
            match report {
                NodeReport::Report(nodes) => serde_json::json!({
                    "address": node.to_string(),
                    "status": "ok",
                    "latency_ms": latency,
                    "nodes": nodes.iter().map(|n| serde_json::json!({
                        "id": n.id,
                        "address": n.address.to_string(),
                        "flags": n.flags,
                        "primary_id": n.primary_id,
                        "config_epoch": n.config_epoch,
                        "connected": n.connected,
                        "slots": n.slots.iter().map(|r| [r.start, r.end]).collect::<Vec<_>>(),
                    })).collect::<Vec<_>>(),
                }),
                NodeReport::Failed(e) => serde_json::json!({
                    "address": node.to_string(),
                    "status": "failed",
                    "latency_ms": latency,
                    "error": e.to_string(),
                }),
                NodeReport::NoData => serde_json::json!({
                    "address": node.to_string(),
                    "status": "no-reply",
                }),
            }
        })
        .collect();

    let doc = serde_json::json!({
        "elapsed_ms": views.elapsed.as_secs_f64() * 1000.0,
        "replied": views.reported(),
        "views": nodes,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet);

    let config = ProbeConfig::from_cli(&args)?;
    info!(
        "Probing {} seed(s) with a {:?} budget",
        config.seeds.len(),
        config.timeout
    );

    let fanout = TopologyFanout::new(
        ThreadDispatcher::new(config.connection_factory()),
        config.fanout_config(),
    );
    let views = fanout.load_views(&config.seeds, &Interrupt::new())?;

    match config.output_format {
        OutputFormat::Text => print_text(&views),
        OutputFormat::Json => print_json(&views)?,
    }

    if views.reported() == 0 {
        anyhow::bail!("No node replied within {:?}", config.timeout);
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
