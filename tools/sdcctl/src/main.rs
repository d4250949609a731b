// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! sdcctl - discover, inspect and watch IEEE 11073 SDC providers
//!
//! # Usage
//!
//! ```bash
//! # Find providers advertising a scope on the local network
//! sdcctl discover --scope sdc.mds.pkp:1.2.3.4.5
//!
//! # Pull a provider's current MDIB and print a summary
//! sdcctl get-mdib --endpoint https://10.0.0.5:8080/GetService
//!
//! # Subscribe and print every incoming report until Ctrl+C
//! sdcctl watch --endpoint https://10.0.0.5:8080
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};

use sdc_consumer::discover::discover;
use sdc_consumer::{EventingClient, Mirror, MirrorOutcome};
use sdc_discovery::RelevancePredicate;
use sdc_transport::client::HttpClientPool;

/// The `wsa:Action` a subscribed report arrives addressed with. Mirrors
/// `sdc-provider::delivery::EPISODIC_REPORT_ACTION` as a literal rather
/// than depending on the provider crate just for this one constant.
const EPISODIC_REPORT_ACTION: &str = "http://standards.ieee.org/11073/20701/2018/MdibReportingService/EpisodicReport";
const OPERATION_INVOKED_ACTION: &str = "http://standards.ieee.org/11073/20701/2018/MdibReportingService/OperationInvokedReport";

#[derive(Parser, Debug)]
#[command(name = "sdcctl")]
#[command(about = "Discover, inspect and watch IEEE 11073 SDC providers")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for providers over WS-Discovery
    Discover {
        /// Require this scope URI among the endpoint's advertised scopes
        #[arg(long)]
        scope: Vec<String>,
        /// Require this type QName among the endpoint's advertised types
        #[arg(long = "type")]
        types: Vec<String>,
        /// How long to wait for responses, in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
        /// Local interface to join the multicast group on (default: all)
        #[arg(long)]
        interface: Option<Ipv4Addr>,
    },

    /// Pull a provider's current MDIB and print a summary
    GetMdib {
        /// Service endpoint URL, e.g. https://10.0.0.5:8080/GetService
        #[arg(long)]
        endpoint: String,
        /// Request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Subscribe to a provider and print every report until Ctrl+C
    Watch {
        /// GetService endpoint URL used to bootstrap the mirror
        #[arg(long)]
        endpoint: String,
        /// SubscriptionManager endpoint URL used to subscribe
        #[arg(long)]
        subscribe_endpoint: String,
        /// Local address this tool's delivery listener binds to
        #[arg(long, default_value = "0.0.0.0:0")]
        listen: SocketAddr,
        /// Subscription lifetime requested, in seconds
        #[arg(long, default_value = "3600")]
        ttl: u64,
        /// Request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let result = match args.command {
        Commands::Discover {
            scope,
            types,
            timeout,
            interface,
        } => cmd_discover(scope, types, timeout, interface).await,
        Commands::GetMdib { endpoint, timeout } => cmd_get_mdib(&endpoint, timeout).await,
        Commands::Watch {
            endpoint,
            subscribe_endpoint,
            listen,
            ttl,
            timeout,
        } => cmd_watch(&endpoint, &subscribe_endpoint, listen, ttl, timeout).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[derive(Tabled)]
struct EndpointRow {
    #[tabled(rename = "Endpoint Reference")]
    epr: String,
    #[tabled(rename = "XAddrs")]
    x_addrs: String,
}

async fn cmd_discover(
    scopes: Vec<String>,
    types: Vec<String>,
    timeout_secs: u64,
    interface: Option<Ipv4Addr>,
) -> Result<(), Box<dyn std::error::Error>> {
    let predicate = RelevancePredicate::new().with_types(types).with_scopes(scopes);

    println!("{} searching for {} seconds...", ">>>".green().bold(), timeout_secs);
    let found = discover(interface, predicate, Duration::from_secs(timeout_secs)).await?;

    if found.is_empty() {
        println!("{}", "No providers found".yellow());
        return Ok(());
    }

    let rows: Vec<EndpointRow> = found
        .into_iter()
        .map(|p| EndpointRow {
            epr: p.epr,
            x_addrs: p.x_addrs.join(", "),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

async fn cmd_get_mdib(endpoint: &str, timeout_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let client_pool = HttpClientPool::new(4);
    let mirror = Mirror::new();
    mirror
        .bootstrap(&client_pool, endpoint, Duration::from_secs(timeout_secs))
        .await?;

    let snapshot = mirror.root().read();
    println!("{}", "MDIB summary".cyan().bold());
    println!("  Sequence id:  {}", snapshot.sequence_id);
    println!("  MDIB version: {}", snapshot.mdib_version);
    println!("  Descriptors:  {}", snapshot.descriptor_count());
    println!("  States:       {}", snapshot.state_count());
    Ok(())
}

async fn cmd_watch(
    endpoint: &str,
    subscribe_endpoint: &str,
    listen: SocketAddr,
    ttl_secs: u64,
    timeout_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let client_pool = HttpClientPool::new(4);
    let request_timeout = Duration::from_secs(timeout_secs);

    let mirror = Arc::new(Mirror::new());
    mirror.bootstrap(&client_pool, endpoint, request_timeout).await?;
    println!(
        "{} bootstrapped at MDIB version {}",
        ">>>".green().bold(),
        mirror.root().read().mdib_version
    );

    let listener = tokio::net::TcpListener::bind(listen).await?;
    let bound_addr = listener.local_addr()?;
    drop(listener);
    let (outcomes_tx, mut outcomes_rx) = tokio::sync::mpsc::unbounded_channel();
    let _server = sdc_consumer::listener::serve(Arc::clone(&mirror), bound_addr, Some(outcomes_tx));
    let delivery_to = format!("http://{bound_addr}/{}", sdc_consumer::DELIVERY_PATH);

    let eventing = EventingClient::new(&client_pool, request_timeout);
    let outcome = eventing
        .subscribe(
            subscribe_endpoint,
            &[EPISODIC_REPORT_ACTION, OPERATION_INVOKED_ACTION],
            &delivery_to,
            Some(Duration::from_secs(ttl_secs)),
        )
        .await?;
    println!(
        "{} subscribed ({}), expires in {}s",
        ">>>".green().bold(),
        outcome.subscription_id,
        outcome.expires.as_secs()
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    let mut last_version = mirror.root().read().mdib_version;
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(250)).await;
        while let Ok(outcome) = outcomes_rx.try_recv() {
            println!("{} report applied: {}", "->".cyan(), summarize_outcome(&outcome));
        }
        let current = mirror.root().read().mdib_version;
        if current != last_version {
            println!("{} MDIB version now {}", "->".cyan(), current);
            last_version = current;
        }
    }

    eventing.unsubscribe(subscribe_endpoint, &outcome.subscription_id).await.ok();
    Ok(())
}

fn summarize_outcome(outcome: &MirrorOutcome) -> &'static str {
    match outcome {
        MirrorOutcome::InvocationOnly { .. } => "invocation",
        MirrorOutcome::Applied { .. } => "applied",
        MirrorOutcome::NeedsRebuild => "needs-rebuild",
    }
}
