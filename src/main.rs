mod address_codec;
mod capture;
mod config;
mod cpu_monitor;
mod csnmp;
mod dhcp;
mod error;
mod query_engine;
mod router;
mod router_list;
mod snapshot;

use crate::address_codec::{select_and_name_addresses, AddressAssignments};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::router_list::RouterList;
use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const SUBCOMMAND_COLLECT: &str = "collect";
const SUBCOMMAND_CPU: &str = "cpu";
const SUBCOMMAND_MACS: &str = "macs";
const SUBCOMMAND_DHCP_PLAN: &str = "dhcp-plan";
const SUBCOMMAND_DHCP_BINDINGS: &str = "dhcp-bindings";

fn cli() -> App<'static, 'static> {
    App::new("lab_netman")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Lab network management over SNMP")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .help("configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name(SUBCOMMAND_COLLECT)
                .about("poll every router for addresses and interface status"),
        )
        .subcommand(
            SubCommand::with_name(SUBCOMMAND_CPU).about("sample one router's CPU load"),
        )
        .subcommand(
            SubCommand::with_name(SUBCOMMAND_MACS)
                .about("derive MAC addresses from the IPv6 sources in a capture"),
        )
        .subcommand(
            SubCommand::with_name(SUBCOMMAND_DHCP_PLAN)
                .about("print the DHCP server configuration")
                .arg(
                    Arg::with_name("neighbors")
                        .long("neighbors")
                        .value_name("FILE")
                        .help("saved `show ipv6 neighbors` output used to find the server")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name(SUBCOMMAND_DHCP_BINDINGS)
                .about("list client addresses from `show ip dhcp binding` output")
                .arg(
                    Arg::with_name("input")
                        .long("input")
                        .value_name("FILE")
                        .required(true)
                        .takes_value(true),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing for nicer output
    tracing_subscriber::fmt::init();

    let matches = cli().get_matches();
    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load(Path::new(config_path))?;
    info!("lab_netman {} is starting", env!("CARGO_PKG_VERSION"));

    match matches.subcommand() {
        (SUBCOMMAND_COLLECT, _) => collect(&config).await,
        (SUBCOMMAND_CPU, _) => cpu(&config).await,
        (SUBCOMMAND_MACS, _) => macs(&config),
        (SUBCOMMAND_DHCP_PLAN, Some(sub)) => dhcp_plan(&config, sub),
        (SUBCOMMAND_DHCP_BINDINGS, Some(sub)) => dhcp_bindings(sub),
        _ => Ok(()),
    }
}

async fn collect(config: &Config) -> Result<()> {
    let now = Instant::now();
    let targets = RouterList::from_csv(&config.router_list)?;
    let routers = targets.fetch_all(config.snmp_timeout()).await;
    info!(
        "Queried {} routers in {:.2} seconds.",
        targets.targets.len(),
        now.elapsed().as_secs_f64(),
    );

    for router in &routers {
        println!(
            "{}: {} IPv4, {} IPv6, {} interfaces",
            router.name,
            router.ip_table.v4.len(),
            router.ip_table.v6.len(),
            router.interfaces.interfaces.len()
        );
    }

    snapshot::NetworkSnapshot::from_routers(&routers).save(&config.snapshot_path)?;
    info!("Snapshot written to {}", config.snapshot_path.display());
    Ok(())
}

async fn cpu(config: &Config) -> Result<()> {
    let targets = RouterList::from_csv(&config.router_list)?;
    let target = targets
        .find(&config.cpu.router)
        .with_context(|| format!("{} is not in the router list", config.cpu.router))?;
    let agent = target.agent(config.snmp_timeout());

    info!(
        "Monitoring {} every {}s for {}s",
        target.name, config.cpu.interval_secs, config.cpu.duration_secs
    );
    let trace = cpu_monitor::monitor(
        &agent,
        &config.cpu.oid,
        config.cpu.duration(),
        config.cpu.interval(),
    )
    .await;

    match trace.summary() {
        Some(summary) => println!(
            "{}: {} samples, average {:.2}%, max {}%, min {}%",
            target.name,
            trace.samples.len(),
            summary.average,
            summary.max,
            summary.min
        ),
        None => warn!("No CPU samples were collected from {}", target.name),
    }
    trace.save_csv(&config.cpu.output)?;
    info!("CPU trace written to {}", config.cpu.output.display());
    Ok(())
}

fn learn_assignments(config: &Config) -> Result<AddressAssignments> {
    let sources = capture::read_ipv6_sources(&config.capture.path)?;
    info!(
        "{} distinct IPv6 sources in {}",
        sources.len(),
        config.capture.path.display()
    );
    let assignments = select_and_name_addresses(
        sources.iter().map(|addr| addr.to_string()),
        &config.capture.address_prefix,
        &config.capture.interface_names,
    )?;
    Ok(assignments)
}

fn macs(config: &Config) -> Result<()> {
    let assignments = learn_assignments(config)?;
    if assignments.len() < config.capture.interface_names.len() {
        warn!(
            "Only {} of {} interfaces matched {}",
            assignments.len(),
            config.capture.interface_names.len(),
            config.capture.address_prefix
        );
    }
    for assignment in assignments.iter() {
        println!("{} IPv6: {}", assignment.name, assignment.ipv6);
        println!("{} MAC:  {}", assignment.name, assignment.mac);
    }
    Ok(())
}

fn dhcp_plan(config: &Config, matches: &ArgMatches) -> Result<()> {
    let assignments = learn_assignments(config)?;

    if let Some(neighbors) = matches.value_of("neighbors") {
        let output = std::fs::read_to_string(neighbors)
            .with_context(|| format!("Reading {neighbors}"))?;
        let server = dhcp::find_neighbor_address(&output, &config.capture.address_prefix)
            .with_context(|| {
                format!("No {} neighbor in {neighbors}", config.capture.address_prefix)
            })?;
        println!("DHCP server: {server}");
    }

    for command in config.dhcp.config_commands(&assignments)? {
        println!("{command}");
    }
    Ok(())
}

fn dhcp_bindings(matches: &ArgMatches) -> Result<()> {
    let input = matches.value_of("input").unwrap_or_default();
    let output =
        std::fs::read_to_string(input).with_context(|| format!("Reading {input}"))?;
    println!("DHCPv4 client addresses:");
    for client in dhcp::parse_dhcp_bindings(&output) {
        println!("  - {client}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let matches = cli()
            .get_matches_from_safe(["lab_netman", "dhcp-bindings", "--input", "b.txt"])
            .unwrap();
        let (name, sub) = matches.subcommand();
        assert_eq!(name, SUBCOMMAND_DHCP_BINDINGS);
        assert_eq!(sub.unwrap().value_of("input"), Some("b.txt"));
        assert_eq!(matches.value_of("config"), Some(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_bindings_requires_input() {
        assert!(cli()
            .get_matches_from_safe(["lab_netman", "dhcp-bindings"])
            .is_err());
    }

    #[test]
    fn test_config_override() {
        let matches = cli()
            .get_matches_from_safe(["lab_netman", "--config", "other.toml", "collect"])
            .unwrap();
        assert_eq!(matches.value_of("config"), Some("other.toml"));
        assert_eq!(matches.subcommand_name(), Some(SUBCOMMAND_COLLECT));
    }
}
