use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use descent::dns::Message;
use descent::{
    ClientOptions, DnsClient, NameServerAddress, Question, RecordClass, RecordType, SimpleCache,
};

#[derive(Parser)]
#[command(name = "descent")]
#[command(about = "Iterative DNS resolver", long_about = None)]
struct Args {
    /// Name to look up (an IP address defaults to a PTR query)
    name: String,

    /// Record type (A, AAAA, NS, MX, PTR, SOA, TXT, TYPEnn, ...)
    #[arg(value_name = "TYPE")]
    record_type: Option<RecordType>,

    /// Name server to query (IP, IP:port or hostname); repeatable
    #[arg(short, long = "server", value_name = "ADDR")]
    servers: Vec<NameServerAddress>,

    /// Query the servers listed in /etc/resolv.conf
    #[arg(long, conflicts_with = "servers")]
    system: bool,

    /// Always use TCP
    #[arg(long)]
    tcp: bool,

    /// Prefer IPv6 name server addresses
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Attempts per name server
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Connect, send and receive timeout in milliseconds
    #[arg(long, default_value = "2000", value_name = "MS")]
    timeout: u64,

    /// Resolve from the root without the in-memory cache
    #[arg(long)]
    no_cache: bool,

    /// Enable debug logging and print exchange statistics
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "descent=debug" } else { "descent=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}

fn question_for(args: &Args) -> Question {
    match (args.name.parse::<IpAddr>(), args.record_type) {
        (Ok(ip), None | Some(RecordType::Ptr)) => Question::ptr(ip),
        (_, rtype) => Question::new(
            args.name.clone(),
            rtype.unwrap_or(RecordType::A),
            RecordClass::In,
        ),
    }
}

fn print_response(response: &Message) {
    match &response.origin {
        Some(origin) => println!(
            ";; {} from {} over {} in {:.3}ms",
            response.rcode(),
            origin.server,
            origin.protocol,
            origin.rtt.as_secs_f64() * 1000.0
        ),
        None => println!(";; {} from {}", response.rcode(), response.server_name()),
    }

    for question in &response.question {
        println!(";{}", question);
    }
    for (title, records) in [
        ("ANSWER", &response.answer),
        ("AUTHORITY", &response.authority),
        ("ADDITIONAL", &response.additional),
    ] {
        if records.is_empty() {
            continue;
        }
        println!("\n;; {} SECTION:", title);
        for record in records {
            println!("{}", record);
        }
    }
}

async fn run(args: Args) -> descent::Result<()> {
    let timeout = Duration::from_millis(args.timeout);
    let options = ClientOptions {
        prefer_ipv6: args.ipv6,
        tcp: args.tcp,
        retries: args.retries,
        connect_timeout: timeout,
        send_timeout: timeout,
        recv_timeout: timeout,
        ..ClientOptions::default()
    };
    let stats = options.stats.clone();

    let client = if args.system {
        DnsClient::system(options)?
    } else if !args.servers.is_empty() {
        DnsClient::new(args.servers.clone(), options)
    } else if args.no_cache {
        DnsClient::new(Vec::new(), options)
    } else {
        DnsClient::recursive(options, Arc::new(SimpleCache::new()))
    };

    let response = client.resolve_question(question_for(&args)).await?;
    print_response(&response);

    if args.verbose {
        let stats = stats.snapshot_and_reset();
        println!(
            "\n;; [stats] exchanges={} failed={} id_mismatches={} tcp_upgrades={} cache_hits={} avg_rtt={:.2}ms",
            stats.exchanges,
            stats.failed_attempts,
            stats.id_mismatches,
            stats.tcp_upgrades,
            stats.cache_hits,
            stats.avg_rtt_ms
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("descent: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("descent: {}", e);
            ExitCode::FAILURE
        }
    }
}
