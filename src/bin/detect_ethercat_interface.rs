use std::process::ExitCode;
use core::time::Duration;
use clap::Parser;
use ethercat_detect::{
    probe::probe,
    stack::EthernetStack,
    interfaces::{InterfaceSource, SystemInterfaces, StaticInterfaces},
    report,
    };

/// Find the network interface with an EtherCAT segment plugged and answering
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// interface to probe instead of the ones reported by the system, can be repeated to probe several in order
    #[arg(short, long = "interface")]
    interfaces: Vec<String>,

    /// delay in milliseconds after which a frame sent on an interface is considered lost
    #[arg(long, default_value_t = 200)]
    timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let candidates = if args.interfaces.is_empty() {
        SystemInterfaces::new().candidates()
    }
    else {
        StaticInterfaces(args.interfaces).candidates()
    };
    println!("{}", report::Banner);
    println!("{}\n", report::Candidates(&candidates));

    let stack = EthernetStack::new(Duration::from_millis(args.timeout_ms));
    let result = probe(&stack, &candidates, |attempt| println!("{}", report::Attempt(attempt))).await;

    println!("\n{}", report::Verdict(&result));
    ExitCode::from(result.exit_status())
}
