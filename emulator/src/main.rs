mod session;

use std::env;
use std::process;

use session::Scenario;

fn main() {
    let scenario = parse_scenario().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: receiver-emulator [--scenario <alert|self-test|channel-loss|tuner-fault>]"
        );
        process::exit(2);
    });

    println!("Weather-band receiver emulator: {} scenario", scenario.tag());
    for line in session::run(scenario) {
        println!("{line}");
    }
}

fn parse_scenario() -> Result<Scenario, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--scenario=") {
            Scenario::from_tag(value)
        } else if arg == "--scenario" {
            if let Some(value) = args.next() {
                Scenario::from_tag(&value)
            } else {
                Err("Expected value after --scenario".to_string())
            }
        } else {
            Scenario::from_tag(&arg)
        }
    } else {
        Ok(Scenario::Alert)
    }
}
