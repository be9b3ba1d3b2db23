use car_park_ledger::domain::model::display_amount;
use car_park_ledger::utils::error::{ErrorSeverity, ParkingError};
use car_park_ledger::utils::logger;
use car_park_ledger::{CliConfig, ParkingLot, Transaction, Vehicle, VehicleCategory};
use clap::Parser;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  list                         show parked vehicles
  add <category> <balance>     park a vehicle (passenger|truck|bus|motorcycle or 1-4)
  remove <id>                  remove a vehicle (balance must not be negative)
  recharge <id> <amount>       top up a vehicle balance
  history                      transactions of the last minute
  revenue                      total revenue
  revenue-minute               revenue of the last minute
  free | occupied              parking space counters
  log                          contents of the revenue log
  status                       JSON snapshot of the park
  help | quit";

fn vehicles_table(vehicles: &[Vehicle]) -> String {
    let separator = "-".repeat(40);
    let mut out = format!("{separator}\n|{:<10}|{:<10}|{:<16}|\n{separator}\n", "ID", "Balance", "Category");
    for vehicle in vehicles {
        out.push_str(&format!(
            "|{:<10}|{:<10}|{:<16}|\n{separator}\n",
            vehicle.id,
            display_amount(vehicle.balance).to_string(),
            vehicle.category
        ));
    }
    out
}

fn transactions_table(transactions: &[Transaction]) -> String {
    let separator = "-".repeat(50);
    let mut out = format!(
        "{separator}\n|{:<20}|{:<10}|{:<16}|\n{separator}\n",
        "Time", "Vehicle ID", "Debited"
    );
    for tx in transactions {
        out.push_str(&format!(
            "|{:<20}|{:<10}|{:<16}|\n{separator}\n",
            tx.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.vehicle_id(),
            display_amount(tx.amount()).to_string()
        ));
    }
    out
}

fn parse_arg<T: std::str::FromStr>(args: &[&str], index: usize, what: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing {}", what))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", what, raw, e))
}

fn report(err: &ParkingError) {
    tracing::debug!("Operation failed: {} ({:?})", err, err.category());
    println!("❌ {}", err.user_friendly_message());
    println!("💡 {}", err.recovery_suggestion());
}

/// Runs one shell command. Returns `false` when the shell should exit.
fn execute(lot: &ParkingLot, line: &str) -> anyhow::Result<bool> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let Some(command) = args.first() else {
        return Ok(true);
    };

    match command.to_ascii_lowercase().as_str() {
        "list" => {
            let vehicles = lot.list_vehicles();
            if vehicles.is_empty() {
                println!("The parking is empty.");
            } else {
                print!("{}", vehicles_table(&vehicles));
            }
        }
        "add" => {
            let category: VehicleCategory = parse_arg(&args, 1, "category")?;
            let balance: Decimal = parse_arg(&args, 2, "balance")?;
            match lot.add_vehicle(category, balance) {
                Ok(vehicle) => println!("✅ Parked {}", vehicle),
                Err(e) => report(&e),
            }
        }
        "remove" => {
            let id = parse_arg(&args, 1, "vehicle id")?;
            match lot.remove_vehicle(id) {
                Ok(true) => println!("✅ Vehicle {} left the parking", id),
                Ok(false) => println!("No vehicle with ID {}", id),
                Err(e) => report(&e),
            }
        }
        "recharge" => {
            let id = parse_arg(&args, 1, "vehicle id")?;
            let amount: Decimal = parse_arg(&args, 2, "amount")?;
            match lot.recharge(id, amount) {
                Ok(true) => {
                    if let Some(vehicle) = lot.get_vehicle(id) {
                        println!("✅ {}", vehicle);
                    }
                }
                Ok(false) => println!("No vehicle with ID {}", id),
                Err(e) => report(&e),
            }
        }
        "history" => {
            let transactions = lot.transactions_last_minute();
            if transactions.is_empty() {
                println!("No transactions in the last minute.");
            } else {
                print!("{}", transactions_table(&transactions));
            }
        }
        "revenue" => println!("Total revenue: {}", display_amount(lot.revenue_total())),
        "revenue-minute" => println!(
            "Revenue for the last minute: {}",
            display_amount(lot.revenue_last_minute())
        ),
        "free" => println!("Free spaces: {}/{}", lot.free_spaces(), lot.capacity()),
        "occupied" => println!("Occupied spaces: {}/{}", lot.occupied_spaces(), lot.capacity()),
        "log" => {
            let log = lot.read_log();
            if log.is_empty() {
                println!("The revenue log is empty or unavailable.");
            } else {
                print!("{}", log);
            }
        }
        "status" => println!("{}", serde_json::to_string_pretty(&lot.snapshot())?),
        "help" | "?" => println!("{}", HELP),
        "quit" | "exit" => return Ok(false),
        other => println!("Unknown command '{}'. Type 'help' for the list.", other),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config);

    let settings = match config.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(
                "❌ Configuration failed: {} (Severity: {:?})",
                e,
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    };

    let lot = ParkingLot::from_settings(settings)?;
    println!("🚗 Car park ready with {} spaces. Type 'help' for commands.", lot.capacity());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match execute(&lot, &line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("❌ {}", e),
        }
    }

    lot.shutdown();
    tracing::info!("Car park shut down");
    Ok(())
}
