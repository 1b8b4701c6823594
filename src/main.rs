//////////////////////////////////////////////////////////////////////////////
//
// Interactive offboard console
//
// Connects to the vehicle (PX4 SITL on udp 14540 by default, or the built-in
// simulator with OFFBOARD_CONSOLE_ADDRESS=sim) and shows the flight menu.
//
//////////////////////////////////////////////////////////////////////////////

use color_eyre::eyre::Result;
use tokio::signal;

use offboard_console::{actions, logger, run_menu, ConsoleOptions, Terminal, Vehicle};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let options = ConsoleOptions::from_env();
    logger::init(options.log_level)?;

    let mut terminal = Terminal::new()?;

    let vehicle = tokio::select! {
        vehicle = Vehicle::connect(&options) => vehicle?,
        _ = signal::ctrl_c() => {
            println!("Interrupted while connecting.");
            return Ok(());
        }
    };

    tokio::select! {
        _ = run_menu(&vehicle, &options, &mut terminal) => {}
        _ = signal::ctrl_c() => {
            // a move or turn was in progress
            println!("\nInterrupted, stopping offboard control...");
            actions::halt(&vehicle).await;
        }
    }

    Ok(())
}
