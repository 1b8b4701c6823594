use log::info;

use crate::actions;
use crate::errors::Result;
use crate::input::LineSource;
use crate::link::VehicleLink;
use crate::manual::run_manual_control;
use crate::options::ConsoleOptions;

const PROMPT: &str = "Enter choice: ";

/// An entry of the top level menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Arm,
    TakeOff,
    ManualControl,
    ReturnToLaunch,
    Land,
    Exit
}

impl MenuChoice {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "1" => Some(MenuChoice::Arm),
            "2" => Some(MenuChoice::TakeOff),
            "3" => Some(MenuChoice::ManualControl),
            "4" => Some(MenuChoice::ReturnToLaunch),
            "5" => Some(MenuChoice::Land),
            "6" => Some(MenuChoice::Exit),
            _ => None
        }
    }
}

fn print_menu() {
    println!("\nChoose an option:");
    println!("1) Arm");
    println!("2) Take off");
    println!("3) Manual control (distance + turning)");
    println!("4) Return to launch");
    println!("5) Land");
    println!("6) Exit");
}

/// Runs one menu choice. Manual control reads its commands from `input`.
pub async fn dispatch<L, I>(choice: MenuChoice, link: &L, options: &ConsoleOptions, input: &mut I) -> Result<()>
where
    L: VehicleLink,
    I: LineSource
{
    info!("menu choice {choice:?}");
    match choice {
        MenuChoice::Arm => actions::arm(link, options).await,
        MenuChoice::TakeOff => actions::takeoff(link, options).await,
        MenuChoice::ManualControl => run_manual_control(link, options, input).await,
        MenuChoice::ReturnToLaunch => actions::return_to_launch(link, options).await,
        MenuChoice::Land => actions::land(link, options).await,
        MenuChoice::Exit => {
            println!("Exiting and stopping offboard if active.");
            actions::halt(link).await;
            Ok(())
        }
    }
}

/// The top level loop. Returns when the operator exits or input ends; every
/// failure along the way is reported and the menu shown again.
pub async fn run_menu<L, I>(link: &L, options: &ConsoleOptions, input: &mut I)
where
    L: VehicleLink,
    I: LineSource
{
    loop {
        print_menu();

        let Some(line) = input.next_line(PROMPT).await else {
            println!("Exiting and stopping offboard if active.");
            actions::halt(link).await;
            break;
        };

        let Some(choice) = MenuChoice::parse(&line) else {
            println!("[x] Invalid option.");
            continue;
        };

        if let Err(err) = dispatch(choice, link, options, input).await {
            println!("[x] Error: {err}");
        }

        if choice == MenuChoice::Exit {
            break;
        }
    }

    println!("[✔] Session ended.");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::Arm));
        assert_eq!(MenuChoice::parse(" 3 "), Some(MenuChoice::ManualControl));
        assert_eq!(MenuChoice::parse("6"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("7"), None);
        assert_eq!(MenuChoice::parse("arm"), None);
        assert_eq!(MenuChoice::parse(""), None);
    }
}
