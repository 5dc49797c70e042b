use clap::{Parser, Subcommand};
use conch_rack::models::SlotNumber;

/// Conch rack console.
#[derive(Parser, Debug)]
#[command(name = "conch-console")]
#[command(about = "Inspect racks and assign devices to slots on a Conch backend")]
pub struct Args {
    /// Backend URL, overrides the config file and CONCH_URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Workspace id or name
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rooms and the racks in each
    Rooms,
    /// One rack's slots, top of the rack first
    Rack {
        rack_id: String,
        /// Highlight this device
        #[arg(long)]
        device: Option<String>,
    },
    /// Assign devices to slots and submit the layout
    Assign {
        rack_id: String,
        /// `SLOT=DEVICE`, repeatable. An empty device blanks the slot.
        #[arg(long = "set", value_name = "SLOT=DEVICE", value_parser = parse_assignment, required = true)]
        set: Vec<(SlotNumber, String)>,
    },
    /// Relays in natural alias order
    Relays {
        /// Include relays that are not currently active
        #[arg(long)]
        all: bool,
    },
    /// Find a device and show its rack
    Locate { device_id: String },
    /// Notify administrators about the device in a slot
    Flag { rack_id: String, slot: SlotNumber },
}

pub fn parse_assignment(raw: &str) -> Result<(SlotNumber, String), String> {
    let (slot, device) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=DEVICE, got `{raw}`"))?;
    let slot = slot
        .trim()
        .parse::<SlotNumber>()
        .map_err(|e| format!("invalid slot `{slot}`: {e}"))?;
    Ok((slot, device.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("3=dev5"), Ok((3, "dev5".to_string())));
        assert_eq!(parse_assignment("4="), Ok((4, String::new())));
        assert!(parse_assignment("dev5").is_err());
        assert!(parse_assignment("x=dev5").is_err());
    }

    #[test]
    fn test_args_parse_assign() {
        let args = Args::try_parse_from(["conch-console", "assign", "r1", "--set", "2=dev3", "--set", "1=dev1"]).unwrap();
        match args.command {
            Command::Assign { rack_id, set } => {
                assert_eq!(rack_id, "r1");
                assert_eq!(set, vec![(2, "dev3".to_string()), (1, "dev1".to_string())]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
