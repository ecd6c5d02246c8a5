//! zoneout CLI: command-line headset configuration and event monitor.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use zoneout_core::comm::{ErrorClass, Timing};
use zoneout_core::safety;
use zoneout_core::status::{FullStatus, NcStatus};
use zoneout_core::{Headset, StopToken};

#[derive(Parser)]
#[command(
    name = "zoneout",
    version,
    about = "Control the Sony INZONE H9 II headset"
)]
struct Cli {
    /// Per-read timeout of the event monitor, in milliseconds.
    #[arg(long, global = true, default_value_t = Timing::default().event_timeout_ms)]
    event_timeout_ms: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected H9 II HID interfaces.
    ListDevices,
    /// Show every setting and status value.
    GetAll {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show one variable.
    Get {
        var: Var,
    },
    /// Change one or more variables: `set volume 12 nc-mode 1`.
    Set {
        /// VAR VALUE pairs; values also accept on/off/true/false.
        #[arg(
            num_args = 2..,
            required = true,
            allow_hyphen_values = true,
            value_name = "VAR VALUE"
        )]
        pairs: Vec<String>,
    },
    /// Print device events as they arrive.
    Monitor {
        /// Print one JSON object per line.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Var {
    Volume,
    Balance,
    Sidetone,
    Battery,
    NcMode,
    MicMuted,
    AmbientLevel,
    FocusVoice,
    AutoOff,
    Language,
    Notif,
    MicConnected,
    BootNc,
    BootBt,
}

fn on_off(b: bool) -> &'static str {
    if b {
        "on"
    } else {
        "off"
    }
}

impl Var {
    fn name(self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }

    fn is_read_only(self) -> bool {
        matches!(self, Var::Battery | Var::MicMuted | Var::MicConnected)
    }

    fn format(self, status: &FullStatus) -> String {
        let (audio, nc, system) = (&status.audio, &status.nc, &status.system);
        match self {
            Var::Volume => audio.volume.to_string(),
            Var::Balance => audio.balance.to_string(),
            Var::Sidetone => audio.sidetone.to_string(),
            Var::Battery => format!(
                "{}%{}",
                audio.battery_level,
                if audio.charging { " (charging)" } else { "" }
            ),
            Var::NcMode => nc.nc_mode.to_string(),
            Var::MicMuted => on_off(nc.mic_muted).to_string(),
            Var::AmbientLevel => nc.ambient_level.to_string(),
            Var::FocusVoice => on_off(nc.focus_on_voice).to_string(),
            Var::AutoOff => format!("{} min", system.auto_off_minutes),
            Var::Language => system.language.to_string(),
            Var::Notif => on_off(system.notif_enabled).to_string(),
            Var::MicConnected => on_off(system.mic_connected).to_string(),
            Var::BootNc => system.boot_nc.to_string(),
            Var::BootBt => system.boot_bt.to_string(),
        }
    }

    fn apply(self, headset: &mut Headset, value: i32) -> Result<()> {
        match self {
            Var::Volume => headset.set_volume(value)?,
            Var::Balance => headset.set_balance(value)?,
            Var::Sidetone => headset.set_sidetone(value)?,
            Var::NcMode => headset.set_noise_cancelling(value)?,
            // Level and focus share one write; keep the half not being set.
            Var::AmbientLevel => {
                let (_, focus) = ambient_base(headset.get_nc_status());
                headset.set_ambient_sound(value, focus)?;
            }
            Var::FocusVoice => {
                let (level, _) = ambient_base(headset.get_nc_status());
                headset.set_ambient_sound(level as i32, value != 0)?;
            }
            Var::AutoOff => headset.set_auto_power_off(value)?,
            Var::Language => headset.set_voice_language(value)?,
            Var::Notif => headset.set_notification_voice(value != 0)?,
            Var::BootNc => headset.set_boot_nc_mode(value)?,
            Var::BootBt => headset.set_boot_bt_mode(value)?,
            Var::Battery | Var::MicMuted | Var::MicConnected => {
                bail!("'{}' is read-only", self.name())
            }
        }
        Ok(())
    }
}

/// Current ambient level and focus flag, or the single-field helper defaults
/// (maximum level, focus off) when the NC status cannot be read.
fn ambient_base(nc: zoneout_core::Result<NcStatus>) -> (u8, bool) {
    match nc {
        Ok(nc) => (nc.ambient_level, nc.focus_on_voice),
        Err(e) => {
            tracing::warn!(error = %e, "NC status unavailable; using ambient defaults");
            (safety::AMBIENT_LEVEL_DEFAULT, false)
        }
    }
}

/// Parse a setting value; on/true and off/false stand for 1 and 0.
fn parse_value(raw: &str) -> Result<i32> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" => Ok(1),
        "off" | "false" => Ok(0),
        other => other
            .parse()
            .with_context(|| format!("invalid value '{raw}': expected a number, on or off")),
    }
}

/// Split `VAR VALUE ...` into checked pairs before touching the device.
fn parse_pairs(pairs: &[String]) -> Result<Vec<(Var, i32)>> {
    if pairs.len() % 2 != 0 {
        bail!("expected VAR VALUE pairs, got {} arguments", pairs.len());
    }
    pairs
        .chunks(2)
        .map(|pair| {
            let var = Var::from_str(&pair[0], true).map_err(|e| anyhow!(e))?;
            if var.is_read_only() {
                bail!("'{}' is read-only", var.name());
            }
            Ok((var, parse_value(&pair[1])?))
        })
        .collect()
}

fn connect(timing: Timing) -> Result<Headset> {
    let mut headset = Headset::new().with_timing(timing);
    headset.open()?;
    Ok(headset)
}

fn print_status(status: &FullStatus) {
    let all = Var::value_variants();
    let width = all.iter().map(|v| v.name().len()).max().unwrap_or(0);
    for var in all {
        println!("{:<width$}  {}", var.name(), var.format(status));
    }
    println!(
        "{:<width$}  enabled: {}, connected: {}",
        "bluetooth",
        on_off(status.system.bt_state.enabled),
        on_off(status.system.bt_state.connected)
    );
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let core = err.downcast_ref::<zoneout_core::Error>()?;
    match ErrorClass::classify(core) {
        ErrorClass::PermissionDenied => {
            Some("no access to the hidraw node; install a udev rule for 054c:0fa8")
        }
        ErrorClass::Disconnected => Some("is the headset's USB dongle plugged in?"),
        ErrorClass::Protocol | ErrorClass::Transport => None,
    }
}

fn run(cli: Cli) -> Result<()> {
    let timing = Timing {
        event_timeout_ms: cli.event_timeout_ms,
        ..Timing::default()
    };

    match cli.command {
        Commands::ListDevices => {
            let devices = zoneout_core::device::discover_devices()?;
            if devices.is_empty() {
                println!("No INZONE H9 II found.");
                println!("Ensure the USB dongle is connected and udev rules are set up.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, interface: {}, path: {})",
                        dev.product.as_deref().unwrap_or("INZONE H9 II"),
                        dev.vid,
                        dev.pid,
                        dev.interface,
                        dev.path
                    );
                }
            }
        }
        Commands::GetAll { json } => {
            let mut headset = connect(timing)?;
            let status = headset.get_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::Get { var } => {
            let mut headset = connect(timing)?;
            let status = headset.get_all()?;
            println!("{}", var.format(&status));
        }
        Commands::Set { pairs } => {
            let settings = parse_pairs(&pairs)?;
            let mut headset = connect(timing)?;
            for (var, value) in settings {
                tracing::debug!(var = %var.name(), value, "Applying setting");
                var.apply(&mut headset, value)
                    .with_context(|| format!("set {}", var.name()))?;
                println!("{} set", var.name());
            }
        }
        Commands::Monitor { json } => {
            let mut headset = connect(timing)?;
            if !json {
                println!("Listening for headset events (Ctrl+C to stop)...");
            }
            for event in headset.listen(StopToken::new())? {
                let event = event?;
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!("{event}");
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    run(cli).inspect_err(|e| {
        if let Some(hint) = hint(e) {
            eprintln!("hint: {hint}");
        }
    })
}
