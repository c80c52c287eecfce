//! `sbsutil`: command-line front end for the springboard services client.
//!
//! ```text
//! sbsutil [--config FILE] [--device UDID] <COMMAND>
//!
//!   icon-state      [--format-version V] [--output FILE]   print or save the layout (JSON)
//!   set-icon-state  --input FILE                            push a layout saved by icon-state
//!   icon            --bundle-id ID --output FILE            save an app icon PNG
//!   orientation                                             print the interface orientation
//!   wallpaper       --output FILE                           save the home-screen wallpaper PNG
//!   init-config                                             write a default config file
//! ```
//!
//! Service endpoints come from the `[[services]]` table of the config file
//! (see `infrastructure::storage::config`).  Without `--device`, only entries
//! that name no device are considered.  Logging honours `RUST_LOG` and
//! falls back to `general.log_level`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sbs_client::infrastructure::lockdown::{DeviceHandle, StaticServiceProvider};
use sbs_client::infrastructure::storage::config::{load_config, save_config, AppConfig};
use sbs_client::infrastructure::storage::icon_state::{load_icon_state, save_icon_state, to_json};
use sbs_client::SpringboardServiceClient;
use sbs_core::ImagePayload;

#[derive(Debug, Parser)]
#[command(name = "sbsutil", version, about = "Query and modify a device's home screen")]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, env = "SBSUTIL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// UDID of the target device.  Without it only `[[services]]` entries
    /// that name no device are used.
    #[arg(long, env = "SBSUTIL_DEVICE", global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the home-screen layout as JSON, or save it to a file.
    IconState {
        /// Layout format version to request (e.g. "2").
        #[arg(long)]
        format_version: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the home-screen layout with one saved by `icon-state`.
    SetIconState {
        #[arg(long, short)]
        input: PathBuf,
    },
    /// Save the icon of an installed app as PNG.
    Icon {
        #[arg(long)]
        bundle_id: String,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print the current interface orientation.
    Orientation,
    /// Save the home-screen wallpaper as PNG.
    Wallpaper {
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Write a config file with default values.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "sbsutil starting");

    if let Command::InitConfig = cli.command {
        let path = save_config(&AppConfig::default(), cli.config.as_deref()).context("writing configuration")?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let transport = config.transport_config().context("building transport settings")?;
    let provider = StaticServiceProvider::new(config.services.clone());
    let device = cli.device.clone().map_or_else(DeviceHandle::any, DeviceHandle::new);

    let mut client = SpringboardServiceClient::attach(&provider, &device, &transport)
        .await
        .with_context(|| format!("attaching to springboard services on device {device}"))?;

    let outcome = run(&mut client, cli.command).await;
    client.close().await;
    outcome
}

async fn run(client: &mut SpringboardServiceClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::IconState {
            format_version,
            output,
        } => {
            let state = client
                .get_icon_state_with_format(format_version.as_deref())
                .await
                .context("getIconState")?;
            match output {
                Some(path) => {
                    save_icon_state(&path, &state)?;
                    info!(path = %path.display(), "icon state saved");
                }
                None => println!("{}", to_json(&state)?),
            }
        }
        Command::SetIconState { input } => {
            let state = load_icon_state(&input)?;
            client.set_icon_state(&state).await.context("setIconState")?;
            info!(path = %input.display(), "icon state applied");
        }
        Command::Icon { bundle_id, output } => {
            let png = client
                .get_icon_pngdata(&bundle_id)
                .await
                .with_context(|| format!("getIconPNGData for {bundle_id}"))?;
            write_png(&output, &png)?;
        }
        Command::Orientation => {
            let orientation = client
                .get_interface_orientation()
                .await
                .context("getInterfaceOrientation")?;
            println!("{orientation} ({})", orientation.raw());
        }
        Command::Wallpaper { output } => {
            let png = client
                .get_home_screen_wallpaper_pngdata()
                .await
                .context("getHomescreenWallpaperPNGData")?;
            write_png(&output, &png)?;
        }
        Command::InitConfig => bail!("init-config does not talk to a device"),
    }
    Ok(())
}

fn write_png(path: &Path, png: &ImagePayload) -> anyhow::Result<()> {
    if png.is_empty() {
        bail!("device returned no image data");
    }
    std::fs::write(path, png.as_bytes()).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = png.len(), "image saved");
    Ok(())
}
