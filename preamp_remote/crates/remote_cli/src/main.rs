use anyhow::{anyhow, bail};
use clap::Parser;
use preamp_protocol::{DeviceState, SelectorLabels};
use sync_core::{Control, Endpoints, HostCommand, SyncConfig, SyncHandle, SyncUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

const HELP: &str = "\
commands:
  vol <n> | bal <n> | bri <n>   continuous controls (debounced)
  inp <n>                       select input
  mute on|off|toggle
  refresh                       full resync
  hide | show                   simulate page visibility
  discard                       close on purpose
  raw <line>                    send a protocol line as-is
  quit";

#[derive(Parser, Debug)]
#[command(name = "preamp_remote")]
struct Args {
    /// Bridge address, `host[:port]`.
    #[arg(long, env = "PREAMP_HOST", default_value = "127.0.0.1:8080")]
    host: String,

    /// Use wss:// and https://.
    #[arg(long, default_value_t = false)]
    secure: bool,

    /// HTTP API origin when it differs from the live socket's.
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// Print updates as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TerminalCommand {
    Host(HostCommand),
    Help,
    Quit,
}

impl TerminalCommand {
    fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let arg = parts.next();

        let host = match verb.as_str() {
            "vol" | "bal" | "bri" => {
                let control = match verb.as_str() {
                    "vol" => Control::Volume,
                    "bal" => Control::Balance,
                    _ => Control::Brightness,
                };
                let value = arg
                    .ok_or_else(|| anyhow!("{verb} needs a value"))?
                    .parse::<i32>()
                    .map_err(|e| anyhow!("{verb}: {e}"))?;
                HostCommand::Edit { control, value }
            }
            "inp" => {
                let index = arg
                    .ok_or_else(|| anyhow!("inp needs an input number"))?
                    .parse::<u32>()
                    .map_err(|e| anyhow!("inp: {e}"))?;
                HostCommand::SelectInput(index)
            }
            "mute" => match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => HostCommand::SetMute(true),
                Some("off") => HostCommand::SetMute(false),
                Some("toggle") | None => HostCommand::ToggleMute,
                Some(other) => bail!("mute: expected on|off|toggle, got {other:?}"),
            },
            "refresh" => HostCommand::Refresh,
            "hide" => HostCommand::Hidden,
            "show" => HostCommand::Visible,
            "discard" => HostCommand::Discard,
            "raw" => {
                let rest = line.trim_start()[3..].trim();
                if rest.is_empty() {
                    bail!("raw needs a line");
                }
                HostCommand::SendLine(rest.to_string())
            }
            "help" | "?" => return Ok(TerminalCommand::Help),
            "quit" | "exit" => return Ok(TerminalCommand::Quit),
            other => bail!("unknown command {other:?} (try `help`)"),
        };
        Ok(TerminalCommand::Host(host))
    }
}

fn endpoints(args: &Args) -> anyhow::Result<Endpoints> {
    let from_host = Endpoints::from_host(&args.host, args.secure)?;
    match args.api_base.as_deref() {
        Some(base) => Ok(Endpoints::new(from_host.live().clone(), Url::parse(base)?)),
        None => Ok(from_host),
    }
}

struct Printer {
    json: bool,
    labels: SelectorLabels,
}

impl Printer {
    fn print(&mut self, update: &SyncUpdate) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(update)?);
            return Ok(());
        }
        match update {
            SyncUpdate::Status { status } => println!("status: {}", status.label()),
            SyncUpdate::State { state } => println!("state: {}", self.describe(state)),
            SyncUpdate::Labels { labels } => {
                self.labels = labels.clone();
                let names: Vec<String> = labels
                    .display_entries()
                    .into_iter()
                    .map(|(i, name)| format!("{i}={name}"))
                    .collect();
                println!("inputs: {}", names.join(", "));
            }
        }
        Ok(())
    }

    fn describe(&self, state: &DeviceState) -> String {
        let mut out = Vec::new();
        if let Some(v) = state.volume() {
            out.push(format!("vol={v}"));
        }
        if let Some(b) = state.balance() {
            out.push(format!("bal={b}"));
        }
        if let Some(b) = state.brightness() {
            out.push(format!("bri={b}"));
        }
        if let Some(i) = state.input() {
            let key = i.to_string();
            let name = self
                .labels
                .display_entries()
                .into_iter()
                .find(|(k, _)| *k == key)
                .map(|(_, name)| name)
                .unwrap_or_else(|| format!("Input {i}"));
            out.push(format!("input={i} ({name})"));
        }
        if let Some(m) = state.muted() {
            out.push(format!("mute={}", if m { "on" } else { "off" }));
        }
        if out.is_empty() {
            state.to_line()
        } else {
            out.join(" ")
        }
    }
}

async fn run(mut handle: SyncHandle, json: bool) -> anyhow::Result<()> {
    let mut printer = Printer {
        json,
        labels: SelectorLabels::default(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            update = handle.recv() => match update {
                Some(update) => printer.print(&update)?,
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match TerminalCommand::parse(&line) {
                    Ok(TerminalCommand::Quit) => break,
                    Ok(TerminalCommand::Help) => eprintln!("{HELP}"),
                    Ok(TerminalCommand::Host(cmd)) => {
                        debug!("sending {cmd:?}");
                        handle.send(cmd).await?;
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = SyncConfig::from_env()?;
    let endpoints = endpoints(&args)?;
    eprintln!("bridge: {}", endpoints.live());
    eprintln!("{HELP}");

    let handle = sync_core::spawn(config, endpoints)?;
    run(handle, args.json).await
}
