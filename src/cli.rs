use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use touch_gestures::GestureKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub device: Option<PathBuf>,
    pub width: i32,
    pub height: i32,
    pub grab: bool,
    pub capabilities: bool,
    pub only: Option<GestureKind>,
}

fn command() -> Command {
    Command::new("gesture-monitor")
        .version("0.1.0")
        .about("prints the gestures recognized on a multitouch screen")
        .arg(
            Arg::new("device")
                .long("device")
                .value_name("PATH")
                .help("evdev node of the touchscreen (default: first touchscreen in /dev/input)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("width of the reported coordinate space (default: 1920)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("height of the reported coordinate space (default: 1080)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("no-grab")
                .long("no-grab")
                .help("leaves the device to other readers (default: grab it exclusively)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("capabilities")
                .long("capabilities")
                .help("prints the capabilities of the touchscreen and exits")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("only")
                .long("only")
                .value_name("KIND")
                .help(format!(
                    "only prints gestures of this kind, possible values: {:?}",
                    GestureKind::iter_variants().collect::<Vec<GestureKind>>()
                ))
                .action(ArgAction::Set),
        )
}

pub fn parse() -> Result<Args> {
    from_matches(&command().get_matches())
}

fn from_matches(matches: &ArgMatches) -> Result<Args> {
    let value = |name: &str| matches.get_one::<String>(name).map(String::as_str);
    Ok(Args {
        device: value("device").map(PathBuf::from),
        width: parse_with_default(value("width"), 1920)?,
        height: parse_with_default(value("height"), 1080)?,
        grab: !matches.get_flag("no-grab"),
        capabilities: matches.get_flag("capabilities"),
        only: parse_kind(value("only"))?,
    })
}

fn parse_with_default<N>(input: Option<&str>, default: N) -> Result<N>
where
    N: FromStr,
    <N as FromStr>::Err: Display,
{
    match input {
        None => Ok(default),
        Some(string) => string
            .parse()
            .map_err(|e| anyhow!("invalid number {}: {}", string, e)),
    }
}

fn parse_kind(input: Option<&str>) -> Result<Option<GestureKind>> {
    match input {
        None => Ok(None),
        Some(kind) => kind.parse().map(Some).map_err(|_| {
            anyhow!(
                "unknown gesture kind: {}, possible values: {:?}",
                kind,
                GestureKind::iter_variants().collect::<Vec<GestureKind>>()
            )
        }),
    }
}
