//! Parses stdin lines into player commands.

use lessonflow_core::{AfterEnd, Command, Direction, ReadMode};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Engine(Command),
    OpenNeighbor(Direction),
    Transcript,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  <enter> | p        play / pause
  <n>                play sentence n
  n | b | r          next / previous / replay sentence
  mode <continuous|single|listen>
  after <none|repeat-one|repeat-all|advance-next>
  rate               cycle playback rate
  + | -              volume up / down
  seek <0..1>        jump to a fraction of the track
  reveal [n]         reveal current or n-th sentence (listen mode)
  follow <on|off>    auto-follow the highlight
  intro <on|off>     skip the lesson intro
  reset              restore default preferences
  lesson <next|prev> open the neighbouring lesson
  list | status | help | q";

pub fn parse_line(line: &str) -> Result<HostCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(HostCommand::Engine(Command::TogglePlayPause));
    };
    let arg = words.next();
    let command = match head.to_ascii_lowercase().as_str() {
        "p" | "play" | "pause" | "space" => Command::TogglePlayPause,
        "stop" => Command::Pause,
        "n" | "next" => Command::Next,
        "b" | "prev" | "previous" => Command::Previous,
        "r" | "replay" => Command::Replay,
        "mode" => Command::SetReadMode(required(arg, "mode")?.parse::<ReadMode>()?),
        "after" => Command::SetAfterEnd(required(arg, "after")?.parse::<AfterEnd>()?),
        "rate" => Command::CycleRate,
        "+" | "up" => Command::VolumeUp,
        "-" | "down" => Command::VolumeDown,
        "seek" => {
            let fraction = parse_number::<f64>(required(arg, "seek")?)?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(format!("seek fraction {fraction} is outside 0..1"));
            }
            Command::SeekFraction(fraction)
        }
        "reveal" => match arg {
            Some(index) => Command::Reveal(parse_number(index)?),
            None => Command::ToggleReveal(None),
        },
        "follow" => Command::SetAutoFollow(parse_switch(required(arg, "follow")?)?),
        "intro" => Command::SetSkipIntro(parse_switch(required(arg, "intro")?)?),
        "reset" => Command::ResetPreferences,
        "lesson" => {
            return match required(arg, "lesson")? {
                "next" => Ok(HostCommand::OpenNeighbor(Direction::Next)),
                "prev" | "previous" => Ok(HostCommand::OpenNeighbor(Direction::Previous)),
                other => Err(format!("unknown lesson direction `{other}`")),
            };
        }
        "list" | "l" => return Ok(HostCommand::Transcript),
        "status" | "s" => return Ok(HostCommand::Status),
        "help" | "h" | "?" => return Ok(HostCommand::Help),
        "q" | "quit" | "exit" => return Ok(HostCommand::Quit),
        other => match other.parse::<usize>() {
            Ok(index) => Command::PlaySentence(index),
            Err(_) => return Err(format!("unknown command `{other}`; try `help`")),
        },
    };
    Ok(HostCommand::Engine(command))
}

fn required<'a>(arg: Option<&'a str>, command: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("`{command}` needs an argument"))
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("`{raw}` is not a valid number"))
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(format!("expected on/off, got `{other}`")),
    }
}
