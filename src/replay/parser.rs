use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::gnss::{Position, RawSatellite};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("step {0}: {1}")]
    Step(usize, String),
}

/// A timed sequence of host and sensor events.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Offset from the replay start. `None` runs right after the previous step.
    pub time: Option<Duration>,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessChange {
    Grant,
    Revoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Access(AccessChange),
    Session(SessionCommand),
    Satellites(Vec<RawSatellite>),
    Fix(Option<Position>),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Access(AccessChange::Grant) => "access.grant",
            Action::Access(AccessChange::Revoke) => "access.revoke",
            Action::Session(SessionCommand::Start) => "session.start",
            Action::Session(SessionCommand::Stop) => "session.stop",
            Action::Satellites(_) => "satellites",
            Action::Fix(Some(_)) => "fix",
            Action::Fix(None) => "fix.null",
        }
    }
}

impl Script {
    pub fn from_str(yaml: &str) -> Result<Self, ParseError> {
        let root: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let steps = root
            .get("steps")
            .and_then(|v| v.as_sequence())
            .ok_or_else(|| ParseError::Step(0, "missing 'steps'".into()))?
            .iter()
            .enumerate()
            .map(|(i, v)| parse_step(i, v))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Script { steps })
    }
}

fn parse_step(i: usize, value: &serde_yaml::Value) -> Result<Step, ParseError> {
    let err = |msg: &str| ParseError::Step(i, msg.into());
    let map = value.as_mapping().ok_or_else(|| err("expected mapping"))?;

    let time = map
        .get("time")
        .map(|v| v.as_str().ok_or_else(|| "time must be string".to_string()))
        .transpose()
        .and_then(|t| t.map(parse_time).transpose())
        .map_err(|e| err(&e))?;

    // The action key is anything that isn't "time"
    let (kind, value) = map
        .iter()
        .find(|(k, _)| k.as_str() != Some("time"))
        .ok_or_else(|| err("no action found"))?;

    let kind = kind.as_str().ok_or_else(|| err("action must be string"))?;
    let value = value.clone();

    let action = match kind {
        "access" => {
            Action::Access(serde_yaml::from_value(value).map_err(|e| err(&e.to_string()))?)
        }
        "session" => {
            Action::Session(serde_yaml::from_value(value).map_err(|e| err(&e.to_string()))?)
        }
        "satellites" => {
            Action::Satellites(serde_yaml::from_value(value).map_err(|e| err(&e.to_string()))?)
        }
        "fix" => Action::Fix(serde_yaml::from_value(value).map_err(|e| err(&e.to_string()))?),
        _ => return Err(err(&format!("unknown action: {}", kind))),
    };

    Ok(Step { time, action })
}

/// Parses `T+<duration>` offsets such as `T+500ms` or `T+1m 30s`.
fn parse_time(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let rest = s
        .strip_prefix(['T', 't'])
        .ok_or_else(|| format!("expected T+<duration>, got '{}'", s))?;

    if rest.starts_with('-') {
        return Err("negative offsets are not allowed".into());
    }
    let rest = rest.strip_prefix('+').unwrap_or(rest).trim();
    if rest.is_empty() {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(rest).map_err(|e| e.to_string())
}
