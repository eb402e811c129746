use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const STATE_PREFIX: &str = "STATE ";
pub const LABELS_PREFIX: &str = "SELECTOR_LABELS";

/// Number of synthetic inputs shown when the peer has not reported any labels.
pub const DEFAULT_INPUT_COUNT: u32 = 4;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Attribute {
    Vol,
    Bal,
    Bri,
    Inp,
    Mute,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::Vol,
        Attribute::Bal,
        Attribute::Bri,
        Attribute::Inp,
        Attribute::Mute,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Vol => "VOL",
            Attribute::Bal => "BAL",
            Attribute::Bri => "BRI",
            Attribute::Inp => "INP",
            Attribute::Mute => "MUTE",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttribute(pub String);

impl fmt::Display for UnknownAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown attribute: {}", self.0)
    }
}

impl std::error::Error for UnknownAttribute {}

impl FromStr for Attribute {
    type Err = UnknownAttribute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Attribute::ALL
            .into_iter()
            .find(|a| a.as_str() == upper)
            .ok_or(UnknownAttribute(upper))
    }
}

/// Last reported device state, keyed by attribute name (`VOL`, `BAL`, ...).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct DeviceState(BTreeMap<String, String>);

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `STATE KEY=VALUE ...` line. Returns `None` when the prefix does not match.
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.strip_prefix(STATE_PREFIX)?;
        let mut out = BTreeMap::new();
        for token in body.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            out.insert(key.to_string(), value.to_string());
        }
        Some(Self(out))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn attr(&self, attr: Attribute) -> Option<&str> {
        self.get(attr.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn volume(&self) -> Option<i32> {
        self.attr(Attribute::Vol)?.parse().ok()
    }

    pub fn balance(&self) -> Option<i32> {
        self.attr(Attribute::Bal)?.parse().ok()
    }

    pub fn brightness(&self) -> Option<i32> {
        self.attr(Attribute::Bri)?.parse().ok()
    }

    pub fn input(&self) -> Option<u32> {
        self.attr(Attribute::Inp)?.parse().ok()
    }

    /// `MUTE` is reported as `0`/`1`; anything that is not numerically 1 reads as unmuted.
    pub fn muted(&self) -> Option<bool> {
        let raw = self.attr(Attribute::Mute)?;
        Some(raw.parse::<i64>().map(|v| v == 1).unwrap_or(false))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes back into a wire line. Known attributes come first in their usual order.
    pub fn to_line(&self) -> String {
        let mut line = String::from("STATE");
        for attr in Attribute::ALL {
            if let Some(v) = self.attr(attr) {
                line.push_str(&format!(" {attr}={v}"));
            }
        }
        for (k, v) in &self.0 {
            if k.parse::<Attribute>().is_ok() {
                continue;
            }
            line.push_str(&format!(" {k}={v}"));
        }
        line
    }
}

/// Input index (decimal string) to display label.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SelectorLabels(BTreeMap<String, String>);

impl SelectorLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `SELECTOR_LABELS INP1="..." ...` line. Returns `None` when the prefix does not
    /// match; a matching line with no recognizable entries yields an empty set.
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(LABELS_PREFIX) {
            return None;
        }
        Some(Self(scan_label_entries(line)))
    }

    pub fn get(&self, index: &str) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn insert(&mut self, index: impl Into<String>, label: impl Into<String>) {
        self.0.insert(index.into(), label.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries to present, sorted numerically. Empty sets fall back to `Input 1..4`, and empty
    /// labels fall back to `Input <n>`.
    pub fn display_entries(&self) -> Vec<(String, String)> {
        if self.0.is_empty() {
            return (1..=DEFAULT_INPUT_COUNT)
                .map(|i| (i.to_string(), format!("Input {i}")))
                .collect();
        }
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort_by(|a, b| numeric_key(a).cmp(&numeric_key(b)).then_with(|| a.cmp(b)));
        keys.into_iter()
            .map(|k| {
                let label = self.0.get(k).map(String::as_str).unwrap_or_default();
                let label = if label.is_empty() {
                    format!("Input {k}")
                } else {
                    label.to_string()
                };
                (k.clone(), label)
            })
            .collect()
    }

    pub fn to_line(&self) -> String {
        let mut line = String::from(LABELS_PREFIX);
        for (k, v) in self.numeric_entries() {
            line.push_str(&format!(" INP{k}=\"{v}\""));
        }
        line
    }

    fn numeric_entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> =
            self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        entries.sort_by(|a, b| numeric_key(a.0).cmp(&numeric_key(b.0)));
        entries
    }
}

fn numeric_key(index: &str) -> u64 {
    index.parse().unwrap_or(u64::MAX)
}

fn scan_label_entries(line: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let mut rest = line;
    while let Some(pos) = rest.find("INP") {
        let after = &rest[pos + 3..];
        match label_entry(after) {
            Some((index, text, consumed)) => {
                out.insert(index.to_string(), text.to_string());
                rest = &after[consumed..];
            }
            None => rest = after,
        }
    }
    out
}

// Matches `<digits>="<text>"` at the start of `s`.
fn label_entry(s: &str) -> Option<(&str, &str, usize)> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let tail = s[digits..].strip_prefix("=\"")?;
    let end = tail.find('"')?;
    Some((&s[..digits], &tail[..end], digits + 2 + end + 1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    State(DeviceState),
    Labels(SelectorLabels),
    Other,
}

/// Classifies one inbound line. Anything that fails both prefix checks is `Other`.
pub fn classify(line: &str) -> Inbound {
    let line = line.trim();
    if let Some(state) = DeviceState::parse(line) {
        return Inbound::State(state);
    }
    if let Some(labels) = SelectorLabels::parse(line) {
        return Inbound::Labels(labels);
    }
    Inbound::Other
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetState,
    GetSelectorLabels,
    Set { attr: Attribute, value: String },
}

impl Command {
    pub fn set(attr: Attribute, value: impl fmt::Display) -> Self {
        Command::Set {
            attr,
            value: value.to_string(),
        }
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetState => f.write_str("GET STATE"),
            Command::GetSelectorLabels => f.write_str("GET SELECTOR_LABELS"),
            Command::Set { attr, value } => write!(f, "SET {attr} {value}"),
        }
    }
}

/// Coalescing key of a `SET <ATTR> ...` line (upper-cased attribute), if any.
pub fn coalescing_key(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    if !verb.eq_ignore_ascii_case("SET") {
        return None;
    }
    parts.next().map(str::to_ascii_uppercase)
}

/// Normalizes a command as the bridge accepts it: `GET`/`SET` lines pass through and the short
/// form `VOL 30` becomes `SET VOL 30`. Returns `None` for anything else.
pub fn normalize_client_command(line: &str) -> Option<String> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }

    let upper = raw.to_ascii_uppercase();
    if upper.starts_with("GET ") || upper.starts_with("SET ") {
        return Some(raw.to_string());
    }

    let parts: Vec<&str> = raw.split_whitespace().collect();
    if let [key, value] = parts.as_slice() {
        if let Ok(attr) = key.parse::<Attribute>() {
            return Some(Command::set(attr, value).to_line());
        }
    }
    None
}
