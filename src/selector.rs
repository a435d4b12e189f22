//! Cascading channel → server type → server number selection.
use std::fmt;

/// What a multi-select currently stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    None,
    All,
    Some(Vec<String>),
}

impl Selection {
    /// The single selected value, if exactly one is selected.
    pub fn single(&self) -> Option<&str> {
        match self {
            Selection::Some(values) if values.len() == 1 => Some(&values[0]),
            _ => None,
        }
    }

    pub fn is_all_or_many(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Some(values) => values.len() > 1,
            Selection::None => false,
        }
    }
}

/// Multi-select with an "all" option that excludes every other option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiSelect {
    options: Vec<String>,
    all: bool,
    selected: Vec<String>,
}

impl MultiSelect {
    pub fn new(options: Vec<String>) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Applies a change of the raw selection.
    ///
    /// Picking "all" clears every other option. Picking anything else clears "all".
    /// Unknown values are dropped.
    pub fn apply_change<I>(&mut self, all_selected: bool, selected: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.selected.clear();
        self.all = all_selected;

        if all_selected {
            return;
        }

        for value in selected.into_iter().map(Into::into) {
            if self.options.contains(&value) && !self.selected.contains(&value) {
                self.selected.push(value);
            }
        }
    }

    pub fn selection(&self) -> Selection {
        if self.all {
            Selection::All
        } else if self.selected.is_empty() {
            Selection::None
        } else {
            Selection::Some(self.selected.clone())
        }
    }
}

/// Where the server type list comes from, given the channel selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTypeSource {
    /// No channel chosen. The server type select stays disabled.
    Disabled,
    /// Server types of one channel.
    Channel(String),
    /// Every known server type.
    All,
}

pub fn server_type_source(channels: &Selection) -> ServerTypeSource {
    match channels {
        Selection::None => ServerTypeSource::Disabled,
        Selection::Some(values) if values.len() == 1 => ServerTypeSource::Channel(values[0].clone()),
        Selection::Some(_) | Selection::All => ServerTypeSource::All,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameNumberPlan {
    /// All or several server types selected. No range is needed.
    NotNeeded,
    Fetch { channel: String, server_type: String },
    /// Not enough selected yet.
    Unavailable,
}

pub fn game_number_plan(channels: &Selection, server_types: &Selection) -> GameNumberPlan {
    if server_types.is_all_or_many() {
        return GameNumberPlan::NotNeeded;
    }

    match (channels.single(), server_types.single()) {
        (Some(channel), Some(server_type)) => GameNumberPlan::Fetch {
            channel: channel.to_string(),
            server_type: server_type.to_string(),
        },
        _ => GameNumberPlan::Unavailable,
    }
}

/// Server number range shown next to the number input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRange {
    Empty,
    Single(String),
    Span { min: i64, max: i64 },
    Malformed,
}

/// Leading integer of `s`, ignoring trailing garbage (`"12abc"` is 12).
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['-', '+']));
    let digits_end = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_start);

    if digits_end == digits_start {
        return None;
    }

    s[..digits_end].parse().ok()
}

impl GameRange {
    pub fn summarize<S: AsRef<str>>(numbers: &[S]) -> Self {
        match numbers {
            [] => GameRange::Empty,
            [single] => GameRange::Single(single.as_ref().to_string()),
            many => {
                let parsed = many
                    .iter()
                    .filter_map(|n| leading_int(n.as_ref()))
                    .collect::<Vec<_>>();

                match (parsed.iter().min(), parsed.iter().max()) {
                    (Some(&min), Some(&max)) => GameRange::Span { min, max },
                    _ => GameRange::Malformed,
                }
            }
        }
    }
}

impl fmt::Display for GameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameRange::Empty => f.write_str("No servers available"),
            GameRange::Single(number) => write!(f, "Server range: {number}"),
            GameRange::Span { min, max } => write!(f, "Server range: [min {min} - max {max}]"),
            GameRange::Malformed => f.write_str("Malformed server data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(options: &[&str]) -> MultiSelect {
        MultiSelect::new(options.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn choosing_all_clears_others() {
        let mut channels = select(&["cn", "tw", "kr"]);

        channels.apply_change(false, ["cn", "tw"]);
        assert_eq!(
            channels.selection(),
            Selection::Some(vec![String::from("cn"), String::from("tw")])
        );

        channels.apply_change(true, ["cn", "tw"]);
        assert_eq!(channels.selection(), Selection::All);
    }

    #[test]
    fn choosing_other_clears_all() {
        let mut channels = select(&["cn", "tw"]);
        channels.apply_change(true, Vec::<String>::new());

        channels.apply_change(false, ["tw", "unknown", "tw"]);

        assert_eq!(channels.selection(), Selection::Some(vec![String::from("tw")]));
    }

    #[test]
    fn server_types_follow_channel_selection() {
        assert_eq!(server_type_source(&Selection::None), ServerTypeSource::Disabled);
        assert_eq!(
            server_type_source(&Selection::Some(vec![String::from("cn")])),
            ServerTypeSource::Channel(String::from("cn"))
        );
        assert_eq!(
            server_type_source(&Selection::Some(vec![String::from("cn"), String::from("tw")])),
            ServerTypeSource::All
        );
        assert_eq!(server_type_source(&Selection::All), ServerTypeSource::All);
    }

    #[test]
    fn game_numbers_need_single_channel_and_type() {
        let cn = Selection::Some(vec![String::from("cn")]);
        let game = Selection::Some(vec![String::from("Game")]);

        assert_eq!(
            game_number_plan(&cn, &game),
            GameNumberPlan::Fetch {
                channel: String::from("cn"),
                server_type: String::from("Game"),
            }
        );
        assert_eq!(game_number_plan(&cn, &Selection::All), GameNumberPlan::NotNeeded);
        assert_eq!(game_number_plan(&Selection::All, &game), GameNumberPlan::Unavailable);
        assert_eq!(
            game_number_plan(&cn, &Selection::None),
            GameNumberPlan::Unavailable
        );
    }

    #[test]
    fn range_summary() {
        assert_eq!(GameRange::summarize::<&str>(&[]), GameRange::Empty);
        assert_eq!(GameRange::summarize(&["7"]), GameRange::Single(String::from("7")));
        assert_eq!(
            GameRange::summarize(&["12", "3", "40x", "abc"]),
            GameRange::Span { min: 3, max: 40 }
        );
        assert_eq!(GameRange::summarize(&["a", "b"]), GameRange::Malformed);
        assert_eq!(
            GameRange::Span { min: 1, max: 9 }.to_string(),
            "Server range: [min 1 - max 9]"
        );
    }

    #[test]
    fn leading_int_is_lenient() {
        assert_eq!(leading_int(" 15"), Some(15));
        assert_eq!(leading_int("-2srv"), Some(-2));
        assert_eq!(leading_int("+"), None);
        assert_eq!(leading_int("x1"), None);
    }
}
