use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of widget kinds the dashboard hosts. Adding a widget is a
/// new variant plus its registry entries below; rendering and dispatch key
/// off this enum rather than scattered string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Sonic,
    Breaker,
    Todo,
    Brain,
    Timer,
    Dopamine,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 6] = [
        WidgetKind::Sonic,
        WidgetKind::Breaker,
        WidgetKind::Todo,
        WidgetKind::Brain,
        WidgetKind::Timer,
        WidgetKind::Dopamine,
    ];

    pub fn id(self) -> &'static str {
        match self {
            WidgetKind::Sonic => "sonic",
            WidgetKind::Breaker => "breaker",
            WidgetKind::Todo => "todo",
            WidgetKind::Brain => "brain",
            WidgetKind::Timer => "timer",
            WidgetKind::Dopamine => "dopamine",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WidgetKind::Sonic => "Sonic Shield",
            WidgetKind::Breaker => "Task Breaker",
            WidgetKind::Todo => "To-Do",
            WidgetKind::Brain => "Brain Dump",
            WidgetKind::Timer => "Timer",
            WidgetKind::Dopamine => "Dopamine Menu",
        }
    }

    /// Minimum grid span (columns, rows) the widget stays usable at.
    pub fn min_size(self) -> (i32, i32) {
        match self {
            WidgetKind::Brain => (4, 5),
            _ => (2, 5),
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for WidgetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown widget: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::WidgetKind;

    #[test]
    fn ids_round_trip_through_parse() {
        for kind in WidgetKind::ALL {
            let parsed: WidgetKind = kind.id().parse().expect("parse id");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn ids_round_trip_through_serde() {
        for kind in WidgetKind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.id()));
            let back: WidgetKind = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!("weather".parse::<WidgetKind>().is_err());
    }
}
