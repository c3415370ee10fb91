//! Vote colors, round winners and the tie-breaking policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::InvalidVote;

/// The two options a voter can pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
        }
    }
}

impl FromStr for Color {
    type Err = InvalidVote;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            _ => Err(InvalidVote(s.to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome stamped on a round when it closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Red,
    Green,
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Tie => "tie",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a closed round's counters are turned into a [`Winner`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerRule {
    /// The strictly larger counter wins; equal counters are a tie.
    #[default]
    StrictMajority,
    /// Red needs a strict majority; everything else goes to green.
    GreenWinsTies,
}

impl WinnerRule {
    pub fn decide(&self, red_votes: u64, green_votes: u64) -> Winner {
        match self {
            Self::StrictMajority => {
                if red_votes > green_votes {
                    Winner::Red
                } else if green_votes > red_votes {
                    Winner::Green
                } else {
                    Winner::Tie
                }
            }
            Self::GreenWinsTies => {
                if red_votes > green_votes {
                    Winner::Red
                } else {
                    Winner::Green
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_majority_outcomes() {
        let rule = WinnerRule::StrictMajority;
        assert_eq!(rule.decide(3, 1), Winner::Red);
        assert_eq!(rule.decide(2, 5), Winner::Green);
        assert_eq!(rule.decide(4, 4), Winner::Tie);
        assert_eq!(rule.decide(0, 0), Winner::Tie);
    }

    #[test]
    fn green_wins_ties() {
        let rule = WinnerRule::GreenWinsTies;
        assert_eq!(rule.decide(3, 1), Winner::Red);
        assert_eq!(rule.decide(4, 4), Winner::Green);
        assert_eq!(rule.decide(0, 0), Winner::Green);
    }

    #[test]
    fn color_parsing_is_case_insensitive() {
        assert_eq!("red".parse::<Color>(), Ok(Color::Red));
        assert_eq!("GREEN".parse::<Color>(), Ok(Color::Green));
        assert_eq!(" Red ".parse::<Color>(), Ok(Color::Red));
    }

    #[test]
    fn unknown_color_is_rejected() {
        let err = "blue".parse::<Color>().unwrap_err();
        assert_eq!(err, InvalidVote("blue".to_string()));
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn rule_serializes_snake_case() {
        let json = serde_json::to_string(&WinnerRule::GreenWinsTies).unwrap();
        assert_eq!(json, "\"green_wins_ties\"");
        assert_eq!(WinnerRule::default(), WinnerRule::StrictMajority);
    }
}
