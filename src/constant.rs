use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The mathematical constants whose decimal expansions can be trained.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Constant {
    #[default]
    Pi,
    E,
    Sqrt2,
    Phi,
}

impl Constant {
    pub const ALL: [Constant; 4] = [Constant::Pi, Constant::E, Constant::Sqrt2, Constant::Phi];

    /// Stable storage key, also used for the highest-index watermark.
    pub fn key(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
            Constant::Sqrt2 => "sqrt2",
            Constant::Phi => "phi",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Constant::Pi => "π",
            Constant::E => "e",
            Constant::Sqrt2 => "√2",
            Constant::Phi => "φ",
        }
    }

    /// Digits before the decimal point; never part of a practice sequence.
    pub fn integer_part(&self) -> &'static str {
        match self {
            Constant::Pi => "3",
            Constant::E => "2",
            Constant::Sqrt2 | Constant::Phi => "1",
        }
    }

    pub fn resource_name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi_digits",
            Constant::E => "e_digits",
            Constant::Sqrt2 => "sqrt2_digits",
            Constant::Phi => "phi_digits",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_key() {
        assert_eq!(Constant::Sqrt2.to_string(), "sqrt2");
        assert_eq!(Constant::Pi.to_string(), "pi");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Constant::Phi).unwrap(), "\"phi\"");
        let c: Constant = serde_json::from_str("\"e\"").unwrap();
        assert_eq!(c, Constant::E);
    }

    #[test]
    fn symbols_and_integer_parts() {
        assert_eq!(Constant::Pi.symbol(), "π");
        assert_eq!(Constant::Pi.integer_part(), "3");
        assert_eq!(Constant::Phi.integer_part(), "1");
    }
}
