use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Numeric identifier of an inverter register in Solis Cloud.
///
/// Register values always travel as strings, whatever their meaning.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Cid(pub i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_ok() {
        assert_eq!("636".parse::<Cid>().unwrap(), Cid(636));
        assert_eq!("-1".parse::<Cid>().unwrap(), Cid(-1));
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&Cid(103)).unwrap(), "103");
    }
}
