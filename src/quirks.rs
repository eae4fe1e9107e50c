use std::fmt;
use std::str::FromStr;

/// Opt-in behaviours that differ from the reference machine.
///
/// The default reproduces the reference exactly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `SHR`/`SHL` shift by one bit instead of two
    pub shift_by_one: bool,
    /// `LD B, Vx` stores binary coded decimal digits instead of doing nothing
    pub store_bcd: bool,
}

impl FromStr for Quirks {
    type Err = String;
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let mut quirks = Self::default();
        for word in string.split(',') {
            let value = match word.trim() {
                "" => continue,
                "shift" => &mut quirks.shift_by_one,
                "bcd" => &mut quirks.store_bcd,
                _ => return Err(format!("Unknown quirk '{}'", word)),
            };
            if *value {
                return Err(format!("Cannot specify quirk '{}' twice", word));
            }
            *value = true;
        }
        Ok(quirks)
    }
}

impl fmt::Display for Quirks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quirks = [("shift", self.shift_by_one), ("bcd", self.store_bcd)];
        let mut has_any_quirk = false;
        for (name, value) in quirks {
            if !value {
                continue;
            }
            if has_any_quirk {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            has_any_quirk = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_words() {
        assert_eq!("".parse::<Quirks>(), Ok(Quirks::default()));
        assert_eq!(
            "shift".parse::<Quirks>(),
            Ok(Quirks {
                shift_by_one: true,
                store_bcd: false
            })
        );
        assert_eq!(
            "bcd, shift".parse::<Quirks>(),
            Ok(Quirks {
                shift_by_one: true,
                store_bcd: true
            })
        );
    }

    #[test]
    fn reject_bad_words() {
        assert!("shift,nope".parse::<Quirks>().unwrap_err().contains("Unknown quirk"));
        assert!("bcd,bcd".parse::<Quirks>().unwrap_err().contains("twice"));
    }

    #[test]
    fn display_round_trip() {
        let quirks: Quirks = "bcd,shift".parse().unwrap();
        assert_eq!(quirks.to_string(), "shift,bcd");
        assert_eq!(Quirks::default().to_string(), "");
    }
}
