use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::IdentityError;

/// Separator placed between sorted identifiers before hashing.
pub const DELIMITER: &str = "|/|";

/// Number of identifiers a fingerprint is built from.
pub const INPUT_LEN: usize = 3;

/// Device fingerprint text: 32 or 16 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Fingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Fingerprint {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Exactly three identifier values. Order does not matter.
#[derive(Debug, Clone)]
pub struct FingerprintInput([String; INPUT_LEN]);

impl FingerprintInput {
    pub fn new(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self([a.into(), b.into(), c.into()])
    }

    /// Sorts, joins and hashes the identifiers.
    pub fn compute(&self, uppercase: bool, half: bool) -> Fingerprint {
        let mut ids: Vec<&str> = self.0.iter().map(String::as_str).collect();
        ids.sort_unstable();
        Fingerprint(md5_hex(&ids.join(DELIMITER), uppercase, half))
    }
}

impl TryFrom<Vec<String>> for FingerprintInput {
    type Error = IdentityError;

    fn try_from(ids: Vec<String>) -> Result<Self, Self::Error> {
        let found = ids.len();
        let ids: [String; INPUT_LEN] = ids
            .try_into()
            .map_err(|_| IdentityError::HashInputIncomplete { found })?;
        Ok(Self(ids))
    }
}

/// Canonical hash over exactly three identifiers.
pub fn compute(ids: [&str; INPUT_LEN], uppercase: bool, half: bool) -> Fingerprint {
    FingerprintInput::new(ids[0], ids[1], ids[2]).compute(uppercase, half)
}

/// MD5 of `text` as hex.
///
/// `half` keeps hex characters 8..24 of the encoded string. Downstream
/// consumers compare against values produced with exactly this slice.
pub fn md5_hex(text: &str, uppercase: bool, half: bool) -> String {
    let mut encoded = hex::encode(Md5::digest(text.as_bytes()));
    if uppercase {
        encoded.make_ascii_uppercase();
    }
    if half {
        encoded = encoded[8..24].to_string();
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALL_ID: &str = "4B49FF10-AAAA-1111-BBBB-222233334444";
    const PROCESSOR: &str = "GenuineIntelABC123";
    const MAC: &str = "00:1A:2B:3C:4D:5E";

    #[test]
    fn golden_value() {
        let fp = compute([INSTALL_ID, PROCESSOR, MAC], true, true);
        assert_eq!(fp, "0F8C51B9AF0A96C6");
    }

    #[test]
    fn golden_value_full_lowercase() {
        let fp = compute([INSTALL_ID, PROCESSOR, MAC], false, false);
        assert_eq!(fp, "3c469b4c0f8c51b9af0a96c6e00edbf1");
    }

    #[test]
    fn half_is_a_textual_slice_of_the_full_hex() {
        let full = compute([INSTALL_ID, PROCESSOR, MAC], true, false);
        let half = compute([INSTALL_ID, PROCESSOR, MAC], true, true);
        assert_eq!(&full.as_str()[8..24], half.as_str());
    }

    #[test]
    fn order_does_not_matter() {
        let abc = compute(["a", "b", "c"], false, false);
        for ids in [["b", "c", "a"], ["c", "a", "b"], ["c", "b", "a"], ["a", "c", "b"]] {
            assert_eq!(compute(ids, false, false), abc);
        }
        assert_eq!(abc, "e7134eaad07a4f729020bb353a528122");
    }

    #[test]
    fn length_and_case_contract() {
        let inputs = [["", "", ""], ["x", "y", "z"], [INSTALL_ID, PROCESSOR, MAC]];
        for ids in inputs {
            for uppercase in [true, false] {
                for half in [true, false] {
                    let fp = compute(ids, uppercase, half);
                    assert_eq!(fp.as_str().len(), if half { 16 } else { 32 });
                    let allowed = |c: char| {
                        c.is_ascii_digit()
                            || if uppercase {
                                ('A'..='F').contains(&c)
                            } else {
                                ('a'..='f').contains(&c)
                            }
                    };
                    assert!(fp.as_str().chars().all(allowed), "{fp}");
                }
            }
        }
    }

    #[test]
    fn two_identifiers_are_rejected() {
        let ids = vec![INSTALL_ID.to_string(), MAC.to_string()];
        let err = FingerprintInput::try_from(ids).unwrap_err();
        assert!(matches!(err, IdentityError::HashInputIncomplete { found: 2 }));
    }

    #[test]
    fn four_identifiers_are_rejected() {
        let ids = vec!["a".to_string(); 4];
        assert!(matches!(
            FingerprintInput::try_from(ids),
            Err(IdentityError::HashInputIncomplete { found: 4 })
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let fp = compute(["a", "b", "c"], true, true);
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{fp}\""));
    }
}
