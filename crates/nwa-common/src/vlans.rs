//! VLAN range sets
//!
//! [`VlanRanges`] is quite liberal in what it accepts. Overlapping ranges,
//! ranges whose start is greater than their stop and ranges with extraneous
//! whitespace are all accepted and normalized to one canonical value:
//!
//! ```
//! use nwa_common::VlanRanges;
//!
//! let a: VlanRanges = "4,10-12,11-14".parse().unwrap();
//! let b: VlanRanges = "4,  11 - 14, 10-  12".parse().unwrap();
//! let c = VlanRanges::from_vlans([4, 10, 11, 12, 13, 14]).unwrap();
//! let d = VlanRanges::from_definitions(&[vec![4], vec![10, 12], vec![11, 14]]).unwrap();
//!
//! assert_eq!(a, b);
//! assert_eq!(b, c);
//! assert_eq!(c, d);
//! assert_eq!(a.to_string(), "4,10-14");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{BitAnd, BitOr, BitXor, RangeInclusive, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lowest valid VLAN id
pub const VLAN_MIN: i64 = 0;

/// Highest valid VLAN id
pub const VLAN_MAX: i64 = 4096;

/// Pattern published in the JSON schema of a VLAN range string
pub const VLAN_RANGE_JSON_SCHEMA_REGEX: &str = "^([1-4][0-9]{0,3}(-[1-4][0-9]{0,3})?,?)+$";

/// Errors raised while constructing VLAN ranges
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VlanError {
    #[error("{0} could not be converted to a VlanRanges object.")]
    Parse(String),

    #[error("{0} is out of range (0-4096).")]
    OutOfRange(String),

    #[error("Expected 1 or 2 element list for range definition. Got {0} element list instead.")]
    InvalidDefinition(usize),
}

/// Convert a sorted iterator of integers without duplicates into ranges of
/// consecutive values.
///
/// ```
/// use nwa_common::vlans::to_ranges;
///
/// let ranges = to_ranges([2, 3, 4, 5, 7, 8, 9, 45, 46, 47, 49, 51, 53, 54, 55]);
/// assert_eq!(ranges, vec![2..=5, 7..=9, 45..=47, 49..=49, 51..=51, 53..=55]);
/// ```
pub fn to_ranges<I>(values: I) -> Vec<RangeInclusive<i64>>
where
    I: IntoIterator<Item = i64>,
{
    let mut ranges = Vec::new();
    let mut current: Option<(i64, i64)> = None;

    for value in values {
        current = match current {
            Some((start, stop)) if value == stop + 1 => Some((start, value)),
            Some((start, stop)) => {
                ranges.push(start..=stop);
                Some((value, value))
            }
            None => Some((value, value)),
        };
    }
    if let Some((start, stop)) = current {
        ranges.push(start..=stop);
    }
    ranges
}

/// Expand range definitions into a sorted and deduplicated list of values.
///
/// A definition is either a one element slice (an individual value) or a two
/// element slice (a range whose stop is inclusive or exclusive depending on
/// `inclusive`).
///
/// ```
/// use nwa_common::vlans::expand_ranges;
///
/// assert_eq!(expand_ranges(&[vec![1], vec![2], vec![10, 12]], false).unwrap(), vec![1, 2, 10, 11]);
/// assert_eq!(expand_ranges(&[vec![100], vec![1, 4]], true).unwrap(), vec![1, 2, 3, 4, 100]);
/// assert!(expand_ranges(&[Vec::<i64>::new()], false).is_err());
/// ```
pub fn expand_ranges<D>(definitions: &[D], inclusive: bool) -> Result<Vec<i64>, VlanError>
where
    D: AsRef<[i64]>,
{
    let mut values = BTreeSet::new();
    for definition in definitions {
        match definition.as_ref() {
            [value] => {
                values.insert(*value);
            }
            [start, stop] => {
                let stop = if inclusive { *stop } else { *stop - 1 };
                values.extend(*start..=stop);
            }
            other => return Err(VlanError::InvalidDefinition(other.len())),
        }
    }
    Ok(values.into_iter().collect())
}

/// Canonical, immutable set of VLAN ids.
///
/// Internally a sorted list of non-overlapping, non-adjacent inclusive ranges.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct VlanRanges {
    ranges: Vec<(u16, u16)>,
}

impl VlanRanges {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single VLAN
    pub fn from_vlan(vlan: i64) -> Result<Self, VlanError> {
        Self::from_definitions(&[[vlan]])
    }

    /// Create a set from individual VLAN ids in any order
    pub fn from_vlans<I>(vlans: I) -> Result<Self, VlanError>
    where
        I: IntoIterator<Item = i64>,
    {
        let definitions: Vec<[i64; 1]> = vlans.into_iter().map(|v| [v]).collect();
        Self::from_definitions(&definitions)
    }

    /// Create a set from inclusive `(start, stop)` tuples
    pub fn from_tuples(tuples: &[(i64, i64)]) -> Result<Self, VlanError> {
        let definitions: Vec<[i64; 2]> = tuples.iter().map(|&(a, b)| [a, b]).collect();
        Self::from_definitions(&definitions)
    }

    /// Create a set from one or two element definitions with inclusive stops
    pub fn from_definitions<D>(definitions: &[D]) -> Result<Self, VlanError>
    where
        D: AsRef<[i64]>,
    {
        // Bounds are checked before expansion so that a bogus definition such
        // as [0, 10^12] fails fast instead of materializing every value.
        for definition in definitions {
            let (low, high) = match definition.as_ref() {
                [value] => (*value, *value),
                [start, stop] if start <= stop => (*start, *stop),
                [_, _] => continue,
                other => return Err(VlanError::InvalidDefinition(other.len())),
            };
            if low < VLAN_MIN || high > VLAN_MAX {
                let offending = if low == high {
                    low.to_string()
                } else {
                    format!("{}-{}", low, high)
                };
                return Err(VlanError::OutOfRange(offending));
            }
        }

        let values = expand_ranges(definitions, true)?;
        let ranges = to_ranges(values)
            .into_iter()
            .map(|r| (*r.start() as u16, *r.end() as u16))
            .collect();
        Ok(Self { ranges })
    }

    fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        let ranges = to_ranges(values.into_iter().map(i64::from))
            .into_iter()
            .map(|r| (*r.start() as u16, *r.end() as u16))
            .collect();
        Self { ranges }
    }

    fn to_set(&self) -> BTreeSet<u16> {
        self.iter().collect()
    }

    /// Ranges as inclusive `(start, stop)` tuples
    ///
    /// ```
    /// use nwa_common::VlanRanges;
    ///
    /// let vr: VlanRanges = "10 - 12, 8".parse().unwrap();
    /// assert_eq!(vr.to_list_of_tuples(), vec![(8, 8), (10, 12)]);
    /// ```
    pub fn to_list_of_tuples(&self) -> Vec<(u16, u16)> {
        self.ranges.clone()
    }

    pub fn contains(&self, vlan: i64) -> bool {
        self.ranges
            .iter()
            .any(|&(start, stop)| i64::from(start) <= vlan && vlan <= i64::from(stop))
    }

    /// Iterate over the VLAN ids in ascending order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ranges: self.ranges.iter(),
            current: None,
        }
    }

    /// Number of VLANs in the set
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(start, stop)| usize::from(stop - start) + 1)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_single_vlan(&self) -> bool {
        matches!(self.ranges.as_slice(), [(start, stop)] if start == stop)
    }

    pub fn is_disjoint(&self, other: &VlanRanges) -> bool {
        self.to_set().is_disjoint(&other.to_set())
    }

    pub fn is_subset(&self, other: &VlanRanges) -> bool {
        self.to_set().is_subset(&other.to_set())
    }

    /// Union of this set with all of `others`
    pub fn union<'a, I>(&self, others: I) -> VlanRanges
    where
        I: IntoIterator<Item = &'a VlanRanges>,
    {
        others
            .into_iter()
            .fold(self.clone(), |acc, other| &acc | other)
    }

    /// JSON schema fragment describing the string representation
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "format": "vlan",
            "pattern": VLAN_RANGE_JSON_SCHEMA_REGEX,
            "examples": ["345", "20-23,45,50-100"],
        })
    }
}

/// Iterator over the VLAN ids of a [`VlanRanges`]
pub struct Iter<'a> {
    ranges: std::slice::Iter<'a, (u16, u16)>,
    current: Option<RangeInclusive<u16>>,
}

impl Iterator for Iter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            if let Some(vlan) = self.current.as_mut().and_then(|r| r.next()) {
                return Some(vlan);
            }
            let &(start, stop) = self.ranges.next()?;
            self.current = Some(start..=stop);
        }
    }
}

impl<'a> IntoIterator for &'a VlanRanges {
    type Item = u16;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl FromStr for VlanRanges {
    type Err = VlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut definitions = Vec::new();
        for segment in s.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let definition = segment
                .split('-')
                .map(|part| part.trim().parse::<i64>())
                .collect::<Result<Vec<i64>, _>>()
                .map_err(|_| VlanError::Parse(s.to_string()))?;
            definitions.push(definition);
        }

        Self::from_definitions(&definitions).map_err(|e| match e {
            VlanError::OutOfRange(_) => VlanError::OutOfRange(s.to_string()),
            VlanError::InvalidDefinition(_) => VlanError::Parse(s.to_string()),
            other => other,
        })
    }
}

impl TryFrom<&str> for VlanRanges {
    type Error = VlanError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<i64> for VlanRanges {
    type Error = VlanError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        VlanRanges::from_vlan(value)
    }
}

impl Display for VlanRanges {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|&(start, stop)| {
                if start == stop {
                    start.to_string()
                } else {
                    format!("{}-{}", start, stop)
                }
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl Debug for VlanRanges {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VlanRanges({:?})", self.ranges)
    }
}

/// Subset ordering: `a < b` when `a` is a proper subset of `b`.
impl PartialOrd for VlanRanges {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.is_subset(other) {
            Some(Ordering::Less)
        } else if other.is_subset(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl BitAnd for &VlanRanges {
    type Output = VlanRanges;

    fn bitand(self, rhs: &VlanRanges) -> VlanRanges {
        VlanRanges::from_values(self.to_set().intersection(&rhs.to_set()).copied())
    }
}

impl BitOr for &VlanRanges {
    type Output = VlanRanges;

    fn bitor(self, rhs: &VlanRanges) -> VlanRanges {
        VlanRanges::from_values(self.to_set().union(&rhs.to_set()).copied())
    }
}

impl BitXor for &VlanRanges {
    type Output = VlanRanges;

    fn bitxor(self, rhs: &VlanRanges) -> VlanRanges {
        VlanRanges::from_values(self.to_set().symmetric_difference(&rhs.to_set()).copied())
    }
}

impl Sub for &VlanRanges {
    type Output = VlanRanges;

    fn sub(self, rhs: &VlanRanges) -> VlanRanges {
        VlanRanges::from_values(self.to_set().difference(&rhs.to_set()).copied())
    }
}

impl Sub<u16> for &VlanRanges {
    type Output = VlanRanges;

    fn sub(self, vlan: u16) -> VlanRanges {
        VlanRanges::from_values(self.iter().filter(|&v| v != vlan))
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp for VlanRanges {
            type Output = VlanRanges;

            fn $method(self, rhs: VlanRanges) -> VlanRanges {
                (&self).$method(&rhs)
            }
        }
    };
}

forward_owned_binop!(BitAnd, bitand);
forward_owned_binop!(BitOr, bitor);
forward_owned_binop!(BitXor, bitxor);
forward_owned_binop!(Sub, sub);

impl Serialize for VlanRanges {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VlanRangesInput {
    Text(String),
    Single(i64),
    Vlans(Vec<i64>),
    Definitions(Vec<Vec<i64>>),
}

impl<'de> Deserialize<'de> for VlanRanges {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let result = match VlanRangesInput::deserialize(deserializer)? {
            VlanRangesInput::Text(s) => s.parse(),
            VlanRangesInput::Single(v) => VlanRanges::from_vlan(v),
            VlanRangesInput::Vlans(vs) => VlanRanges::from_vlans(vs),
            VlanRangesInput::Definitions(defs) => VlanRanges::from_definitions(&defs),
        };
        result.map_err(serde::de::Error::custom)
    }
}
