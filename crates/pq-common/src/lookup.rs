//! Lookup outcomes for discovery queries.

use serde::{Deserialize, Serialize};

/// Result of a discovery query.
///
/// `NotFound` is a valid answer, not an error. `Ambiguous` is reported when a
/// tool lists several distinct candidates and there is no sound way to pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    Ambiguous(Vec<T>),
    NotFound,
}

impl<T> Lookup<T> {
    /// Whether this outcome ends the search (anything but `NotFound`).
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Lookup::NotFound)
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// The single match, if there is exactly one.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_found(&self) -> Option<&T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Ambiguous(values) => Lookup::Ambiguous(values.into_iter().map(f).collect()),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T: PartialEq> Lookup<T> {
    /// Collapse a list of candidates, dropping duplicates while keeping order.
    pub fn from_candidates<I: IntoIterator<Item = T>>(candidates: I) -> Self {
        let mut unique: Vec<T> = Vec::new();
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        match unique.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(unique.remove(0)),
            _ => Lookup::Ambiguous(unique),
        }
    }

    /// Whether `value` is the match or one of the ambiguous candidates.
    pub fn contains(&self, value: &T) -> bool {
        match self {
            Lookup::Found(found) => found == value,
            Lookup::Ambiguous(values) => values.contains(value),
            Lookup::NotFound => false,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidates() {
        assert_eq!(Lookup::<u32>::from_candidates(vec![]), Lookup::NotFound);
        assert_eq!(Lookup::from_candidates(vec![7]), Lookup::Found(7));
        assert_eq!(Lookup::from_candidates(vec![7, 7]), Lookup::Found(7));
        assert_eq!(
            Lookup::from_candidates(vec![7, 8, 7]),
            Lookup::Ambiguous(vec![7, 8])
        );
    }

    #[test]
    fn test_is_definitive() {
        assert!(Lookup::Found(1).is_definitive());
        assert!(Lookup::Ambiguous(vec![1, 2]).is_definitive());
        assert!(!Lookup::<u32>::NotFound.is_definitive());
    }

    #[test]
    fn test_contains() {
        assert!(Lookup::Found(3).contains(&3));
        assert!(Lookup::Ambiguous(vec![1, 3]).contains(&3));
        assert!(!Lookup::NotFound.contains(&3));
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&Lookup::Found(12)).unwrap(),
            r#"{"status":"found","value":12}"#
        );
        assert_eq!(
            serde_json::to_string(&Lookup::<u32>::NotFound).unwrap(),
            r#"{"status":"not_found"}"#
        );
        assert_eq!(
            serde_json::to_string(&Lookup::Ambiguous(vec![1, 2])).unwrap(),
            r#"{"status":"ambiguous","value":[1,2]}"#
        );
    }
}
