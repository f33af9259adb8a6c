use serde::{Deserialize, Deserializer};

/// One field of a partial update.
///
/// Use with `#[serde(default)]`: an absent key stays `Unset`, `null`
/// becomes `Null` and any other value becomes `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Set(T),
    Null,
}

// Not derived: `Unset` needs no `T: Default`.
impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Set(v),
            None => Patch::Null,
        })
    }
}
