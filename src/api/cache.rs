//! Single-slot memoization for one entity payload.

use super::ApiError;

/// Holds at most one fetched value. Owned by the entity handle; not shared, not thread-safe.
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
    value: Option<T>,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> EntityCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, calling `fetch` first when empty or when `force_refresh` is set.
    ///
    /// A failed refresh leaves the previous value in place.
    pub fn get_or_fetch<F>(&mut self, force_refresh: bool, fetch: F) -> Result<&T, ApiError>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let value = match self.value.take() {
            Some(cached) if !force_refresh => cached,
            previous => match fetch() {
                Ok(fresh) => fresh,
                Err(e) => {
                    self.value = previous;
                    return Err(e);
                }
            },
        };
        Ok(self.value.insert(value))
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }
}
