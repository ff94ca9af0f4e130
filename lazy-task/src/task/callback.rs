use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// One of the two channels a fork function settles through.
///
/// A `Callback` is cheap to clone; every clone calls the same function.
/// It may be invoked from any thread.
pub struct Callback<T>(Arc<dyn Fn(T) + Send + Sync>);

impl<T> Callback<T> {
    /// Wraps a function as a channel.
    pub fn new<C>(f: C) -> Self
    where
        C: Fn(T) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Delivers `value` through this channel.
    pub fn call(&self, value: T) {
        (self.0)(value)
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// The opaque value a fork function returns.
///
/// Only the effect that produced a handle knows what it holds (a timer, a
/// pair of inner handles, nothing at all). The matching cleanup function
/// receives it back and downcasts it.
#[derive(Default)]
pub struct Handle(Option<Box<dyn Any + Send>>);

impl Handle {
    /// A handle carrying nothing.
    pub fn none() -> Self {
        Self(None)
    }

    /// Wraps an arbitrary value.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    /// Whether this handle carries nothing.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Borrows the carried value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|value| value.downcast_ref())
    }

    /// Extracts the carried value if it is a `T`, or gives the handle back.
    pub fn downcast<T: Any>(self) -> Result<T, Handle> {
        match self.0 {
            Some(value) => value
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|value| Handle(Some(value))),
            None => Err(Handle::none()),
        }
    }
}

impl From<()> for Handle {
    fn from((): ()) -> Self {
        Self::none()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Handle(..)"),
            None => f.write_str("Handle(none)"),
        }
    }
}
