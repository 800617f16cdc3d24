//! # Container Handles
//!
//! A frame either owns its stack/memory/storage or holds a shared handle to
//! the nearest ancestor that owns them.

use crate::errors::VmError;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Ownership-tagged handle to a frame container.
///
/// `Owned` is the only strong reference; `Shared` handles are downgraded from
/// it, so a shared handle can never keep a popped owner's container alive.
pub enum Resource<T> {
    /// Frame-private container.
    Owned(Rc<RefCell<T>>),
    /// Container owned by an ancestor frame.
    Shared(Weak<RefCell<T>>),
}

impl<T> Resource<T> {
    /// Wraps a freshly allocated container.
    pub fn owned(value: T) -> Self {
        Self::Owned(Rc::new(RefCell::new(value)))
    }

    /// Returns a shared handle to the same container.
    #[must_use]
    pub fn share(&self) -> Self {
        match self {
            Self::Owned(rc) => Self::Shared(Rc::downgrade(rc)),
            Self::Shared(weak) => Self::Shared(weak.clone()),
        }
    }

    /// Returns true if this handle owns the container.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Returns true if both handles refer to the same container.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.upgrade(), other.upgrade()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// Borrows the container immutably.
    ///
    /// # Errors
    ///
    /// Returns `DanglingHandle` if the owner is gone, `Internal` if the
    /// container is already mutably borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, VmError> {
        let rc = self.live()?;
        let guard = rc
            .try_borrow()
            .map_err(|_| VmError::Internal(format!("{} is mutably borrowed", short_name::<T>())))?;
        Ok(f(&guard))
    }

    /// Borrows the container mutably.
    ///
    /// # Errors
    ///
    /// Returns `DanglingHandle` if the owner is gone, `Internal` if the
    /// container is already borrowed.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, VmError> {
        let rc = self.live()?;
        let mut guard = rc
            .try_borrow_mut()
            .map_err(|_| VmError::Internal(format!("{} is already borrowed", short_name::<T>())))?;
        Ok(f(&mut guard))
    }

    fn upgrade(&self) -> Option<Rc<RefCell<T>>> {
        match self {
            Self::Owned(rc) => Some(Rc::clone(rc)),
            Self::Shared(weak) => weak.upgrade(),
        }
    }

    fn live(&self) -> Result<Rc<RefCell<T>>, VmError> {
        self.upgrade()
            .ok_or(VmError::DanglingHandle(short_name::<T>()))
    }
}

fn short_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned(_) => write!(f, "Owned<{}>", short_name::<T>()),
            Self::Shared(weak) if weak.strong_count() == 0 => {
                write!(f, "Shared<{}>(dangling)", short_name::<T>())
            }
            Self::Shared(_) => write!(f, "Shared<{}>", short_name::<T>()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
