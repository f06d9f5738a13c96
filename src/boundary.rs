//! Fault-normalizing wrapper around a native resource handle.
//!
//! A [`ClientBoundary`] exclusively owns one external handle (a vault client, a
//! document API connection, a page transport) and is the only way callers may
//! invoke it. Every failure mode is translated into the broker taxonomy: a
//! fault raised while producing a result is a [`BoundaryError::Sync`], a fault
//! resolved out of a pending operation is a [`BoundaryError::Async`]. The
//! boundary performs no I/O of its own; side effects are exactly those of the
//! supplied operation.

// self
use crate::{_prelude::*, error::BoundaryError};

/// Wraps an external resource handle and normalizes its failures.
pub struct ClientBoundary<H> {
	handle: H,
	target: &'static str,
}
impl<H> ClientBoundary<H> {
	/// Takes exclusive ownership of `handle`, tagging faults with `target`.
	pub fn new(handle: H, target: &'static str) -> Self {
		Self { handle, target }
	}

	/// Returns the target label attached to normalized faults.
	pub fn target(&self) -> &'static str {
		self.target
	}

	/// Executes a synchronous operation against the handle.
	///
	/// An `Err` returned by `op` is reported as [`BoundaryError::Sync`] with the
	/// native cause attached; a success is returned unchanged.
	pub fn invoke<T, E>(&self, op: impl FnOnce(&H) -> Result<T, E>) -> Result<T>
	where
		E: Into<BoxError>,
	{
		op(&self.handle)
			.map_err(|e| BoundaryError::Sync { context: self.target, source: e.into() }.into())
	}

	/// Executes an operation that yields a pending value against the handle.
	///
	/// A failure while producing the future is a [`BoundaryError::Sync`]; an
	/// `Err` resolved from awaiting it is a [`BoundaryError::Async`]. The
	/// resolved value is returned unchanged.
	pub async fn invoke_async<'a, T, Fut, E, F>(&'a self, op: F) -> Result<T>
	where
		F: FnOnce(&'a H) -> Result<Fut, E>,
		Fut: 'a + Future<Output = Result<T, E>>,
		E: Into<BoxError>,
	{
		let pending = op(&self.handle)
			.map_err(|e| Error::from(BoundaryError::Sync { context: self.target, source: e.into() }))?;

		pending
			.await
			.map_err(|e| BoundaryError::Async { context: self.target, source: e.into() }.into())
	}
}
impl<H> Debug for ClientBoundary<H> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBoundary").field("target", &self.target).finish()
	}
}
