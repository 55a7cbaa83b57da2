//! Spec-checked calls built against a registered procedure.

use procdb_invocation::{Arg, ArgListBuilder, Caller, Host, Rgba, ReturnValues};

use crate::error::CallError;
use crate::pdb::Pdb;

/// A call being assembled for one procedure.
///
/// Obtained from [`Pdb::call`]. Each argument is checked against the
/// declared specs as it is added; the first problem is reported by
/// [`Call::run`] as a `CALLING_ERROR` without dispatching.
#[derive(Debug)]
pub struct Call<'a> {
	pdb: &'a Pdb,
	caller: Caller,
	name: String,
	builder: ArgListBuilder,
}

impl Pdb {
	/// Starts a call to `name`, using the specs of the record dispatch would try first.
	///
	/// Deprecated names resolve as they would during dispatch.
	pub fn call(&self, name: &str) -> Result<Call<'_>, CallError> {
		let not_found = || CallError::NotFound { name: name.to_string() };
		let list = match self.index.lookup(name) {
			Some(list) => list,
			None if self.compat_mode() != crate::CompatMode::Off => {
				let canonical = self.compat.resolve(name).ok_or_else(not_found)?;
				self.index.lookup(canonical).ok_or_else(not_found)?
			}
			None => return Err(not_found()),
		};
		let head = list.first().ok_or_else(not_found)?;
		Ok(Call {
			pdb: self,
			caller: Caller::Core,
			name: name.to_string(),
			builder: ArgListBuilder::new(head.args().clone()),
		})
	}
}

impl Call<'_> {
	/// Runs the call on behalf of `caller` instead of the core.
	pub fn caller(mut self, caller: Caller) -> Self {
		self.caller = caller;
		self
	}

	fn with(mut self, f: impl FnOnce(ArgListBuilder) -> ArgListBuilder) -> Self {
		self.builder = f(self.builder);
		self
	}

	pub fn arg(self, arg: Arg) -> Self {
		self.with(|b| b.push(arg))
	}

	pub fn int32(self, value: i32) -> Self {
		self.with(|b| b.int32(value))
	}

	pub fn int16(self, value: i16) -> Self {
		self.with(|b| b.int16(value))
	}

	pub fn int8(self, value: u8) -> Self {
		self.with(|b| b.int8(value))
	}

	/// Integer-like slot whose kind is taken from the next spec (handles, widths, status).
	pub fn int(self, value: i64) -> Self {
		self.with(|b| b.int(value))
	}

	pub fn float(self, value: f64) -> Self {
		self.with(|b| b.float(value))
	}

	pub fn string(self, value: impl Into<String>) -> Self {
		self.with(|b| b.string(value))
	}

	pub fn color(self, value: Rgba) -> Self {
		self.with(|b| b.color(value))
	}

	pub fn array_int32(self, values: impl Into<Vec<i32>>) -> Self {
		self.with(|b| b.array_int32(values))
	}

	pub fn array_bytes(self, values: impl Into<Vec<u8>>) -> Self {
		self.with(|b| b.array_bytes(values))
	}

	pub fn array_float(self, values: impl Into<Vec<f64>>) -> Self {
		self.with(|b| b.array_float(values))
	}

	pub fn array_string<I, S>(self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with(|b| b.array_string(values))
	}

	/// Finishes the argument list and dispatches.
	pub fn run(self) -> ReturnValues {
		match self.builder.finish() {
			Ok(args) => self.pdb.execute_as(self.caller, &self.name, &args),
			Err(source) => CallError::Build {
				procedure: self.name,
				source,
			}
			.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use procdb_invocation::{ArgKind, ProcDecl, ProcKind, Status};

	use super::*;
	use crate::config::PdbConfig;
	use crate::procedure::Procedure;

	fn sum_pdb() -> std::sync::Arc<Pdb> {
		let pdb = Pdb::new(PdbConfig::default());
		let decl = ProcDecl::new("array-sum", ProcKind::Internal)
			.arg("n", ArgKind::Int32, "count")
			.arg("values", ArgKind::Int32Array, "values")
			.ret("sum", ArgKind::Int32, "");
		pdb.register(
			Procedure::internal(decl, |_, args| {
				let sum = match &args[1] {
					Arg::Int32Array(values) => values.iter().sum(),
					_ => 0,
				};
				ReturnValues::success([Arg::Int32(sum)])
			})
			.unwrap(),
		);
		pdb
	}

	#[test]
	fn builder_call_fills_counts() {
		let pdb = sum_pdb();
		let result = pdb.call("array-sum").unwrap().array_int32(vec![1, 2, 3]).run();
		assert_eq!(result.values(), &[Arg::Int32(6)]);
	}

	#[test]
	fn builder_errors_become_calling_errors() {
		let pdb = sum_pdb();
		let result = pdb.call("array-sum").unwrap().string("nope").run();
		assert_eq!(result.status(), Status::CallingError);
		assert_eq!(
			result.error_message(),
			Some("procedure 'array-sum': argument #0 ('n') type mismatch: expected INT32, got STRING")
		);
	}

	#[test]
	fn unknown_name_fails_up_front() {
		let pdb = sum_pdb();
		assert!(matches!(pdb.call("array-product"), Err(CallError::NotFound { .. })));
	}
}
