//! Name resolution, type checking and pass-through dispatch.

use procdb_invocation::{Arg, ArgList, CallContext, Caller, Deprecation, ReturnValues, Status};
use tracing::{debug, error, warn};

use crate::compat::CompatMode;
use crate::error::CallError;
use crate::index::ProcList;
use crate::pdb::Pdb;
use crate::procedure::Procedure;

impl Pdb {
	/// Dispatches `name` as the core caller.
	///
	/// Always returns a result whose slot 0 is a status; failures are never
	/// raised any other way.
	pub fn execute(&self, name: &str, args: &ArgList) -> ReturnValues {
		self.dispatch(Caller::Core, name, args)
	}

	pub(crate) fn dispatch(&self, caller: Caller, requested: &str, args: &ArgList) -> ReturnValues {
		let Some((candidates, notice)) = self.resolve(requested) else {
			debug!(name = requested, ?caller, "procedure not found");
			return CallError::NotFound {
				name: requested.to_string(),
			}
			.into();
		};

		let total = candidates.len();
		for (pos, procedure) in candidates.iter().enumerate() {
			if let Err(err) = check_args(procedure, args) {
				debug!(name = procedure.name(), error = %err, "argument check failed");
				return err.into();
			}

			debug!(name = procedure.name(), id = %procedure.id(), candidate = pos, ?caller, "dispatch");
			let ctx = CallContext::new(self, caller, procedure.name());
			let result = match procedure.backend().run(&ctx, args) {
				Ok(values) => check_returns(procedure, values),
				Err(err) => {
					error!(name = procedure.name(), error = %err, "transport failure");
					ReturnValues::execution_error(format!("procedure '{}': {err}", procedure.name()))
				}
			};

			if result.status() == Status::PassThrough && pos + 1 < total {
				debug!(name = procedure.name(), "pass-through, trying next registration");
				continue;
			}
			return match notice {
				Some(notice) => result.with_deprecation(notice),
				None => result,
			};
		}

		error!(name = requested, "registry entry with no records");
		ReturnValues::execution_error(format!("procedure '{requested}': no registered implementation"))
	}

	/// Exact lookup, then the compat fallback when the mode allows it.
	fn resolve(&self, requested: &str) -> Option<(ProcList, Option<Deprecation>)> {
		if let Some(list) = self.index.lookup(requested) {
			return Some((list, None));
		}

		let mode = self.compat_mode();
		if mode == CompatMode::Off {
			return None;
		}
		let canonical = self.compat.resolve(requested)?;
		let list = self.index.lookup(canonical)?;
		let notice = (mode == CompatMode::Warn).then(|| {
			warn!(requested, canonical, "call through deprecated procedure name");
			Deprecation {
				requested: requested.to_string(),
				canonical: canonical.to_string(),
			}
		});
		Some((list, notice))
	}
}

fn check_args(procedure: &Procedure, args: &[Arg]) -> Result<(), CallError> {
	let specs = procedure.args();
	if specs.len() != args.len() {
		return Err(CallError::ArgCount {
			procedure: procedure.name().to_string(),
			expected: specs.len(),
			got: args.len(),
		});
	}
	for (index, (spec, arg)) in specs.iter().zip(args).enumerate() {
		if spec.kind != arg.kind() {
			return Err(CallError::TypeMismatch {
				procedure: procedure.name().to_string(),
				index,
				arg: spec.name.clone(),
				expected: spec.kind,
				got: arg.kind(),
			});
		}
	}
	procdb_invocation::list::check_pairing(args).map_err(|source| CallError::Pairing {
		procedure: procedure.name().to_string(),
		source,
	})
}

/// Demotes a `SUCCESS` result whose values do not fit the declared return specs.
fn check_returns(procedure: &Procedure, values: ReturnValues) -> ReturnValues {
	if !values.is_success() {
		return values;
	}
	let specs = procedure.returns();
	let got = values.values();
	let problem = if specs.len() != got.len() {
		Some(format!("returned {} values, expected {}", got.len(), specs.len()))
	} else if let Some((index, (spec, arg))) = specs.iter().zip(got).enumerate().find(|(_, (spec, arg))| spec.kind != arg.kind()) {
		Some(format!(
			"return value #{index} ('{}') type mismatch: expected {}, got {}",
			spec.name,
			spec.kind,
			arg.kind()
		))
	} else {
		procdb_invocation::list::check_pairing(got).err().map(|err| format!("return values: {err}"))
	};

	match problem {
		Some(problem) => {
			error!(name = procedure.name(), %problem, "malformed return values");
			ReturnValues::execution_error(format!("procedure '{}': {problem}", procedure.name()))
		}
		None => values,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::thread;

	use procdb_invocation::{ArgKind, Backend, Host, ProcDecl, ProcKind, TransportError};

	use super::*;
	use crate::config::PdbConfig;

	fn width_decl() -> ProcDecl {
		ProcDecl::new("image-get-width", ProcKind::Internal).ret("width", ArgKind::Int32, "Width in pixels")
	}

	fn counted(name: &str, status: Status, calls: Arc<AtomicUsize>) -> Procedure {
		Procedure::internal(ProcDecl::new(name, ProcKind::Internal), move |_, _| {
			calls.fetch_add(1, Ordering::SeqCst);
			ReturnValues::status_only(status)
		})
		.unwrap()
	}

	#[test]
	fn image_get_width_scenario() {
		let pdb = Pdb::new(PdbConfig::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let seen = calls.clone();
		pdb.register(
			Procedure::internal(width_decl(), move |_, _| {
				seen.fetch_add(1, Ordering::SeqCst);
				ReturnValues::success([Arg::Int32(640)])
			})
			.unwrap(),
		);

		let ok = pdb.execute("image-get-width", &ArgList::new());
		assert_eq!(ok.status(), Status::Success);
		assert_eq!(ok.values(), &[Arg::Int32(640)]);

		let spurious = pdb.execute("image-get-width", &vec![Arg::Int32(42)].into());
		assert_eq!(spurious.status(), Status::CallingError);
		assert_eq!(
			spurious.error_message(),
			Some("procedure 'image-get-width': expected 0 arguments, got 1")
		);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn kind_mismatch_names_index_and_both_kinds() {
		let pdb = Pdb::new(PdbConfig::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let seen = calls.clone();
		let decl = ProcDecl::new("layer-set-offsets", ProcKind::Internal)
			.arg("layer", ArgKind::Layer, "The layer")
			.arg("offx", ArgKind::Int32, "X offset");
		pdb.register(
			Procedure::internal(decl, move |_, _| {
				seen.fetch_add(1, Ordering::SeqCst);
				ReturnValues::success([])
			})
			.unwrap(),
		);

		let result = pdb.execute("layer-set-offsets", &vec![Arg::Layer(1), Arg::Float(3.0)].into());
		assert_eq!(result.status(), Status::CallingError);
		assert_eq!(
			result.error_message(),
			Some("procedure 'layer-set-offsets': argument #1 ('offx') type mismatch: expected INT32, got FLOAT")
		);

		let handle_swap = pdb.execute("layer-set-offsets", &vec![Arg::Channel(1), Arg::Int32(3)].into());
		assert_eq!(handle_swap.status(), Status::CallingError);
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn unpaired_array_is_a_calling_error() {
		let pdb = Pdb::new(PdbConfig::default());
		let decl = ProcDecl::new("sum", ProcKind::Internal)
			.arg("n", ArgKind::Int32, "count")
			.arg("values", ArgKind::Int32Array, "values");
		pdb.register(Procedure::internal(decl, |_, _| ReturnValues::success([])).unwrap());

		let result = pdb.execute("sum", &vec![Arg::Int32(3), Arg::int32_array(vec![1])].into());
		assert_eq!(result.status(), Status::CallingError);
	}

	#[test]
	fn not_found_uses_requested_name() {
		let pdb = Pdb::new(PdbConfig::default());
		let result = pdb.execute("no-such-thing", &ArgList::new());
		assert_eq!(result.status(), Status::CallingError);
		assert_eq!(result.error_message(), Some("procedure 'no-such-thing' not found"));
	}

	#[test]
	fn pass_through_falls_to_next_registration() {
		let pdb = Pdb::new(PdbConfig::default());
		let older = Arc::new(AtomicUsize::new(0));
		let newer = Arc::new(AtomicUsize::new(0));
		pdb.register(counted("file-load", Status::Success, older.clone()));
		pdb.register(counted("file-load", Status::PassThrough, newer.clone()));

		let result = pdb.execute("file-load", &ArgList::new());
		assert_eq!(result.status(), Status::Success);
		assert_eq!(newer.load(Ordering::SeqCst), 1);
		assert_eq!(older.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn all_pass_through_returns_last_result() {
		let pdb = Pdb::new(PdbConfig::default());
		let calls = Arc::new(AtomicUsize::new(0));
		for label in ["older", "newer"] {
			let calls = calls.clone();
			let decl = ProcDecl::new("decline", ProcKind::Internal);
			pdb.register(
				Procedure::internal(decl, move |_, _| {
					calls.fetch_add(1, Ordering::SeqCst);
					ReturnValues::from_slots(vec![Arg::Status(Status::PassThrough), Arg::string(label)].into()).unwrap()
				})
				.unwrap(),
			);
		}

		let result = pdb.execute("decline", &ArgList::new());
		assert_eq!(result.status(), Status::PassThrough);
		assert_eq!(result.error_message(), Some("older"));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn non_pass_through_stops_the_chain() {
		let pdb = Pdb::new(PdbConfig::default());
		let older = Arc::new(AtomicUsize::new(0));
		pdb.register(counted("stop", Status::Success, older.clone()));
		pdb.register(counted("stop", Status::Cancel, Arc::new(AtomicUsize::new(0))));

		assert_eq!(pdb.execute("stop", &ArgList::new()).status(), Status::Cancel);
		assert_eq!(older.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn unregistering_last_record_makes_name_unknown() {
		let pdb = Pdb::new(PdbConfig::default());
		let id = pdb.register(counted("ephemeral", Status::Success, Arc::new(AtomicUsize::new(0))));
		assert!(pdb.unregister("ephemeral", id));
		let result = pdb.execute("ephemeral", &ArgList::new());
		assert_eq!(result.error_message(), Some("procedure 'ephemeral' not found"));
	}

	fn drawable_delete(pdb: &Pdb) {
		let decl = ProcDecl::new("drawable-delete", ProcKind::Internal).arg("drawable", ArgKind::Drawable, "The drawable");
		pdb.register(Procedure::internal(decl, |_, _| ReturnValues::success([])).unwrap());
	}

	#[test]
	fn compat_off_hides_deprecated_names() {
		let pdb = Pdb::new(PdbConfig::default());
		drawable_delete(&pdb);
		let result = pdb.execute("channel-delete", &vec![Arg::Drawable(5)].into());
		assert_eq!(result.status(), Status::CallingError);
		assert_eq!(result.error_message(), Some("procedure 'channel-delete' not found"));
		assert_eq!(pdb.lookup_compat("channel-delete"), Some("drawable-delete"));
	}

	#[test]
	fn compat_on_remaps_silently() {
		let pdb = Pdb::new(PdbConfig::default().with_compat_mode(CompatMode::On));
		drawable_delete(&pdb);
		let result = pdb.execute("channel-delete", &vec![Arg::Drawable(5)].into());
		assert_eq!(result.status(), Status::Success);
		assert!(result.deprecation().is_none());
	}

	#[test]
	fn compat_warn_attaches_notice() {
		let pdb = Pdb::new(PdbConfig::default().with_compat_mode(CompatMode::Warn));
		drawable_delete(&pdb);
		let result = pdb.execute("channel-delete", &vec![Arg::Drawable(5)].into());
		assert_eq!(result.status(), Status::Success);
		assert_eq!(result.slots().len(), 1);
		let notice = result.deprecation().expect("deprecation notice");
		assert_eq!(notice.requested, "channel-delete");
		assert_eq!(notice.canonical, "drawable-delete");
	}

	#[test]
	fn compat_does_not_translate_shapes() {
		let pdb = Pdb::new(PdbConfig::default().with_compat_mode(CompatMode::On));
		drawable_delete(&pdb);
		let result = pdb.execute("channel-delete", &vec![Arg::Channel(5)].into());
		assert_eq!(result.status(), Status::CallingError);
		assert!(result.error_message().is_some_and(|m| m.contains("'drawable-delete'")));
	}

	#[test]
	fn compat_miss_reports_requested_name() {
		let pdb = Pdb::new(PdbConfig::default().with_compat_mode(CompatMode::On));
		let result = pdb.execute("channel-delete", &vec![Arg::Drawable(5)].into());
		assert_eq!(result.error_message(), Some("procedure 'channel-delete' not found"));
	}

	struct Broken;

	impl Backend for Broken {
		fn run(&self, _ctx: &CallContext<'_>, _args: &[Arg]) -> Result<ReturnValues, TransportError> {
			Err(TransportError::Disconnected)
		}
	}

	#[test]
	fn transport_failure_is_execution_error() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(Procedure::new(ProcDecl::new("remote", ProcKind::Plugin), Arc::new(Broken)).unwrap());
		let result = pdb.execute("remote", &ArgList::new());
		assert_eq!(result.status(), Status::ExecutionError);
		assert_eq!(result.error_message(), Some("procedure 'remote': peer disconnected"));
	}

	#[test]
	fn malformed_success_becomes_execution_error() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(Procedure::internal(width_decl(), |_, _| ReturnValues::success([Arg::string("wide")])).unwrap());
		let result = pdb.execute("image-get-width", &ArgList::new());
		assert_eq!(result.status(), Status::ExecutionError);
		assert!(result.error_message().is_some_and(|m| m.starts_with("procedure 'image-get-width'")));
	}

	#[test]
	fn failure_values_are_not_shape_checked() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(Procedure::internal(width_decl(), |_, _| ReturnValues::execution_error("no image")).unwrap());
		let result = pdb.execute("image-get-width", &ArgList::new());
		assert_eq!(result.error_message(), Some("no image"));
	}

	#[test]
	fn procedures_can_reenter_dispatch() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(Procedure::internal(width_decl(), |_, _| ReturnValues::success([Arg::Int32(320)])).unwrap());
		let decl = ProcDecl::new("image-get-area", ProcKind::Internal).ret("area", ArgKind::Int32, "");
		pdb.register(
			Procedure::internal(decl, |ctx, _| {
				let width = ctx.execute("image-get-width", &ArgList::new());
				let w = width.value(0).and_then(Arg::as_int).unwrap_or_default();
				ReturnValues::success([Arg::Int32(i32::try_from(w * 2).unwrap_or_default())])
			})
			.unwrap(),
		);
		let result = pdb.execute("image-get-area", &ArgList::new());
		assert_eq!(result.values(), &[Arg::Int32(640)]);
	}

	#[test]
	fn callee_sees_caller_identity() {
		let pdb = Pdb::new(PdbConfig::default());
		let decl = ProcDecl::new("who", ProcKind::Internal).ret("session", ArgKind::Int32, "");
		pdb.register(
			Procedure::internal(decl, |ctx, _| {
				let id = match ctx.caller {
					Caller::Core => -1,
					Caller::Session(s) => i32::try_from(s.0).unwrap_or_default(),
				};
				ReturnValues::success([Arg::Int32(id)])
			})
			.unwrap(),
		);
		let session = pdb.open_session();
		let result = pdb.execute_as(Caller::Session(session), "who", &ArgList::new());
		assert_eq!(result.values(), &[Arg::Int32(i32::try_from(session.0).unwrap())]);
		assert_eq!(pdb.execute("who", &ArgList::new()).values(), &[Arg::Int32(-1)]);
	}

	#[test]
	fn concurrent_unregister_does_not_affect_inflight_dispatch() {
		let pdb = Pdb::new(PdbConfig::default());
		let (entered_tx, entered_rx) = std::sync::mpsc::channel();
		let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
		let release_rx = parking_lot::Mutex::new(release_rx);
		let decl = ProcDecl::new("slow", ProcKind::Internal).ret("v", ArgKind::Int32, "");
		let id = pdb.register(
			Procedure::internal(decl, move |_, _| {
				let _ = entered_tx.send(());
				let _ = release_rx.lock().recv();
				ReturnValues::success([Arg::Int32(1)])
			})
			.unwrap(),
		);

		let worker = {
			let pdb = pdb.clone();
			thread::spawn(move || pdb.execute("slow", &ArgList::new()))
		};
		entered_rx.recv().unwrap();
		assert!(pdb.unregister("slow", id));
		release_tx.send(()).unwrap();

		let result = worker.join().unwrap();
		assert_eq!(result.status(), Status::Success);
		assert!(!pdb.proc_exists("slow"));
	}
}
