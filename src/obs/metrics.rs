// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"upstream_broker_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a lookup cache hit or miss via the global metrics recorder (when enabled).
pub fn record_lookup_result(hit: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"upstream_broker_lookup_total",
			"result" => if hit { "hit" } else { "miss" }
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = hit;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_helpers_noop_without_metrics() {
		record_op_outcome(OpKind::CredentialRefresh, OpOutcome::Failure);
		record_lookup_result(true);
	}
}
