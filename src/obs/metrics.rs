// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"mcp_oauth_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_accepts_every_stage() {
		for kind in [
			FlowKind::Discovery,
			FlowKind::Registration,
			FlowKind::Authorization,
			FlowKind::Exchange,
			FlowKind::Refresh,
		] {
			record_flow_outcome(kind, FlowOutcome::Attempt);
		}
	}
}
