/// Sink for conditions that are worth surfacing but do not, by themselves,
/// invalidate the computation -- per the near-overflow warnings called for
/// alongside [`crate::error::PfError::Overflow`], which is reserved for the
/// case where a cell has actually saturated past a usable range.
pub trait DiagnosticSink {
    fn near_overflow(&self, i: usize, j: usize, value: f64);
}

/// Default sink: logs via the `log` facade, same as the rest of the crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn near_overflow(&self, i: usize, j: usize, value: f64) {
        log::warn!("partition function cell ({i}, {j}) near overflow: {value:e}");
    }
}

/// Sink that drops every diagnostic, for callers (benches, dense sweeps)
/// that don't want the logging overhead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {
    fn near_overflow(&self, _i: usize, _j: usize, _value: f64) {}
}
