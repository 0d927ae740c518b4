use clap::Args;

use ff_partition::ModelDetails;

/// Command-line surface for [`ModelDetails`]. Parameter-file loading is
/// intentionally absent here: building a full `PfParamSet` from a file is
/// an external concern the core never takes on (see `ff_partition::params`).
#[derive(Debug, Args)]
pub struct ModelArguments {
    /// Temperature in Celsius.
    #[arg(short, long, default_value = "37.0")]
    pub temperature: f64,

    /// Dangle model: 0 (none), 1, 2 (both sides, ViennaRNA default), or 3.
    #[arg(short, long, default_value = "2")]
    pub dangles: u8,

    /// Forbid G-U pairs entirely.
    #[arg(long)]
    pub no_gu: bool,

    /// Forbid a G-U pair from closing a loop.
    #[arg(long)]
    pub no_gu_closure: bool,

    /// Treat the input as a circular sequence.
    #[arg(long)]
    pub circ: bool,
}

impl ModelArguments {
    pub fn build_model(&self) -> ModelDetails {
        ModelDetails {
            temperature: self.temperature,
            dangles: self.dangles,
            no_gu: self.no_gu,
            no_gu_closure: self.no_gu_closure,
            circ: self.circ,
            ..ModelDetails::default()
        }
    }
}
