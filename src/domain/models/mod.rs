pub mod config;
pub mod quantity;
pub mod spectrum;
pub mod verdict;
pub mod zone;

pub use config::{
    Config, ConvergenceConfig, ExtraOutputs, LoggingConfig, PhotoionizationConfig,
    RadiativeTransferConfig, RunConfig, SchedulerConfig, SchedulingMode,
};
pub use quantity::{Criterion, TrackedQuantity, WavelengthSpec};
pub use spectrum::{Spectrum, SpectrumError};
pub use verdict::{ConvergenceOutcome, ConvergenceVerdict, PairFailure, RunOutcome};
pub use zone::{
    ChemistryKind, DustKind, GeometryKind, TableOptions, ZoneComposition, ZoneGeometry,
    ZoneParameterTable, ZoneParameters,
};
