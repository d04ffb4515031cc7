pub mod manager;
pub mod momentum;
pub mod traits;

pub use manager::{ConflictResolutionMode, SignalAggregationMethod, StrategyLifecycle, StrategyManager};
pub use momentum::StatisticalMomentumStrategy;
pub use traits::{AnalysisContext, PositionInfo, Strategy};
