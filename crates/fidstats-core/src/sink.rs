//! Result sink contract
//!
//! The core hands finished statistics to a sink and nothing else. Format,
//! naming and location belong to the sink.

use crate::aggregator::ActivationStatistics;

/// Receives the final statistics of a successful run
pub trait StatsSink {
    type Error;

    fn persist(&mut self, stats: &ActivationStatistics) -> Result<(), Self::Error>;
}

/// Keeps the statistics in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    stats: Option<ActivationStatistics>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&ActivationStatistics> {
        self.stats.as_ref()
    }

    pub fn into_inner(self) -> Option<ActivationStatistics> {
        self.stats
    }
}

impl StatsSink for MemorySink {
    type Error = std::convert::Infallible;

    fn persist(&mut self, stats: &ActivationStatistics) -> Result<(), Self::Error> {
        self.stats = Some(stats.clone());
        Ok(())
    }
}
