//! Job descriptors, script rendering and the scheduler seam.

mod descriptor;
mod scheduler;

pub use descriptor::{
    shell_quote, DependencyExpression, EnvironmentSetup, JobCommand, JobDescriptor, ResourceRequest,
};
pub use scheduler::{parse_acknowledgment, Scheduler, SlurmScheduler};
