pub mod agent;
pub mod shutdown;
pub mod startup;
