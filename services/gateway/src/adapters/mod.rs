pub mod brain;

pub use brain::BrainClient;
