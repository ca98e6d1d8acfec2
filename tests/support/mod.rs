pub mod layers;
pub mod sink_lock;
pub mod trainer;
