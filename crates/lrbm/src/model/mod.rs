//! Model components: the collaborator trait, the burn LRBM network and its
//! trainable wrapper, and the tensor bridge between n-gram matrices and burn.

pub mod bridge;
pub mod energy_model;
pub mod lrbm;
pub mod trainable;

pub use energy_model::EnergyModel;
