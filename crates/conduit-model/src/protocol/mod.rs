//! Provider wire formats
//!
//! Plain serde structs used only at the network boundary.

pub mod openai;
