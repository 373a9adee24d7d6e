//! Request and response translators per provider protocol

pub mod openai;
